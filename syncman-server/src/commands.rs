#![allow(clippy::print_stdout, reason = "CLI command outputs to stdout")]

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use serde_json::Value;

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Value> {
    let response = client.get(url).send().await.with_context(|| format!("GET {url}"))?;
    // /health answers 503 with a body when the node is failing.
    Ok(response.json().await.with_context(|| format!("decoding {url}"))?)
}

pub async fn handle_status(base_url: &str, json: bool) -> Result<()> {
    let base = base_url.trim_end_matches('/');
    let client = reqwest::Client::builder().timeout(std::time::Duration::from_secs(10)).build()?;

    let health = fetch(&client, &format!("{base}/health")).await?;
    let nodes = fetch(&client, &format!("{base}/v1/cluster/nodes")).await?;
    let tokens = fetch(&client, &format!("{base}/v1/cluster/tokens")).await?;

    if json {
        let combined = serde_json::json!({"health": health, "nodes": nodes, "tokens": tokens});
        println!("{}", serde_json::to_string_pretty(&combined)?);
        return Ok(());
    }

    let text = |v: &Value, key: &str| v.get(key).and_then(Value::as_str).unwrap_or("-").to_string();
    let status = text(&health, "status");
    let status = match status.as_str() {
        "healthy" => status.green(),
        "degraded" => status.yellow(),
        _ => status.red(),
    };

    println!("{}", "Syncman Node Status".cyan().bold());
    println!("  Node:    {}", text(&health, "node_id"));
    println!("  Cluster: {} ({} store)", text(&health, "cluster_id"), text(&health, "store"));
    println!("  Health:  {}", status);
    println!(
        "  Tokens:  {}..={}",
        tokens.get("start").and_then(Value::as_u64).unwrap_or_default(),
        tokens.get("end").and_then(Value::as_u64).unwrap_or_default()
    );

    let own_id = text(&nodes, "node_id");
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Node", "Address"]);
    for (i, node) in nodes.get("nodes").and_then(Value::as_array).into_iter().flatten().enumerate() {
        let id = text(node, "id");
        let id_cell = if id == own_id { Cell::new(&id).fg(Color::Green) } else { Cell::new(&id) };
        table.add_row(vec![Cell::new(i), id_cell, Cell::new(text(node, "address"))]);
    }
    println!("{table}");

    if let Some(components) = health.get("components").and_then(Value::as_object) {
        for (name, component) in components {
            let state = text(component, "status");
            if state != "healthy" {
                println!(
                    "  {} {} ({})",
                    name.yellow(),
                    state,
                    text(component, "last_error")
                );
            }
        }
    }
    Ok(())
}
