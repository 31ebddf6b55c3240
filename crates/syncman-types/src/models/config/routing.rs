//! Ingress routes for the request router.

use serde::{Deserialize, Serialize};

use super::rule::Rule;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Route {
    pub id: String,
    pub project: String,
    pub source: RouteSource,
    pub targets: Vec<RouteTarget>,
    pub rule: Option<Rule>,
    pub modify: RouteModify,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSource {
    pub hosts: Vec<String>,
    pub methods: Vec<String>,
    pub url: String,
    pub rewrite: String,
    /// "prefix" or "exact"
    #[serde(rename = "type")]
    pub url_type: String,
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTarget {
    pub host: String,
    pub port: u16,
    pub scheme: String,
    pub weight: u32,
    pub version: String,
    /// "version" or "external"
    #[serde(rename = "type")]
    pub target_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RouteModify {
    #[serde(rename = "template", skip_serializing_if = "String::is_empty")]
    pub template: String,
    pub request_template: String,
    pub response_template: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub output_format: String,
    pub headers: Vec<Header>,
    pub res_headers: Vec<Header>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Header {
    pub key: String,
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub op: String,
}
