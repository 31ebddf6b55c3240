//! File store module configuration.

use syncman_types::models::{FileRule, FileStore};
use syncman_types::ProjectError;

use super::{lookup, Manager};
use crate::error::SyncResult;

impl Manager {
    /// Update connection settings; the rule list is left untouched.
    pub async fn set_file_store(&self, project: &str, value: FileStore) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.file_store.apply_connection(&value);
                Ok(())
            },
            |m, id, modules| m.set_file_store_config(id, &modules.file_store),
        )
        .await
    }

    /// Insert or replace the rule with id `rule_id`.
    pub async fn set_file_rule(&self, project: &str, rule_id: &str, mut rule: FileRule) -> SyncResult<()> {
        rule.id = rule_id.to_string();
        self.mutate_modules(
            project,
            |modules| {
                let rules = &mut modules.file_store.rules;
                match rules.iter_mut().find(|r| r.id == rule.id) {
                    Some(existing) => *existing = rule,
                    None => rules.push(rule),
                }
                Ok(())
            },
            |m, id, modules| m.set_file_store_config(id, &modules.file_store),
        )
        .await
    }

    pub async fn set_delete_file_rule(&self, project: &str, rule_id: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.file_store.rules.retain(|r| r.id != rule_id);
                Ok(())
            },
            |m, id, modules| m.set_file_store_config(id, &modules.file_store),
        )
        .await
    }

    /// Connection settings without the rules.
    pub async fn get_file_store_config(&self, project: &str) -> SyncResult<FileStore> {
        let state = self.inner.state.read().await;
        let config = lookup(&state.config, project)?;
        Ok(config.modules.unwrap_or_default().file_store.connection_only())
    }

    /// One rule by id, or all of them for `"*"`.
    pub async fn get_file_store_rules(&self, project: &str, rule_id: &str) -> SyncResult<Vec<FileRule>> {
        let state = self.inner.state.read().await;
        let rules = lookup(&state.config, project)?.modules.unwrap_or_default().file_store.rules;

        if rule_id == "*" {
            return Ok(rules);
        }
        rules
            .into_iter()
            .find(|r| r.id == rule_id)
            .map(|r| vec![r])
            .ok_or_else(|| ProjectError::resource(project, "file rule", rule_id).into())
    }
}
