//! Eventing module configuration.

use syncman_types::models::{EventingRule, Rule, SchemaObject};

use super::Manager;
use crate::error::SyncResult;

impl Manager {
    pub async fn set_eventing_rule(
        &self,
        project: &str,
        rule_name: &str,
        rule: EventingRule,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.rules.insert(rule_name.to_string(), rule);
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    pub async fn set_delete_eventing_rule(&self, project: &str, rule_name: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.rules.remove(rule_name);
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    /// Enable or disable eventing and pick the database it logs to.
    pub async fn set_eventing_config(
        &self,
        project: &str,
        db_alias: &str,
        enabled: bool,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.db_alias = db_alias.to_string();
                modules.eventing.enabled = enabled;
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    pub async fn set_eventing_schema(
        &self,
        project: &str,
        event_type: &str,
        schema: &str,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.schemas.insert(
                    event_type.to_string(),
                    SchemaObject { id: event_type.to_string(), schema: schema.to_string() },
                );
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    pub async fn set_delete_eventing_schema(&self, project: &str, event_type: &str) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.schemas.remove(event_type);
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    pub async fn set_eventing_security_rules(
        &self,
        project: &str,
        event_type: &str,
        rule: Rule,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.security_rules.insert(event_type.to_string(), rule);
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }

    pub async fn set_delete_eventing_security_rules(
        &self,
        project: &str,
        event_type: &str,
    ) -> SyncResult<()> {
        self.mutate_modules(
            project,
            |modules| {
                modules.eventing.security_rules.remove(event_type);
                Ok(())
            },
            |m, id, modules| m.set_eventing_config(id, &modules.eventing),
        )
        .await
    }
}
