//! Tenant (project) configuration.

use serde::{Deserialize, Serialize};

use super::modules::Modules;

/// GraphQL context timeout applied when a provisioning request leaves it unset.
pub const DEFAULT_CONTEXT_TIME_GRAPHQL: u32 = 10;

/// A tenant's complete configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectConfig {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub secrets: Vec<Secret>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub aes_key: String,
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub docker_registry: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modules: Option<Modules>,
    #[serde(rename = "contextTimeGraphQL", skip_serializing_if = "is_zero")]
    pub context_time_graphql: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

impl ProjectConfig {
    /// Mutable access to the modules tree, creating an empty one when absent.
    pub fn modules_mut(&mut self) -> &mut Modules {
        self.modules.get_or_insert_with(Modules::default)
    }

    /// Copy the provisioning-level fields of `incoming` onto this project.
    /// The modules tree is left untouched.
    pub fn merge_mutable_fields(&mut self, incoming: &ProjectConfig) {
        self.name.clone_from(&incoming.name);
        self.aes_key.clone_from(&incoming.aes_key);
        self.secrets.clone_from(&incoming.secrets);
        self.docker_registry.clone_from(&incoming.docker_registry);
        self.context_time_graphql = incoming.context_time_graphql;
    }

    pub fn summary(&self) -> ProjectSummary {
        ProjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            aes_key: self.aes_key.clone(),
            secrets: self.secrets.clone(),
            docker_registry: self.docker_registry.clone(),
            context_time_graphql: self.context_time_graphql,
        }
    }
}

/// JWT signing secret.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    pub is_primary: bool,
    pub secret: String,
}

/// A project without its modules tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub aes_key: String,
    pub secrets: Vec<Secret>,
    pub docker_registry: String,
    #[serde(rename = "contextTimeGraphQL")]
    pub context_time_graphql: u32,
}
