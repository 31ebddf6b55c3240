//! Per-project module configuration consumed by the dependent engines.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::routing::Route;
use super::rule::Rule;

/// Config of every engine attached to a project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Modules {
    /// Database alias -> database config
    #[serde(rename = "db")]
    pub crud: BTreeMap<String, CrudStub>,
    /// Sign-in method -> provider config
    #[serde(rename = "userMan")]
    pub auth: BTreeMap<String, AuthStub>,
    #[serde(rename = "remoteServices")]
    pub services: ServicesModule,
    pub file_store: FileStore,
    pub eventing: Eventing,
    pub letsencrypt: LetsEncrypt,
    #[serde(rename = "ingressRoutes")]
    pub routes: Vec<Route>,
}

/// Database-level config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrudStub {
    #[serde(rename = "type")]
    pub db_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    pub conn: String,
    /// Table name -> table config
    pub collections: BTreeMap<String, TableRule>,
    pub is_primary: bool,
    pub enabled: bool,
    #[serde(skip_serializing_if = "is_zero")]
    pub batch_time: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub batch_records: u32,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

/// Table-level config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRule {
    #[serde(rename = "isRealtimeEnabled")]
    pub is_realtime_enabled: bool,
    /// Operation (query, insert, update, delete) -> rule
    pub rules: BTreeMap<String, Rule>,
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthStub {
    pub id: String,
    pub enabled: bool,
    pub secret: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServicesModule {
    pub external_services: BTreeMap<String, Service>,
    pub internal_services: BTreeMap<String, Service>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Service {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub endpoints: BTreeMap<String, Endpoint>,
}

/// Remote endpoint. Templating fields are kept verbatim for the services engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Endpoint {
    pub kind: String,
    pub method: String,
    pub path: String,
    pub rule: Option<Rule>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileStore {
    pub enabled: bool,
    pub store_type: String,
    pub conn: String,
    pub endpoint: String,
    pub bucket: String,
    pub secret: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<FileRule>,
}

impl FileStore {
    /// Copy connection settings, leaving the rule list alone.
    pub fn apply_connection(&mut self, other: &FileStore) {
        self.enabled = other.enabled;
        self.store_type.clone_from(&other.store_type);
        self.conn.clone_from(&other.conn);
        self.endpoint.clone_from(&other.endpoint);
        self.bucket.clone_from(&other.bucket);
        self.secret.clone_from(&other.secret);
    }

    /// Same settings without the rules.
    pub fn connection_only(&self) -> FileStore {
        FileStore { rules: Vec::new(), ..self.clone() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileRule {
    pub id: String,
    pub prefix: String,
    /// Operation (create, read, delete) -> rule
    pub rule: BTreeMap<String, Rule>,
}

/// Eventing (task queue) config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Eventing {
    pub enabled: bool,
    pub db_alias: String,
    #[serde(rename = "triggers", skip_serializing_if = "BTreeMap::is_empty")]
    pub rules: BTreeMap<String, EventingRule>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_rules: BTreeMap<String, Rule>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, SchemaObject>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventingRule {
    #[serde(rename = "type")]
    pub event_type: String,
    pub retries: u32,
    /// Milliseconds
    pub timeout: u64,
    pub id: String,
    pub url: String,
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaObject {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LetsEncrypt {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "domains")]
    pub whitelisted_domains: Vec<String>,
}
