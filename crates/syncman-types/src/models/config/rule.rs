//! Authorization rule tree.
//!
//! Rules are evaluated by the security engine, never here. The common fields are
//! typed for convenience and everything else is carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub rule: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub eval: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub rule_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub clauses: Vec<Rule>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub db: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub col: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Rule {
    pub fn allow() -> Self {
        Self { rule: "allow".to_string(), ..Default::default() }
    }

    pub fn deny() -> Self {
        Self { rule: "deny".to_string(), ..Default::default() }
    }
}
