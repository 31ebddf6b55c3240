//! Value decoding shared by the key-value backends.

use syncman_types::{ClusterNode, ProjectConfig};

use super::StoreError;

/// Turns a raw stored value into an item; receives the full key for errors.
pub(crate) type Decoder<T> = fn(&str, &[u8]) -> Result<T, StoreError>;

pub(crate) fn decode_project(key: &str, value: &[u8]) -> Result<ProjectConfig, StoreError> {
    serde_json::from_slice(value)
        .map_err(|e| StoreError::Decode { key: key.to_string(), message: e.to_string() })
}

/// Instance values are the bare advertise address; the node id is the last key segment.
pub(crate) fn decode_instance(key: &str, value: &[u8]) -> Result<ClusterNode, StoreError> {
    let id = key.rsplit('/').next().unwrap_or(key);
    let address = std::str::from_utf8(value)
        .map_err(|e| StoreError::Decode { key: key.to_string(), message: e.to_string() })?;
    Ok(ClusterNode::new(id, address.trim()))
}
