//! Key layout shared by the key-value backends.
//!
//! ```text
//! projects/<clusterID>/<projectID>   -> project JSON
//! instances/<clusterID>/<nodeID>     -> advertise address
//! ```

pub const PROJECTS: &str = "projects";
pub const INSTANCES: &str = "instances";

pub fn prefix(kind: &str, cluster_id: &str) -> String {
    format!("{kind}/{cluster_id}/")
}

pub fn key(kind: &str, cluster_id: &str, id: &str) -> String {
    format!("{kind}/{cluster_id}/{id}")
}

/// Item id of `key` if it belongs to `cluster_id`.
pub fn item_id<'a>(key: &'a str, cluster_id: &str) -> Option<&'a str> {
    let mut parts = key.split('/');
    let _kind = parts.next()?;
    let cluster = parts.next()?;
    let id = parts.next()?;
    if cluster != cluster_id || id.is_empty() || parts.next().is_some() {
        return None;
    }
    Some(id)
}
