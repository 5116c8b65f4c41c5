//! Labels and annotations that mark a pod as a session pod.
//!
//! External garbage collection relies on these keys: a reaper lists pods
//! labelled [`GARBAGE_COLLECT`] and deletes those whose [`HEARTBEAT`] is older
//! than [`TIMEOUT`] minutes.

use std::collections::BTreeMap;

/// Prefix shared by every key this tool owns
pub const PREFIX: &str = "session.";

pub const GARBAGE_COLLECT: &str = "session.garbage-collect";
pub const CREATOR_MACHINE_ID: &str = "session.creator.machine-id";

pub const CREATOR_NAME: &str = "session.creator.name";
pub const CREATOR_USERNAME: &str = "session.creator.username";
pub const HEARTBEAT: &str = "session.heartbeat";
pub const TIMEOUT: &str = "session.timeout";

/// `generateName` used when the template does not set one
pub const DEFAULT_GENERATE_NAME: &str = "session-";

/// Render an equality-based label selector, keys in sorted order
pub fn selector_from_labels(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

/// Selector for session pods, optionally restricted to one machine
pub fn ownership_selector(machine_id: Option<&str>) -> String {
    let mut labels = BTreeMap::new();
    labels.insert(GARBAGE_COLLECT.to_string(), "true".to_string());
    if let Some(id) = machine_id {
        labels.insert(CREATOR_MACHINE_ID.to_string(), id.to_string());
    }
    selector_from_labels(&labels)
}

/// Labels meant for humans: everything without the internal prefix
pub fn user_visible(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .filter(|(key, _)| !key.starts_with(PREFIX))
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(" ")
}
