//! Small accessors over `Pod` objects

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, Pod};

pub fn name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

pub fn namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

pub fn first_container(pod: &Pod) -> Option<&Container> {
    pod.spec.as_ref().and_then(|spec| spec.containers.first())
}

pub fn phase(pod: &Pod) -> Option<&str> {
    pod.status.as_ref().and_then(|status| status.phase.as_deref())
}

/// When the API server created the pod
pub fn creation_time(pod: &Pod) -> Option<DateTime<Utc>> {
    let time = pod.metadata.creation_timestamp.as_ref()?;
    // Time serializes as an RFC 3339 string regardless of the backing type
    let value = serde_json::to_value(time).ok()?;
    DateTime::parse_from_rfc3339(value.as_str()?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let pod: Pod = serde_json::from_value(serde_json::json!({
            "metadata": {
                "name": "session-x1",
                "namespace": "apps",
                "creationTimestamp": "2026-10-16T09:30:00Z"
            },
            "spec": { "containers": [{ "name": "web", "image": "web:1.0" }] },
            "status": { "phase": "Running" }
        }))
        .unwrap();

        assert_eq!(name(&pod), "session-x1");
        assert_eq!(namespace(&pod), "apps");
        assert_eq!(phase(&pod), Some("Running"));
        assert_eq!(first_container(&pod).unwrap().name, "web");
        assert_eq!(
            creation_time(&pod).unwrap().to_rfc3339(),
            "2026-10-16T09:30:00+00:00"
        );
    }

    #[test]
    fn test_accessors_on_empty_pod() {
        let pod = Pod::default();
        assert_eq!(name(&pod), "");
        assert!(first_container(&pod).is_none());
        assert!(creation_time(&pod).is_none());
        assert!(phase(&pod).is_none());
    }
}
