//! Session pod derivation
//!
//! Turns a workload's pod template into a single-shot interactive pod. No
//! API calls happen here, so malformed overrides fail before anything is
//! submitted.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::api::core::v1::{Container, Pod, ResourceRequirements};

use crate::identity::LocalIdentity;
use crate::kubernetes::Workload;

use super::error::{SessionError, SessionResult};
use super::labels;
use super::resources::{parse_resource_list, ResourceSpecError};

/// User supplied changes applied on top of the workload template
#[derive(Debug, Clone)]
pub struct SessionOverrides {
    /// Replaces the first container's command when non-empty
    pub command: Vec<String>,
    pub image: Option<String>,
    /// `name=quantity` list applied as both limits and requests
    pub limits: Option<String>,
    /// How long the pod may live without a heartbeat
    pub idle_timeout: Duration,
}

impl Default for SessionOverrides {
    fn default() -> Self {
        Self {
            command: Vec::new(),
            image: None,
            limits: None,
            idle_timeout: Duration::from_secs(15 * 60),
        }
    }
}

/// Format a heartbeat timestamp
pub fn heartbeat_timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Derive a session pod from `workload`
pub fn build_session_pod(
    workload: &Workload,
    overrides: &SessionOverrides,
    identity: &LocalIdentity,
    now: DateTime<Utc>,
) -> SessionResult<Pod> {
    let template = workload.template.clone();
    let mut metadata = template.metadata.unwrap_or_default();
    let mut spec = template
        .spec
        .filter(|spec| !spec.containers.is_empty())
        .ok_or_else(|| SessionError::NoContainers(workload.name.clone()))?;

    metadata.namespace = Some(workload.namespace.clone());

    let pod_labels = metadata.labels.get_or_insert_with(Default::default);
    pod_labels.insert(labels::GARBAGE_COLLECT.to_string(), "true".to_string());
    pod_labels.insert(
        labels::CREATOR_MACHINE_ID.to_string(),
        identity.machine_id.clone(),
    );

    let annotations = metadata.annotations.get_or_insert_with(Default::default);
    annotations.insert(
        labels::CREATOR_USERNAME.to_string(),
        identity.username.clone(),
    );
    annotations.insert(
        labels::CREATOR_NAME.to_string(),
        identity.display_name.clone(),
    );
    annotations.insert(labels::HEARTBEAT.to_string(), heartbeat_timestamp(now));
    annotations.insert(
        labels::TIMEOUT.to_string(),
        (overrides.idle_timeout.as_secs() / 60).to_string(),
    );

    if metadata.generate_name.as_deref().unwrap_or("").is_empty() {
        metadata.generate_name = Some(labels::DEFAULT_GENERATE_NAME.to_string());
    }

    spec.restart_policy = Some("Never".to_string());

    let container = &mut spec.containers[0];
    container.tty = Some(true);
    container.stdin = Some(true);

    if !overrides.command.is_empty() {
        container.command = Some(overrides.command.clone());
    }

    if let Some(limits) = overrides.limits.as_deref().filter(|l| !l.is_empty()) {
        apply_limits(container, limits)?;
    }

    if let Some(image) = overrides.image.as_deref().filter(|i| !i.is_empty()) {
        apply_image(container, image);
    }

    Ok(Pod {
        metadata,
        spec: Some(spec),
        status: None,
    })
}

/// Set identical limits and requests on `container`
fn apply_limits(container: &mut Container, limits: &str) -> Result<(), ResourceSpecError> {
    let resources = parse_resource_list(limits)?;
    container.resources = Some(ResourceRequirements {
        limits: Some(resources.clone()),
        requests: Some(resources),
        ..Default::default()
    });
    Ok(())
}

fn apply_image(container: &mut Container, image: &str) {
    container.image = Some(image.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn workload() -> Workload {
        let template: PodTemplateSpec = serde_json::from_value(serde_json::json!({
            "metadata": { "labels": { "app": "web", "process": "console" } },
            "spec": {
                "restartPolicy": "Always",
                "containers": [
                    { "name": "web", "image": "web:1.0", "command": ["bundle", "exec", "puma"] },
                    { "name": "sidecar", "image": "proxy:2" }
                ]
            }
        }))
        .unwrap();
        Workload {
            name: "web".to_string(),
            namespace: "apps".to_string(),
            template,
        }
    }

    fn identity() -> LocalIdentity {
        LocalIdentity::new("0123456789abcdef", "alice", "Alice Liddell")
    }

    #[test]
    fn test_build_stamps_ownership_and_provenance() {
        let before = Utc::now();
        let pod = build_session_pod(&workload(), &SessionOverrides::default(), &identity(), Utc::now())
            .unwrap();
        let after = Utc::now();

        let pod_labels = pod.metadata.labels.as_ref().unwrap();
        assert_eq!(pod_labels["app"], "web");
        assert_eq!(pod_labels["process"], "console");
        assert_eq!(pod_labels[labels::GARBAGE_COLLECT], "true");
        assert_eq!(pod_labels[labels::CREATOR_MACHINE_ID], "0123456789abcdef");

        let annotations = pod.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations[labels::CREATOR_USERNAME], "alice");
        assert_eq!(annotations[labels::CREATOR_NAME], "Alice Liddell");
        assert_eq!(annotations[labels::TIMEOUT], "15");

        let heartbeat = DateTime::parse_from_rfc3339(&annotations[labels::HEARTBEAT])
            .unwrap()
            .with_timezone(&Utc);
        assert!(heartbeat.timestamp() >= before.timestamp());
        assert!(heartbeat.timestamp() <= after.timestamp());
    }

    #[test]
    fn test_build_forces_interactive_single_shot() {
        let pod = build_session_pod(&workload(), &SessionOverrides::default(), &identity(), Utc::now())
            .unwrap();
        let spec = pod.spec.unwrap();

        assert_eq!(spec.restart_policy.as_deref(), Some("Never"));
        assert_eq!(spec.containers[0].tty, Some(true));
        assert_eq!(spec.containers[0].stdin, Some(true));
        assert_eq!(spec.containers[1].tty, None);
        assert_eq!(pod.metadata.generate_name.as_deref(), Some("session-"));
        assert_eq!(pod.metadata.namespace.as_deref(), Some("apps"));
    }

    #[test]
    fn test_build_initializes_missing_maps() {
        let mut workload = workload();
        workload.template.metadata = None;

        let pod = build_session_pod(&workload, &SessionOverrides::default(), &identity(), Utc::now())
            .unwrap();
        assert_eq!(pod.metadata.labels.unwrap().len(), 2);
        assert_eq!(pod.metadata.annotations.unwrap().len(), 4);
    }

    #[test]
    fn test_build_keeps_template_generate_name() {
        let mut workload = workload();
        workload
            .template
            .metadata
            .get_or_insert_with(Default::default)
            .generate_name = Some("web-console-".to_string());

        let pod = build_session_pod(&workload, &SessionOverrides::default(), &identity(), Utc::now())
            .unwrap();
        assert_eq!(pod.metadata.generate_name.as_deref(), Some("web-console-"));
    }

    #[test]
    fn test_command_override_replaces() {
        let overrides = SessionOverrides {
            command: vec!["/bin/bash".to_string()],
            idle_timeout: Duration::from_secs(60 * 60),
            ..Default::default()
        };
        let pod = build_session_pod(&workload(), &overrides, &identity(), Utc::now()).unwrap();

        let container = &pod.spec.as_ref().unwrap().containers[0];
        assert_eq!(container.command, Some(vec!["/bin/bash".to_string()]));
        assert_eq!(pod.metadata.annotations.unwrap()[labels::TIMEOUT], "60");
    }

    #[test]
    fn test_limits_apply_to_limits_and_requests() {
        let overrides = SessionOverrides {
            limits: Some("cpu=200m,memory=512Mi".to_string()),
            ..Default::default()
        };
        let pod = build_session_pod(&workload(), &overrides, &identity(), Utc::now()).unwrap();

        let resources = pod.spec.unwrap().containers[0].resources.clone().unwrap();
        assert_eq!(resources.limits, resources.requests);
        assert_eq!(resources.limits.unwrap()["memory"].0, "512Mi");
    }

    #[test]
    fn test_override_order_does_not_matter() {
        let base = workload().template.spec.unwrap().containers[0].clone();

        let mut image_first = base.clone();
        apply_image(&mut image_first, "web:debug");
        apply_limits(&mut image_first, "cpu=1,memory=1Gi").unwrap();

        let mut limits_first = base;
        apply_limits(&mut limits_first, "cpu=1,memory=1Gi").unwrap();
        apply_image(&mut limits_first, "web:debug");

        assert_eq!(image_first, limits_first);
        assert_eq!(image_first.image.as_deref(), Some("web:debug"));
    }

    #[test]
    fn test_invalid_limits_fail() {
        let overrides = SessionOverrides {
            limits: Some("cpu".to_string()),
            ..Default::default()
        };
        let err = build_session_pod(&workload(), &overrides, &identity(), Utc::now()).unwrap_err();
        assert!(matches!(err, SessionError::InvalidResourceSpec(_)));
    }

    #[test]
    fn test_template_without_containers_fails() {
        let mut workload = workload();
        workload.template.spec.as_mut().unwrap().containers.clear();

        let err = build_session_pod(&workload, &SessionOverrides::default(), &identity(), Utc::now())
            .unwrap_err();
        assert!(matches!(err, SessionError::NoContainers(ref name) if name == "web"));
    }
}
