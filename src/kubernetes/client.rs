//! Kubernetes API client
//!
//! Wraps the kube crate behind the [`ClusterClient`] trait so the session
//! lifecycle can run against a real cluster or an in-memory fake.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Event, Pod};
use kube::{
    api::{Api, DeleteParams, ListParams, Patch, PatchParams, PostParams},
    runtime::watcher::{self, Event as WatchEvent},
    runtime::WatchStreamExt,
    Client,
};
use thiserror::Error;

use super::attach;

#[derive(Debug, Error)]
pub enum KubeClientError {
    #[error("Failed to create client: {0}")]
    ClientError(#[from] kube::Error),
    #[error("Failed to load config: {0}")]
    ConfigError(#[from] kube::config::KubeconfigError),
    #[error("Watch failed: {0}")]
    WatchError(#[from] watcher::Error),
    /// Retrying cannot help: credentials or RBAC reject the request
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Invalid context specified: {name}, available contexts are: {available}")]
    ContextNotFound { name: String, available: String },
    #[error("Pod not found: {0}/{1}")]
    PodNotFound(String, String),
    #[error("Timed out after {0:?} waiting to attach")]
    AttachTimeout(Duration),
    #[error("Attach failed: {0}")]
    AttachError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A deployable unit whose pod template is cloned into session pods
#[derive(Debug, Clone)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub template: k8s_openapi::api::core::v1::PodTemplateSpec,
}

/// A pod watch event, decoded once at the stream boundary
#[derive(Debug, Clone)]
pub enum PodEvent {
    Added(Pod),
    Modified(Pod),
    Deleted(Pod),
    /// A (re)list is starting; pods it does not deliver are gone
    Resync,
    /// The current list has been fully delivered
    Synced,
}

/// A cluster event concerning a watched object
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterEvent {
    pub name: String,
    pub reason: String,
    pub message: String,
}

/// Parameters for attaching to a session container
#[derive(Debug, Clone)]
pub struct AttachOptions {
    pub container: Option<String>,
    pub tty: bool,
    pub stdin: bool,
    /// Suppress the "try pressing enter" hint
    pub quiet: bool,
    /// Upper bound for acquiring the attach stream
    pub timeout: Duration,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            container: None,
            tty: true,
            stdin: true,
            quiet: true,
            timeout: Duration::from_secs(30),
        }
    }
}

pub type PodEventStream = BoxStream<'static, Result<PodEvent, KubeClientError>>;
pub type ClusterEventStream = BoxStream<'static, Result<ClusterEvent, KubeClientError>>;

/// Cluster operations needed by the session lifecycle.
///
/// Every call is scoped to the context the client was created for.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List workloads matching a label selector in all namespaces.
    async fn list_workloads(&self, label_selector: &str) -> Result<Vec<Workload>, KubeClientError>;

    /// List pods, cluster-wide when `namespace` is `None`.
    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>, KubeClientError>;

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, KubeClientError>;

    /// Apply a JSON merge patch to a pod.
    async fn patch_pod(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Pod, KubeClientError>;

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), KubeClientError>;

    /// List and watch a single pod by name.
    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodEventStream, KubeClientError>;

    /// Stream events whose involved object has the given UID.
    async fn stream_events(
        &self,
        namespace: &str,
        uid: &str,
    ) -> Result<ClusterEventStream, KubeClientError>;

    /// Attach the local terminal to a running container until the stream ends.
    async fn attach(
        &self,
        namespace: &str,
        name: &str,
        options: &AttachOptions,
    ) -> Result<(), KubeClientError>;
}

/// Kubernetes API client
#[derive(Clone)]
pub struct KubeClient {
    client: Client,
    context_name: String,
}

impl KubeClient {
    /// Wrap an already configured client
    pub fn from_client(client: Client, context_name: &str) -> Self {
        Self {
            client,
            context_name: context_name.to_string(),
        }
    }

    fn pods(&self, namespace: Option<&str>) -> Api<Pod> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

fn not_found(err: kube::Error, namespace: &str, name: &str) -> KubeClientError {
    match err {
        kube::Error::Api(ref status) if status.code == 404 => {
            KubeClientError::PodNotFound(namespace.to_string(), name.to_string())
        }
        other => other.into(),
    }
}

impl KubeClientError {
    /// Whether retrying the same request is pointless
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied(_))
    }
}

fn is_denied_status(code: u16) -> bool {
    code == 401 || code == 403
}

fn classify_watch_error(err: watcher::Error) -> KubeClientError {
    let denied = match &err {
        watcher::Error::InitialListFailed(e)
        | watcher::Error::WatchStartFailed(e)
        | watcher::Error::WatchFailed(e) => {
            matches!(e, kube::Error::Api(status) if is_denied_status(status.code))
        }
        watcher::Error::WatchError(status) => is_denied_status(status.code),
        _ => false,
    };
    if denied {
        KubeClientError::AccessDenied(err.to_string())
    } else {
        KubeClientError::WatchError(err)
    }
}

#[async_trait]
impl ClusterClient for KubeClient {
    async fn list_workloads(&self, label_selector: &str) -> Result<Vec<Workload>, KubeClientError> {
        let start = std::time::Instant::now();
        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let list = deployments
            .list(&ListParams::default().labels(label_selector))
            .await?;
        tracing::debug!(
            "list_workloads({}) on {} took {:?}",
            label_selector,
            self.context_name,
            start.elapsed()
        );

        Ok(list
            .items
            .into_iter()
            .filter_map(|deployment| {
                let spec = deployment.spec?;
                Some(Workload {
                    name: deployment.metadata.name.unwrap_or_default(),
                    namespace: deployment.metadata.namespace.unwrap_or_default(),
                    template: spec.template,
                })
            })
            .collect())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>, KubeClientError> {
        let start = std::time::Instant::now();
        let mut params = ListParams::default().labels(label_selector);
        if let Some(fields) = field_selector {
            params = params.fields(fields);
        }
        let list = self.pods(namespace).list(&params).await?;
        tracing::debug!(
            "list_pods({}) on {} took {:?}",
            label_selector,
            self.context_name,
            start.elapsed()
        );
        Ok(list.items)
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, KubeClientError> {
        let created = self
            .pods(Some(namespace))
            .create(&PostParams::default(), pod)
            .await?;
        Ok(created)
    }

    async fn patch_pod(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Pod, KubeClientError> {
        self.pods(Some(namespace))
            .patch(name, &PatchParams::default(), &Patch::Merge(patch))
            .await
            .map_err(|e| not_found(e, namespace, name))
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), KubeClientError> {
        self.pods(Some(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| not_found(e, namespace, name))?;
        Ok(())
    }

    async fn watch_pod(&self, namespace: &str, name: &str) -> Result<PodEventStream, KubeClientError> {
        let config = watcher::Config::default().fields(&format!("metadata.name={}", name));
        let stream = watcher::watcher(self.pods(Some(namespace)), config)
            .default_backoff()
            .filter_map(|event| async move {
                match event {
                    Ok(WatchEvent::Init) => Some(Ok(PodEvent::Resync)),
                    Ok(WatchEvent::InitApply(pod)) => Some(Ok(PodEvent::Added(pod))),
                    Ok(WatchEvent::InitDone) => Some(Ok(PodEvent::Synced)),
                    Ok(WatchEvent::Apply(pod)) => Some(Ok(PodEvent::Modified(pod))),
                    Ok(WatchEvent::Delete(pod)) => Some(Ok(PodEvent::Deleted(pod))),
                    Err(e) => Some(Err(classify_watch_error(e))),
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn stream_events(
        &self,
        namespace: &str,
        uid: &str,
    ) -> Result<ClusterEventStream, KubeClientError> {
        let events: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let config = watcher::Config::default().fields(&format!("involvedObject.uid={}", uid));
        let stream = watcher::watcher(events, config)
            .default_backoff()
            .filter_map(|event| async move {
                match event {
                    Ok(WatchEvent::InitApply(ev)) | Ok(WatchEvent::Apply(ev)) => {
                        Some(Ok(ClusterEvent {
                            name: ev.metadata.name.unwrap_or_default(),
                            reason: ev.reason.unwrap_or_default(),
                            message: ev.message.unwrap_or_default(),
                        }))
                    }
                    Ok(_) => None,
                    Err(e) => Some(Err(classify_watch_error(e))),
                }
            })
            .boxed();
        Ok(stream)
    }

    async fn attach(
        &self,
        namespace: &str,
        name: &str,
        options: &AttachOptions,
    ) -> Result<(), KubeClientError> {
        attach::attach_interactive(&self.client, namespace, name, options).await
    }
}
