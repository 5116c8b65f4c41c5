//! Test utilities for podsession
//!
//! In-memory stand-ins for the cluster, the context connector and the
//! interactive prompt, plus pod and workload fixtures.

#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use k8s_openapi::api::core::v1::{Pod, PodTemplateSpec};
use parking_lot::Mutex;

use podsession::kubernetes::{
    AttachOptions, ClusterClient, ClusterEvent, ClusterEventStream, ContextConnector,
    ContextHandle, KubeClientError, PodEvent, PodEventStream, Workload,
};
use podsession::session::{Prompter, SessionResult};
use podsession::LocalIdentity;

fn unreachable_cluster() -> KubeClientError {
    KubeClientError::IoError(std::io::Error::new(
        std::io::ErrorKind::ConnectionRefused,
        "connection refused",
    ))
}

fn forbidden() -> KubeClientError {
    KubeClientError::AccessDenied("pods is forbidden: User \"alice\" cannot watch".to_string())
}

/// Records every call and answers from canned data
#[derive(Default)]
pub struct FakeCluster {
    pub workloads: Vec<Workload>,
    /// Returned by `list_pods`
    pub pods: Vec<Pod>,
    /// Delivered by `watch_pod`; the stream then stays open. `None` never yields.
    pub watch_events: Option<Vec<PodEvent>>,
    pub cluster_events: Vec<ClusterEvent>,
    /// Watch errors yielded ahead of `watch_events`
    pub watch_errors: usize,
    /// Both watches fail with an authorization error
    pub watch_denied: bool,
    /// `attach` never returns on its own
    pub attach_blocks: bool,
    pub fail_list: bool,
    pub fail_patch: bool,
    pub fail_attach: bool,

    pub workload_selectors: Mutex<Vec<String>>,
    pub pod_selectors: Mutex<Vec<(Option<String>, String, Option<String>)>>,
    pub created: Mutex<Vec<Pod>>,
    pub patches: Mutex<Vec<(String, String, serde_json::Value)>>,
    pub deleted: Mutex<Vec<(String, String)>>,
    pub attached: Mutex<Vec<(String, String, AttachOptions)>>,
    counter: AtomicUsize,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workloads(mut self, workloads: Vec<Workload>) -> Self {
        self.workloads = workloads;
        self
    }

    pub fn with_pods(mut self, pods: Vec<Pod>) -> Self {
        self.pods = pods;
        self
    }

    pub fn with_watch_events(mut self, events: Vec<PodEvent>) -> Self {
        self.watch_events = Some(events);
        self
    }

    pub fn with_cluster_events(mut self, events: Vec<ClusterEvent>) -> Self {
        self.cluster_events = events;
        self
    }

    pub fn with_watch_errors(mut self, count: usize) -> Self {
        self.watch_errors = count;
        self
    }

    pub fn denying_watches(mut self) -> Self {
        self.watch_denied = true;
        self
    }

    pub fn blocking_attach(mut self) -> Self {
        self.attach_blocks = true;
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn deleted_names(&self) -> Vec<String> {
        self.deleted.lock().iter().map(|(_, name)| name.clone()).collect()
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn list_workloads(&self, label_selector: &str) -> Result<Vec<Workload>, KubeClientError> {
        self.workload_selectors.lock().push(label_selector.to_string());
        Ok(self.workloads.clone())
    }

    async fn list_pods(
        &self,
        namespace: Option<&str>,
        label_selector: &str,
        field_selector: Option<&str>,
    ) -> Result<Vec<Pod>, KubeClientError> {
        self.pod_selectors.lock().push((
            namespace.map(str::to_string),
            label_selector.to_string(),
            field_selector.map(str::to_string),
        ));
        if self.fail_list {
            return Err(unreachable_cluster());
        }
        Ok(self.pods.clone())
    }

    async fn create_pod(&self, namespace: &str, pod: &Pod) -> Result<Pod, KubeClientError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let mut created = pod.clone();
        let prefix = created.metadata.generate_name.clone().unwrap_or_default();
        created.metadata.name = Some(format!("{}fake{}", prefix, n));
        created.metadata.namespace = Some(namespace.to_string());
        created.metadata.uid = Some(format!("uid-{}", n));
        self.created.lock().push(created.clone());
        Ok(created)
    }

    async fn patch_pod(
        &self,
        namespace: &str,
        name: &str,
        patch: &serde_json::Value,
    ) -> Result<Pod, KubeClientError> {
        self.patches
            .lock()
            .push((namespace.to_string(), name.to_string(), patch.clone()));
        if self.fail_patch {
            return Err(unreachable_cluster());
        }
        Ok(Pod::default())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), KubeClientError> {
        self.deleted
            .lock()
            .push((namespace.to_string(), name.to_string()));
        Ok(())
    }

    async fn watch_pod(&self, _namespace: &str, _name: &str) -> Result<PodEventStream, KubeClientError> {
        if self.watch_denied {
            return Ok(stream::iter(vec![Err(forbidden())]).chain(stream::pending()).boxed());
        }
        let errors = stream::iter((0..self.watch_errors).map(|_| Err(unreachable_cluster())));
        Ok(match &self.watch_events {
            Some(events) => errors
                .chain(stream::iter(events.clone().into_iter().map(Ok)))
                .chain(stream::pending())
                .boxed(),
            None => errors.chain(stream::pending()).boxed(),
        })
    }

    async fn stream_events(
        &self,
        _namespace: &str,
        _uid: &str,
    ) -> Result<ClusterEventStream, KubeClientError> {
        if self.watch_denied {
            return Ok(stream::iter(vec![Err(forbidden())]).chain(stream::pending()).boxed());
        }
        Ok(stream::iter(self.cluster_events.clone().into_iter().map(Ok))
            .chain(stream::pending())
            .boxed())
    }

    async fn attach(
        &self,
        namespace: &str,
        name: &str,
        options: &AttachOptions,
    ) -> Result<(), KubeClientError> {
        self.attached
            .lock()
            .push((namespace.to_string(), name.to_string(), options.clone()));
        if self.fail_attach {
            return Err(KubeClientError::AttachError("upgrade refused".to_string()));
        }
        if self.attach_blocks {
            futures::future::pending::<()>().await;
        }
        Ok(())
    }
}

/// Contexts backed by fake clusters
#[derive(Default)]
pub struct FakeConnector {
    clusters: BTreeMap<String, Arc<FakeCluster>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, name: &str, cluster: FakeCluster) -> Self {
        self.clusters.insert(name.to_string(), Arc::new(cluster));
        self
    }

    pub fn cluster(&self, name: &str) -> Arc<FakeCluster> {
        Arc::clone(&self.clusters[name])
    }
}

#[async_trait]
impl ContextConnector for FakeConnector {
    fn context_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }

    async fn select(&self, name: &str) -> Result<ContextHandle, KubeClientError> {
        let cluster = self
            .clusters
            .get(name)
            .ok_or_else(|| KubeClientError::ContextNotFound {
                name: name.to_string(),
                available: self.context_names().join(", "),
            })?;
        let client: Arc<dyn ClusterClient> = Arc::clone(cluster) as Arc<dyn ClusterClient>;
        Ok(ContextHandle::new(name, client))
    }
}

/// Answers prompts from a script and records what was asked
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<Option<usize>>>,
    pub asked: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedPrompter {
    pub fn new(answers: Vec<Option<usize>>) -> Self {
        Self {
            answers: Mutex::new(answers.into()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// A prompter that fails the test if it is ever consulted
    pub fn silent() -> Self {
        Self::new(Vec::new())
    }
}

impl Prompter for ScriptedPrompter {
    fn select(&self, message: &str, options: &[String]) -> SessionResult<Option<usize>> {
        self.asked
            .lock()
            .push((message.to_string(), options.to_vec()));
        match self.answers.lock().pop_front() {
            Some(answer) => Ok(answer),
            None => panic!("Unexpected prompt: {}", message),
        }
    }
}

pub fn test_identity() -> LocalIdentity {
    LocalIdentity::new("machine-0001", "alice", "Alice Liddell")
}

/// A workload whose template runs a single `web` container
pub fn create_test_workload(name: &str, namespace: &str, labels: &[(&str, &str)]) -> Workload {
    let labels: BTreeMap<&str, &str> = labels.iter().copied().collect();
    let template: PodTemplateSpec = serde_json::from_value(serde_json::json!({
        "metadata": { "labels": labels },
        "spec": {
            "restartPolicy": "Always",
            "containers": [{ "name": "web", "image": "registry.local/web:1.4", "command": ["puma"] }]
        }
    }))
    .expect("valid template");

    Workload {
        name: name.to_string(),
        namespace: namespace.to_string(),
        template,
    }
}

/// A pod in `phase`, with the given `(type, status)` conditions
pub fn create_test_pod(name: &str, namespace: &str, phase: &str, conditions: &[(&str, &str)]) -> Pod {
    let conditions: Vec<serde_json::Value> = conditions
        .iter()
        .map(|(t, s)| serde_json::json!({ "type": t, "status": s }))
        .collect();
    serde_json::from_value(serde_json::json!({
        "metadata": {
            "name": name,
            "namespace": namespace,
            "uid": format!("uid-{}", name),
            "creationTimestamp": "2026-10-16T08:00:00Z",
            "labels": { "app": "web", "session.garbage-collect": "true" },
            "annotations": { "session.creator.name": "Alice Liddell" }
        },
        "spec": { "containers": [{ "name": "web", "image": "registry.local/web:1.4", "command": ["puma"] }] },
        "status": { "phase": phase, "conditions": conditions }
    }))
    .expect("valid pod")
}

pub fn ready_pod(name: &str, namespace: &str) -> Pod {
    create_test_pod(
        name,
        namespace,
        "Running",
        &[("PodScheduled", "True"), ("Ready", "True")],
    )
}

pub fn pending_pod(name: &str, namespace: &str) -> Pod {
    create_test_pod(name, namespace, "Pending", &[])
}
