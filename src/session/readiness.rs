//! Readiness wait
//!
//! Follows a single pod through list+watch events until it can be attached,
//! has already finished, disappears, or the wait is interrupted.

use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use tokio_util::sync::CancellationToken;

use crate::kubernetes::{ClusterClient, PodEvent};

use super::error::{SessionError, SessionResult};
use super::pod;

/// Where a pod stands on its way to being attachable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    Pending,
    Scheduled,
    Ready,
    Failed,
    Succeeded,
    Deleted,
}

impl ReadinessState {
    /// Derive the state from a pod's phase and conditions
    pub fn of(pod: &Pod) -> Self {
        match pod::phase(pod) {
            Some("Failed") => Self::Failed,
            Some("Succeeded") => Self::Succeeded,
            Some("Running") if has_condition(pod, "Ready") => Self::Ready,
            _ if has_condition(pod, "PodScheduled") => Self::Scheduled,
            _ => Self::Pending,
        }
    }
}

fn has_condition(pod: &Pod, condition: &str) -> bool {
    pod.status
        .as_ref()
        .and_then(|status| status.conditions.as_ref())
        .is_some_and(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == condition && c.status == "True")
        })
}

/// Non-error ways a readiness wait can end
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    /// Running with a true Ready condition
    Ready(Pod),
    /// Failed or Succeeded before it could be attached
    Completed(Pod),
    Interrupted,
}

/// Folds watch events into a wait result
#[derive(Debug)]
pub struct ReadinessTracker {
    namespace: String,
    name: String,
    state: ReadinessState,
    seen: bool,
    synced: bool,
}

impl ReadinessTracker {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            state: ReadinessState::Pending,
            seen: false,
            synced: false,
        }
    }

    /// Last state observed
    pub fn state(&self) -> ReadinessState {
        self.state
    }

    fn not_found(&self) -> SessionError {
        SessionError::PodNotFound(self.namespace.clone(), self.name.clone())
    }

    /// Feed one event; `Some` once the wait is decided
    pub fn observe(&mut self, event: PodEvent) -> SessionResult<Option<WaitOutcome>> {
        let pod = match event {
            PodEvent::Deleted(_) => {
                self.state = ReadinessState::Deleted;
                return Err(self.not_found());
            }
            PodEvent::Resync => {
                self.seen = false;
                self.synced = false;
                return Ok(None);
            }
            PodEvent::Synced => {
                // A pod missing from a list would never produce a delete event
                if !self.synced && !self.seen {
                    self.state = ReadinessState::Deleted;
                    return Err(self.not_found());
                }
                self.synced = true;
                return Ok(None);
            }
            PodEvent::Added(pod) | PodEvent::Modified(pod) => pod,
        };

        self.seen = true;
        self.state = ReadinessState::of(&pod);
        tracing::debug!("Pod {}/{} is {:?}", self.namespace, self.name, self.state);

        Ok(match self.state {
            ReadinessState::Ready => Some(WaitOutcome::Ready(pod)),
            ReadinessState::Failed | ReadinessState::Succeeded => {
                Some(WaitOutcome::Completed(pod))
            }
            _ => None,
        })
    }
}

/// Block until `target` is attachable, finished, gone, or `interrupt` fires
pub async fn wait_for_ready(
    client: &dyn ClusterClient,
    target: &Pod,
    interrupt: &CancellationToken,
) -> SessionResult<WaitOutcome> {
    let namespace = pod::namespace(target);
    let name = pod::name(target);

    tokio::select! {
        biased;
        _ = interrupt.cancelled() => Ok(WaitOutcome::Interrupted),
        result = follow(client, namespace, name) => result,
    }
}

async fn follow(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> SessionResult<WaitOutcome> {
    let mut tracker = ReadinessTracker::new(namespace, name);
    let mut events = client.watch_pod(namespace, name).await?;

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                if let Some(outcome) = tracker.observe(event)? {
                    return Ok(outcome);
                }
            }
            Err(e) if e.is_access_denied() => return Err(e.into()),
            // The watcher backs off and retries on its own
            Err(e) => tracing::warn!("Pod watch error: {}", e),
        }
    }

    Err(SessionError::WatchEnded(namespace.to_string(), name.to_string()))
}
