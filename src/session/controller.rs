//! Session lifecycle
//!
//! Resolves a workload, derives (or reuses) a session pod, waits for it to
//! become attachable, attaches the terminal, and cleans up afterwards.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::Pod;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::identity::LocalIdentity;
use crate::kubernetes::{AttachOptions, ClusterClient, ContextHandle};

use super::builder::{build_session_pod, SessionOverrides};
use super::discovery::find_reusable;
use super::error::{SessionError, SessionResult};
use super::events::spawn_event_monitor;
use super::heartbeat::{spawn_heartbeat, HEARTBEAT_INTERVAL};
use super::interrupt::spawn_interrupt_listener;
use super::pod;
use super::prompt::Prompter;
use super::readiness::{wait_for_ready, WaitOutcome};
use super::workload::resolve_workload;

/// What to start and how
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Label selector narrowing the candidate workloads
    pub selector: String,
    /// Workload name prefix
    pub name_filter: Option<String>,
    pub overrides: SessionOverrides,
    /// Leave the pod running after the session ends
    pub no_delete: bool,
}

/// How a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The attach stream ended (or fell back)
    Detached,
    /// The readiness wait or the attach was interrupted
    Interrupted,
}

/// Runs one session against a selected context
pub struct SessionController {
    context: ContextHandle,
    prompter: Arc<dyn Prompter>,
    identity: LocalIdentity,
    heartbeat_interval: Duration,
    handle_signals: bool,
}

impl SessionController {
    pub fn new(context: ContextHandle, prompter: Arc<dyn Prompter>, identity: LocalIdentity) -> Self {
        Self {
            context,
            prompter,
            identity,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            handle_signals: false,
        }
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Cancel the wait and the attach on Ctrl-C. Installed once a pod has
    /// been chosen; a second Ctrl-C during cleanup exits at once.
    pub fn with_signal_handling(mut self) -> Self {
        self.handle_signals = true;
        self
    }

    fn client(&self) -> &dyn ClusterClient {
        self.context.client().as_ref()
    }

    /// Run a session to completion.
    ///
    /// Cancelling `interrupt` ends the readiness wait or the attach; cleanup
    /// still runs. In raw mode Ctrl-C is sent to the remote terminal instead.
    pub async fn run(
        &self,
        options: &StartOptions,
        interrupt: &CancellationToken,
    ) -> SessionResult<SessionOutcome> {
        let workload = resolve_workload(
            self.client(),
            &options.selector,
            options.name_filter.as_deref(),
            self.prompter.as_ref(),
        )
        .await?;
        tracing::info!(
            "Using workload {}/{} in context {}",
            workload.namespace,
            workload.name,
            self.context.name()
        );

        let desired = build_session_pod(&workload, &options.overrides, &self.identity, Utc::now())?;
        let labels = desired.metadata.labels.clone().unwrap_or_default();

        let target = match find_reusable(
            self.client(),
            &workload.namespace,
            &labels,
            self.prompter.as_ref(),
        )
        .await?
        {
            Some(existing) => existing,
            None => {
                let created = self.client().create_pod(&workload.namespace, &desired).await?;
                println!("Created pod {}/{}", pod::namespace(&created), pod::name(&created));
                created
            }
        };

        let interrupt = interrupt.child_token();
        let listener = self
            .handle_signals
            .then(|| spawn_interrupt_listener(interrupt.clone()));

        let session = CancellationToken::new();
        let tasks = self.spawn_background(&target, &session);

        let result = self.attend(&target, &interrupt).await;

        // From here on a Ctrl-C abandons cleanup
        interrupt.cancel();
        session.cancel();
        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!("Background task failed: {}", e);
            }
        }

        // Nothing left to delete once the pod has vanished
        let vanished = matches!(result, Err(SessionError::PodNotFound(..)));
        if !options.no_delete && !vanished {
            self.delete(&target).await;
        }

        if let Some(listener) = listener {
            listener.abort();
        }
        result
    }

    fn spawn_background(&self, target: &Pod, session: &CancellationToken) -> Vec<JoinHandle<()>> {
        let namespace = pod::namespace(target).to_string();
        let mut tasks = vec![spawn_heartbeat(
            Arc::clone(self.context.client()),
            namespace.clone(),
            pod::name(target).to_string(),
            self.heartbeat_interval,
            session.child_token(),
        )];

        if let Some(uid) = target.metadata.uid.clone() {
            tasks.push(spawn_event_monitor(
                Arc::clone(self.context.client()),
                namespace,
                uid,
                session.child_token(),
                |event| eprintln!("{}: {}", event.reason, event.message),
            ));
        }

        tasks
    }

    async fn attend(&self, target: &Pod, interrupt: &CancellationToken) -> SessionResult<SessionOutcome> {
        let ready = match wait_for_ready(self.client(), target, interrupt).await? {
            WaitOutcome::Ready(ready) => ready,
            WaitOutcome::Completed(done) => {
                return Err(SessionError::AlreadyCompleted(
                    pod::namespace(&done).to_string(),
                    pod::name(&done).to_string(),
                ));
            }
            WaitOutcome::Interrupted => return Ok(SessionOutcome::Interrupted),
        };

        let options = AttachOptions {
            container: pod::first_container(&ready).map(|c| c.name.clone()),
            ..Default::default()
        };

        println!("Attaching...");
        let attach = self
            .client()
            .attach(pod::namespace(&ready), pod::name(&ready), &options);

        tokio::select! {
            biased;
            _ = interrupt.cancelled() => Ok(SessionOutcome::Interrupted),
            result = attach => {
                if let Err(e) = result {
                    eprintln!("Error attaching, falling back to logs: {}", e);
                }
                Ok(SessionOutcome::Detached)
            }
        }
    }

    async fn delete(&self, target: &Pod) {
        let namespace = pod::namespace(target);
        let name = pod::name(target);
        match self.client().delete_pod(namespace, name).await {
            Ok(()) => println!("\nDeleted pod {}/{}", namespace, name),
            Err(e) => println!("Failed to delete pod {}/{}: {}", namespace, name, e),
        }
    }
}
