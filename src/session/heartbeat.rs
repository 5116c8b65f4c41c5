//! Liveness heartbeat
//!
//! While a session is attached its pod's heartbeat annotation is refreshed
//! periodically. A reaper that finds a heartbeat older than the pod's
//! timeout annotation may delete the pod.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::kubernetes::{ClusterClient, KubeClientError};

use super::builder::heartbeat_timestamp;
use super::labels;

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Merge patch touching only the heartbeat annotation
pub fn heartbeat_patch(now: DateTime<Utc>) -> serde_json::Value {
    serde_json::json!({
        "metadata": {
            "annotations": {
                labels::HEARTBEAT: heartbeat_timestamp(now),
            }
        }
    })
}

pub async fn send_heartbeat(
    client: &dyn ClusterClient,
    namespace: &str,
    name: &str,
) -> Result<(), KubeClientError> {
    client
        .patch_pod(namespace, name, &heartbeat_patch(Utc::now()))
        .await?;
    tracing::debug!("Heartbeat sent for {}/{}", namespace, name);
    Ok(())
}

/// Refresh the heartbeat every `interval` until `cancel` fires.
///
/// Failed patches are logged and retried on the next tick.
pub fn spawn_heartbeat(
    client: Arc<dyn ClusterClient>,
    namespace: String,
    name: String,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; creation already stamped a heartbeat
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = send_heartbeat(client.as_ref(), &namespace, &name).await {
                        tracing::warn!("Error updating heartbeat on pod {}/{}: {}", namespace, name, e);
                    }
                }
            }
        }

        tracing::debug!("Heartbeat for {}/{} stopped", namespace, name);
    })
}
