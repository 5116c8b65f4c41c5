//! Best-effort event monitor
//!
//! Surfaces scheduling diagnostics (image pulls, failed scheduling, ...) for
//! the session pod while the user waits.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::kubernetes::{ClusterClient, ClusterEvent};

/// Stream events for the object with `uid`, calling `on_event` once per event
/// until `cancel` fires or the stream ends.
pub fn spawn_event_monitor<F>(
    client: Arc<dyn ClusterClient>,
    namespace: String,
    uid: String,
    cancel: CancellationToken,
    mut on_event: F,
) -> JoinHandle<()>
where
    F: FnMut(&ClusterEvent) + Send + 'static,
{
    tokio::spawn(async move {
        let mut stream = match client.stream_events(&namespace, &uid).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Could not watch events for {}: {}", uid, e);
                return;
            }
        };

        let mut seen = HashSet::new();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = stream.next() => match next {
                    Some(Ok(event)) => {
                        // Repeated events are re-delivered as updates
                        if seen.insert(event.name.clone()) {
                            on_event(&event);
                        }
                    }
                    Some(Err(e)) if e.is_access_denied() => {
                        tracing::warn!("Giving up on events for {}: {}", uid, e);
                        break;
                    }
                    Some(Err(e)) => tracing::warn!("Event watch error: {}", e),
                    None => break,
                },
            }
        }

        tracing::debug!("Event monitor for {} stopped", uid);
    })
}
