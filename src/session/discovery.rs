//! Reattaching to session pods that are still running

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::Pod;

use crate::kubernetes::ClusterClient;

use super::error::SessionResult;
use super::labels::selector_from_labels;
use super::pod;
use super::prompt::{choose, Prompter};

const RUNNING_FIELD_SELECTOR: &str = "status.phase=Running";

/// Prompt line describing a running session pod
pub fn describe_candidate(candidate: &Pod) -> String {
    let command = pod::first_container(candidate)
        .and_then(|c| c.command.as_ref())
        .filter(|command| !command.is_empty())
        .map(|command| command.join(" "))
        .unwrap_or_else(|| "<default command>".to_string());
    let created = pod::creation_time(candidate)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "at an unknown time".to_string());
    format!("{} : Created {}", command, created)
}

/// Look for a running pod carrying exactly `labels` and ask whether to reuse it.
///
/// Returns `None` when nothing is running or the user chose to create a new
/// pod. A failed lookup is not fatal; a new pod is created instead.
pub async fn find_reusable(
    client: &dyn ClusterClient,
    namespace: &str,
    labels: &BTreeMap<String, String>,
    prompter: &dyn Prompter,
) -> SessionResult<Option<Pod>> {
    let selector = selector_from_labels(labels);
    let candidates = match client
        .list_pods(Some(namespace), &selector, Some(RUNNING_FIELD_SELECTOR))
        .await
    {
        Ok(pods) => pods,
        Err(e) => {
            tracing::warn!("Error finding already running session pods: {}", e);
            eprintln!("Error finding already running session pods. Defaulting to creating a new one");
            return Ok(None);
        }
    };

    choose_candidate(candidates, prompter)
}

fn choose_candidate(mut candidates: Vec<Pod>, prompter: &dyn Prompter) -> SessionResult<Option<Pod>> {
    if candidates.is_empty() {
        return Ok(None);
    }

    let mut options = Vec::with_capacity(candidates.len() + 1);
    options.push("Create a new session pod".to_string());
    options.extend(candidates.iter().map(describe_candidate));

    let index = choose(
        prompter,
        "Existing session pod found, would you like to create a new one or attach to an existing one?",
        &options,
    )?;

    if index == 0 {
        return Ok(None);
    }
    Ok(Some(candidates.swap_remove(index - 1)))
}
