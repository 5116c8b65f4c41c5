use crate::kubernetes::{ClusterClient, Workload};

use super::error::{SessionError, SessionResult};
use super::prompt::{choose, Prompter};

/// Find the workload to clone.
///
/// A name filter that matches exactly one workload by prefix selects it
/// directly; otherwise the user picks from the matches (or from every
/// workload when the filter matched nothing).
pub async fn resolve_workload(
    client: &dyn ClusterClient,
    label_selector: &str,
    name_filter: Option<&str>,
    prompter: &dyn Prompter,
) -> SessionResult<Workload> {
    let workloads = client.list_workloads(label_selector).await?;
    tracing::debug!("{} workloads match {}", workloads.len(), label_selector);
    select_workload(workloads, label_selector, name_filter, prompter)
}

fn select_workload(
    mut workloads: Vec<Workload>,
    label_selector: &str,
    name_filter: Option<&str>,
    prompter: &dyn Prompter,
) -> SessionResult<Workload> {
    if workloads.is_empty() {
        return Err(SessionError::NoMatchingWorkloads(label_selector.to_string()));
    }

    if let Some(filter) = name_filter.filter(|f| !f.is_empty()) {
        let matches = workloads.iter().filter(|w| w.name.starts_with(filter)).count();
        if matches > 0 {
            workloads.retain(|w| w.name.starts_with(filter));
        }
        if matches == 1 {
            return Ok(workloads.remove(0));
        }
    }

    let names: Vec<String> = workloads.iter().map(|w| w.name.clone()).collect();
    let index = choose(prompter, "Choose a workload:", &names)?;
    Ok(workloads.swap_remove(index))
}
