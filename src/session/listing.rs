//! Listing session pods across contexts

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use k8s_openapi::api::core::v1::Pod;

use crate::kubernetes::{ContextConnector, KubeClientError};

use super::labels;
use super::pod;

const HEADERS: [&str; 7] = [
    "ENVIRONMENT",
    "NAME",
    "NAMESPACE",
    "CREATOR",
    "AGE",
    "IMAGE",
    "LABELS",
];

/// One session pod as shown by `ls`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRow {
    pub context: String,
    pub name: String,
    pub namespace: String,
    pub creator: String,
    pub age: String,
    pub image: String,
    pub labels: String,
}

impl SessionRow {
    pub fn from_pod(context: &str, pod: &Pod, now: DateTime<Utc>) -> Self {
        let age = pod::creation_time(pod)
            .map(|created| format_age(now - created))
            .unwrap_or_default();

        Self {
            context: context.to_string(),
            name: pod::name(pod).to_string(),
            namespace: pod::namespace(pod).to_string(),
            creator: pod
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(labels::CREATOR_NAME))
                .cloned()
                .unwrap_or_default(),
            age,
            image: pod::first_container(pod)
                .and_then(|c| c.image.clone())
                .unwrap_or_default(),
            labels: pod
                .metadata
                .labels
                .as_ref()
                .map(labels::user_visible)
                .unwrap_or_default(),
        }
    }

    fn cells(&self) -> [&str; 7] {
        [
            self.context.as_str(),
            self.name.as_str(),
            self.namespace.as_str(),
            self.creator.as_str(),
            self.age.as_str(),
            self.image.as_str(),
            self.labels.as_str(),
        ]
    }
}

/// Humanize a pod age: minutes below an hour, hours below a day, then days.
///
/// Values are rounded half to even.
pub fn format_age(age: chrono::Duration) -> String {
    // Clock skew can put the creation time slightly in the future
    let minutes = age.num_seconds().max(0) as f64 / 60.0;
    if minutes < 60.0 {
        format!("{}m", minutes.round_ties_even())
    } else if minutes < 24.0 * 60.0 {
        format!("{}h", (minutes / 60.0).round_ties_even())
    } else {
        format!("{}d", (minutes / (24.0 * 60.0)).round_ties_even())
    }
}

/// List session pods in every context of `contexts` concurrently.
///
/// Rows come back grouped by context in the order given. A context that
/// cannot be listed writes one line to `errors` and contributes no rows.
pub async fn list_sessions<W: Write>(
    connector: &dyn ContextConnector,
    contexts: &[String],
    everyone: bool,
    machine_id: &str,
    now: DateTime<Utc>,
    errors: &mut W,
) -> Vec<SessionRow> {
    let selector = labels::ownership_selector((!everyone).then_some(machine_id));

    let results = join_all(
        contexts
            .iter()
            .map(|context| list_context(connector, context, &selector)),
    )
    .await;

    let mut rows = Vec::new();
    for (context, result) in contexts.iter().zip(results) {
        match result {
            Ok(pods) => rows.extend(pods.iter().map(|p| SessionRow::from_pod(context, p, now))),
            Err(e) => {
                tracing::warn!("Listing {} failed: {}", context, e);
                let _ = writeln!(errors, "Error fetching pods for {}: {}", context, e);
            }
        }
    }
    rows
}

async fn list_context(
    connector: &dyn ContextConnector,
    context: &str,
    selector: &str,
) -> Result<Vec<Pod>, KubeClientError> {
    let handle = connector.select(context).await?;
    handle.client().list_pods(None, selector, None).await
}

/// Write `rows` as a table with two spaces between columns
pub fn render_table<W: Write>(out: &mut W, rows: &[SessionRow]) -> io::Result<()> {
    let mut widths = HEADERS.map(str::len);
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row.cells()) {
            *width = (*width).max(cell.len());
        }
    }

    write_line(out, &HEADERS, &widths)?;
    for row in rows {
        write_line(out, &row.cells(), &widths)?;
    }
    Ok(())
}

fn write_line<W: Write>(out: &mut W, cells: &[&str; 7], widths: &[usize; 7]) -> io::Result<()> {
    let last = cells.len() - 1;
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        if i == last {
            write!(out, "{}", cell)?;
        } else {
            write!(out, "{:<width$}  ", cell, width = width)?;
        }
    }
    writeln!(out)
}
