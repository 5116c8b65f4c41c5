use thiserror::Error;

use crate::kubernetes::KubeClientError;

use super::resources::ResourceSpecError;

/// Broad classes of session failures, deciding how the CLI reacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad selector, unknown context, nothing to pick from
    UserInput,
    /// The user backed out of a prompt
    Cancelled,
    /// The session pod vanished
    NotFound,
    /// The session pod exited before it could be attached
    AlreadyCompleted,
    /// Environment or API failure
    Fatal,
}

/// Errors that can occur while running a session
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("No matching workloads found. label-selector is currently: {0}")]
    NoMatchingWorkloads(String),

    #[error("Workload {0} has no containers in its pod template")]
    NoContainers(String),

    #[error("Cancelled")]
    Cancelled,

    #[error("Invalid resource specification: {0}")]
    InvalidResourceSpec(#[from] ResourceSpecError),

    #[error("Pod {0}/{1} not found")]
    PodNotFound(String, String),

    #[error("Pod {0}/{1} failed or ran to completion")]
    AlreadyCompleted(String, String),

    #[error("Watch on pod {0}/{1} ended unexpectedly")]
    WatchEnded(String, String),

    #[error("Prompt failed: {0}")]
    Prompt(String),

    #[error(transparent)]
    Client(KubeClientError),
}

impl From<KubeClientError> for SessionError {
    fn from(err: KubeClientError) -> Self {
        match err {
            KubeClientError::PodNotFound(namespace, name) => Self::PodNotFound(namespace, name),
            other => Self::Client(other),
        }
    }
}

impl SessionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoMatchingWorkloads(_) | Self::NoContainers(_) => ErrorKind::UserInput,
            Self::Client(KubeClientError::ContextNotFound { .. }) => ErrorKind::UserInput,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::PodNotFound(..) => ErrorKind::NotFound,
            Self::AlreadyCompleted(..) => ErrorKind::AlreadyCompleted,
            Self::InvalidResourceSpec(_)
            | Self::WatchEnded(..)
            | Self::Prompt(_)
            | Self::Client(_) => ErrorKind::Fatal,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Cancelled => 0,
            _ => 1,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;
