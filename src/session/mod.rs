pub mod builder;
pub mod controller;
pub mod discovery;
pub mod error;
pub mod events;
pub mod heartbeat;
pub mod interrupt;
pub mod labels;
pub mod listing;
pub mod pod;
pub mod prompt;
pub mod readiness;
pub mod resources;
pub mod workload;

pub use builder::{build_session_pod, SessionOverrides};
pub use controller::{SessionController, SessionOutcome, StartOptions};
pub use error::{ErrorKind, SessionError, SessionResult};
pub use listing::{format_age, list_sessions, render_table, SessionRow};
pub use prompt::{Prompter, TerminalPrompter};
pub use readiness::{ReadinessState, WaitOutcome};
