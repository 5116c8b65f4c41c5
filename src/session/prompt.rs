//! Interactive single-choice prompts

use dialoguer::Select;

use super::error::{SessionError, SessionResult};

/// Asks the user to pick one option
pub trait Prompter: Send + Sync {
    /// Index of the chosen option, or `None` if the user backed out
    fn select(&self, message: &str, options: &[String]) -> SessionResult<Option<usize>>;
}

/// Prompts on the controlling terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn select(&self, message: &str, options: &[String]) -> SessionResult<Option<usize>> {
        let result = run_blocking(|| {
            Select::new()
                .with_prompt(message)
                .items(options)
                .default(0)
                .interact_opt()
        });

        match result {
            Ok(choice) => Ok(choice),
            Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(SessionError::Prompt(e.to_string())),
        }
    }
}

/// Run `f`, which blocks on the terminal, without stalling other tasks on a
/// multi-threaded runtime's worker.
fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

/// Run a prompt, turning "backed out" into [`SessionError::Cancelled`]
pub fn choose(prompter: &dyn Prompter, message: &str, options: &[String]) -> SessionResult<usize> {
    prompter
        .select(message, options)?
        .ok_or(SessionError::Cancelled)
}
