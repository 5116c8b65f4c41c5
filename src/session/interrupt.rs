//! Ctrl-C handling for the interruptible phases of a session

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second Ctrl-C abandons cleanup
pub const FORCED_EXIT_CODE: i32 = 130;

/// What a Ctrl-C does given the state of `token`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// Cancel the current phase and let cleanup run
    Cancel,
    /// Cleanup is already underway; leave immediately
    Exit,
}

pub fn interrupt_action(token: &CancellationToken) -> InterruptAction {
    if token.is_cancelled() {
        InterruptAction::Exit
    } else {
        InterruptAction::Cancel
    }
}

/// Turn Ctrl-C into cancellation of `token`.
///
/// While this listener runs SIGINT no longer terminates the process; abort
/// the returned handle once the interruptible phases are over.
pub fn spawn_interrupt_listener(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Could not listen for Ctrl-C: {}", e);
                return;
            }
            match interrupt_action(&token) {
                InterruptAction::Cancel => {
                    tracing::debug!("Interrupt received");
                    token.cancel();
                }
                InterruptAction::Exit => {
                    eprintln!("Interrupted again, exiting without cleanup");
                    std::process::exit(FORCED_EXIT_CODE);
                }
            }
        }
    })
}
