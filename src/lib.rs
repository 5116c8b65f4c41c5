pub mod config;
pub mod identity;
pub mod kubernetes;
pub mod session;

pub use config::AppConfig;
pub use identity::LocalIdentity;
pub use kubernetes::{ContextConnector, ContextHandle, ContextRegistry};
pub use session::{SessionController, SessionError, SessionOutcome, StartOptions};
