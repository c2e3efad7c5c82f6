mod loader;
mod progress;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use loader::QuestionLoader;
pub use progress::SessionProgress;
pub use workflow::{FetchToken, SessionEvent, SessionOrchestrator};
