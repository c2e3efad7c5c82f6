#![forbid(unsafe_code)]

pub mod admin;
pub mod app_services;
pub mod error;
pub mod history;
pub mod sessions;
pub mod timer;

pub use quiz_core::Clock;
pub use sessions as session;

pub use admin::{AdminConfig, AdminSettingsService};
pub use app_services::AppServices;
pub use error::{AdminError, AppServicesError, HistoryError, SessionError};
pub use history::{AttemptHistoryService, GlobalStats, SubjectStats};
pub use sessions::{QuestionLoader, SessionEvent, SessionOrchestrator, SessionProgress};
pub use timer::{Timer, TimerRun};
