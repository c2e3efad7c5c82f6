use std::path::Path;
use std::sync::Arc;

use storage::kv::{FileKeyValueStore, InMemoryKeyValueStore, KeyValueStore};
use storage::repository::Storage;
use storage::snapshot::SnapshotStore;

use crate::Clock;
use crate::admin::{AdminConfig, AdminSettingsService};
use crate::error::AppServicesError;
use crate::history::AttemptHistoryService;
use crate::sessions::SessionOrchestrator;

/// Assembles app-facing services over one storage backend and one local
/// key-value store.
#[derive(Clone)]
pub struct AppServices {
    clock: Clock,
    storage: Storage,
    snapshots: SnapshotStore,
    history: Arc<AttemptHistoryService>,
    admin: Arc<AdminSettingsService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and a state directory for
    /// local slots (session snapshot, visibility overrides).
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails or the state
    /// directory cannot be created.
    pub async fn new_sqlite(
        db_url: &str,
        state_dir: impl AsRef<Path>,
        clock: Clock,
        admin: AdminConfig,
    ) -> Result<Self, AppServicesError> {
        std::fs::create_dir_all(state_dir.as_ref())?;
        let storage = Storage::sqlite(db_url).await?;
        let kv: Arc<dyn KeyValueStore> = Arc::new(FileKeyValueStore::new(state_dir));
        Ok(Self::assemble(clock, storage, kv, admin))
    }

    /// Services over in-memory storage, for tests and demos.
    #[must_use]
    pub fn in_memory(clock: Clock, admin: AdminConfig) -> Self {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKeyValueStore::new());
        Self::assemble(clock, Storage::in_memory(), kv, admin)
    }

    fn assemble(
        clock: Clock,
        storage: Storage,
        kv: Arc<dyn KeyValueStore>,
        admin: AdminConfig,
    ) -> Self {
        let snapshots = SnapshotStore::new(Arc::clone(&kv));
        let history = Arc::new(AttemptHistoryService::new(Arc::clone(&storage.attempts)));
        let admin = Arc::new(AdminSettingsService::new(admin, kv));
        Self {
            clock,
            storage,
            snapshots,
            history,
            admin,
        }
    }

    /// A fresh orchestrator sharing this instance's storage and snapshot slot.
    #[must_use]
    pub fn session(&self) -> SessionOrchestrator {
        SessionOrchestrator::from_storage(self.clock, &self.storage, self.snapshots.clone())
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn history(&self) -> Arc<AttemptHistoryService> {
        Arc::clone(&self.history)
    }

    #[must_use]
    pub fn admin(&self) -> Arc<AdminSettingsService> {
        Arc::clone(&self.admin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiz_core::model::{Subject, SubjectId};
    use quiz_core::time::fixed_now;
    use storage::repository::SubjectCatalog;

    #[tokio::test]
    async fn sessions_share_storage() {
        let services = AppServices::in_memory(Clock::fixed(fixed_now()), AdminConfig::disabled());
        let subject = Subject::with_defaults(SubjectId::from("ds"), "Data Structures", 60).unwrap();
        services.storage().subjects.upsert_subject(&subject).await.unwrap();

        let mut first = services.session();
        let mut second = services.session();

        assert!(!first.mount().await.unwrap());
        second.load_catalog().await.unwrap();
        assert_eq!(first.catalog(), second.catalog());
        assert!(services.history().list_recent(10).await.unwrap().is_empty());
        assert!(services.admin().login("x").is_err());
    }
}
