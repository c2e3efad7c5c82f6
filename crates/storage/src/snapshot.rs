//! Best-effort persistence of the in-progress session for resume after reload.

use std::sync::Arc;

use quiz_core::model::PersistedSnapshot;

use crate::kv::KeyValueStore;

/// The single slot holding the in-progress session.
pub const SESSION_SNAPSHOT_KEY: &str = "online-test-app-state";

/// Codec between `PersistedSnapshot` and the key-value slot.
///
/// Never fails: write errors are logged and dropped, and unreadable or
/// malformed content reads back as "no saved session".
#[derive(Clone)]
pub struct SnapshotStore {
    kv: Arc<dyn KeyValueStore>,
}

impl SnapshotStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    pub fn save(&self, snapshot: &PersistedSnapshot) {
        let raw = match serde_json::to_string(snapshot) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!(error = %e, "failed to encode session snapshot");
                return;
            }
        };
        if let Err(e) = self.kv.set(SESSION_SNAPSHOT_KEY, &raw) {
            tracing::debug!(error = %e, "failed to store session snapshot");
        }
    }

    #[must_use]
    pub fn load(&self) -> Option<PersistedSnapshot> {
        let raw = match self.kv.get(SESSION_SNAPSHOT_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(error = %e, "failed to read session snapshot");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::debug!(error = %e, "discarding malformed session snapshot");
                None
            }
        }
    }

    pub fn clear(&self) {
        if let Err(e) = self.kv.delete(SESSION_SNAPSHOT_KEY) {
            tracing::debug!(error = %e, "failed to clear session snapshot");
        }
    }
}
