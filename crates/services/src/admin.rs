//! Shared-secret admin gate and per-subject visibility overrides.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use quiz_core::model::{Subject, SubjectId};
use storage::kv::KeyValueStore;

use crate::error::AdminError;

/// Slot holding the visibility overrides as a JSON object of `subjectId -> bool`.
pub const VISIBILITY_KEY: &str = "admin-test-visibility";

/// Admin access configuration supplied by the host application.
#[derive(Clone, Default)]
pub struct AdminConfig {
    password: Option<String>,
}

impl AdminConfig {
    /// Admin access enabled with the given shared secret. A blank secret disables it.
    #[must_use]
    pub fn with_password(password: impl Into<String>) -> Self {
        let password = password.into();
        Self {
            password: (!password.trim().is_empty()).then_some(password),
        }
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.password.is_some()
    }
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}

/// Subject visibility as seen by learners, editable after admin login.
#[derive(Clone)]
pub struct AdminSettingsService {
    config: AdminConfig,
    kv: Arc<dyn KeyValueStore>,
    authenticated: Arc<AtomicBool>,
}

impl AdminSettingsService {
    #[must_use]
    pub fn new(config: AdminConfig, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            config,
            kv,
            authenticated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Check `password` against the configured secret and remember the outcome.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Disabled` when no secret is configured.
    pub fn login(&self, password: &str) -> Result<bool, AdminError> {
        let expected = self.config.password.as_deref().ok_or(AdminError::Disabled)?;
        let ok = expected == password;
        self.authenticated.store(ok, Ordering::SeqCst);
        if ok {
            tracing::info!("admin logged in");
        } else {
            tracing::warn!("rejected admin login");
        }
        Ok(ok)
    }

    pub fn logout(&self) {
        self.authenticated.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    /// Stored overrides. Unreadable or malformed content reads as no overrides.
    #[must_use]
    pub fn overrides(&self) -> BTreeMap<SubjectId, bool> {
        let raw = match self.kv.get(VISIBILITY_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(e) => {
                tracing::debug!(error = %e, "failed to read visibility overrides");
                return BTreeMap::new();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "discarding malformed visibility overrides");
            BTreeMap::new()
        })
    }

    /// Whether learners can pick `subject`: the override if present, else the
    /// subject's own active flag.
    #[must_use]
    pub fn is_visible(&self, subject: &Subject) -> bool {
        visible_with(&self.overrides(), subject)
    }

    /// Filter the catalog down to subjects learners can pick, keeping order.
    #[must_use]
    pub fn visible_subjects(&self, catalog: &[Subject]) -> Vec<Subject> {
        let overrides = self.overrides();
        catalog
            .iter()
            .filter(|subject| visible_with(&overrides, subject))
            .cloned()
            .collect()
    }

    /// Override one subject's visibility.
    ///
    /// # Errors
    ///
    /// Returns `AdminError::Unauthenticated` before a successful login, or a
    /// storage/encoding error if the overrides cannot be written.
    pub fn set_visibility(&self, subject_id: &SubjectId, visible: bool) -> Result<(), AdminError> {
        let mut overrides = self.overrides();
        overrides.insert(subject_id.clone(), visible);
        self.save_overrides(&overrides)
    }

    /// Drop the override so the subject's active flag applies again.
    ///
    /// # Errors
    ///
    /// Same as [`AdminSettingsService::set_visibility`].
    pub fn reset_visibility(&self, subject_id: &SubjectId) -> Result<(), AdminError> {
        let mut overrides = self.overrides();
        overrides.remove(subject_id);
        self.save_overrides(&overrides)
    }

    fn save_overrides(&self, overrides: &BTreeMap<SubjectId, bool>) -> Result<(), AdminError> {
        if !self.is_authenticated() {
            return Err(AdminError::Unauthenticated);
        }
        let raw = serde_json::to_string(overrides)?;
        self.kv.set(VISIBILITY_KEY, &raw)?;
        Ok(())
    }
}

fn visible_with(overrides: &BTreeMap<SubjectId, bool>, subject: &Subject) -> bool {
    overrides
        .get(subject.id())
        .copied()
        .unwrap_or_else(|| subject.is_active())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::kv::InMemoryKeyValueStore;

    fn subject(id: &str, active: bool) -> Subject {
        Subject::new(SubjectId::from(id), id.to_uppercase(), 60, 90, active, 0).unwrap()
    }

    fn service() -> (AdminSettingsService, Arc<InMemoryKeyValueStore>) {
        let kv = Arc::new(InMemoryKeyValueStore::new());
        let admin = AdminSettingsService::new(AdminConfig::with_password("s3cret"), kv.clone());
        (admin, kv)
    }

    #[test]
    fn login_requires_matching_secret() {
        let (admin, _) = service();

        assert!(!admin.login("wrong").unwrap());
        assert!(!admin.is_authenticated());
        assert!(admin.login("s3cret").unwrap());
        assert!(admin.is_authenticated());

        admin.logout();
        assert!(!admin.is_authenticated());
    }

    #[test]
    fn disabled_config_rejects_login() {
        let admin = AdminSettingsService::new(
            AdminConfig::with_password("   "),
            Arc::new(InMemoryKeyValueStore::new()),
        );

        assert!(matches!(admin.login("anything"), Err(AdminError::Disabled)));
    }

    #[test]
    fn active_flag_applies_without_overrides() {
        let (admin, _) = service();
        let catalog = vec![subject("a", true), subject("b", false)];

        let visible = admin.visible_subjects(&catalog);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id().as_str(), "a");
    }

    #[test]
    fn overrides_win_over_active_flag() {
        let (admin, kv) = service();
        admin.login("s3cret").unwrap();
        admin.set_visibility(&SubjectId::from("a"), false).unwrap();
        admin.set_visibility(&SubjectId::from("b"), true).unwrap();
        let catalog = vec![subject("a", true), subject("b", false)];

        let visible = admin.visible_subjects(&catalog);

        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id().as_str(), "b");
        let raw = kv.get(VISIBILITY_KEY).unwrap().unwrap();
        assert_eq!(raw, r#"{"a":false,"b":true}"#);

        admin.reset_visibility(&SubjectId::from("a")).unwrap();
        assert!(admin.is_visible(&catalog[0]));
    }

    #[test]
    fn changes_require_login() {
        let (admin, _) = service();

        let err = admin.set_visibility(&SubjectId::from("a"), false).unwrap_err();

        assert!(matches!(err, AdminError::Unauthenticated));
    }

    #[test]
    fn malformed_overrides_are_ignored() {
        let (admin, kv) = service();
        kv.set(VISIBILITY_KEY, "not json").unwrap();

        assert!(admin.overrides().is_empty());
        assert!(admin.is_visible(&subject("a", true)));
    }
}
