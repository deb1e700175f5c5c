//! Session store
//!
//! Owns the token pair and the cached user identity. Every mutation goes
//! through this type and is written to the configured [`SessionStorage`].
//! The authenticated flag is never stored; it is derived from the presence
//! of the access token on every read.

use crate::storage::{MemoryStorage, SessionStorage};
use crate::types::UserIdentity;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

/// The persisted part of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserIdentity>,
}

impl SessionRecord {
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    fn normalized(self) -> Self {
        Self {
            access_token: non_empty(self.access_token),
            refresh_token: non_empty(self.refresh_token),
            user: self.user,
        }
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[derive(Debug)]
struct SessionState {
    record: SessionRecord,
    loading: bool,
}

struct StoreInner {
    state: RwLock<SessionState>,
    storage: Arc<dyn SessionStorage>,
}

/// Shared handle to the session state. Clones refer to the same session.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("SessionStore")
            .field("is_authenticated", &state.record.is_authenticated())
            .field("has_refresh_token", &state.record.refresh_token.is_some())
            .field("loading", &state.loading)
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SessionStore {
    pub fn new(storage: impl SessionStorage + 'static) -> Self {
        Self::with_storage(Arc::new(storage))
    }

    /// Store backed by process-local memory
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    pub fn with_storage(storage: Arc<dyn SessionStorage>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: RwLock::new(SessionState {
                    record: SessionRecord::default(),
                    loading: true,
                }),
                storage,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> SessionRecord {
        self.read().record.clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().record.access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().record.refresh_token.clone()
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.read().record.user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().record.is_authenticated()
    }

    /// True until [`restore_from_persistence`](Self::restore_from_persistence) has run
    pub fn is_loading(&self) -> bool {
        self.read().loading
    }

    /// Replace both tokens. `None, None` clears the credentials.
    pub fn set_tokens(&self, access: Option<String>, refresh: Option<String>) {
        let mut state = self.write();
        state.record.access_token = non_empty(access);
        state.record.refresh_token = non_empty(refresh);
        debug!(
            is_authenticated = state.record.is_authenticated(),
            "Tokens set"
        );
        self.persist(&state.record);
    }

    /// Replace the cached identity
    pub fn set_user(&self, user: Option<UserIdentity>) {
        let mut state = self.write();
        debug!(user = user.as_ref().map(UserIdentity::display_name), "User set");
        state.record.user = user;
        self.persist(&state.record);
    }

    /// Clear tokens and identity. Safe to call repeatedly.
    pub fn logout(&self) {
        info!("Logging out");
        let mut state = self.write();
        state.record = SessionRecord::default();
        self.persist(&state.record);
    }

    /// Load the persisted record and mark the store ready.
    ///
    /// Returns whether a session with an access token was restored. The store
    /// is marked ready even when nothing was persisted or the stored record
    /// could not be read.
    pub fn restore_from_persistence(&self) -> bool {
        let record = match self.inner.storage.load() {
            Ok(Some(record)) => record.normalized(),
            Ok(None) => SessionRecord::default(),
            Err(e) => {
                warn!(error = %e, "Discarding unreadable persisted session");
                SessionRecord::default()
            }
        };

        let mut state = self.write();
        state.record = record;
        state.loading = false;

        let restored = state.record.is_authenticated();
        if restored {
            info!("Auth initialized from storage. User is authenticated.");
        } else {
            info!("Auth initialized. No valid tokens found.");
        }
        restored
    }

    fn persist(&self, record: &SessionRecord) {
        if let Err(e) = self.inner.storage.save(record) {
            warn!(error = %e, "Failed to persist session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> UserIdentity {
        UserIdentity {
            id: Some(1),
            username: Some("alice".into()),
            email: Some("alice@example.com".into()),
            ..UserIdentity::default()
        }
    }

    #[test]
    fn authenticated_follows_access_token() {
        let store = SessionStore::in_memory();
        store.set_tokens(None, None);
        assert!(!store.is_authenticated());

        store.set_tokens(Some("t1".into()), Some("r1".into()));
        assert!(store.is_authenticated());
        assert_eq!(store.access_token().as_deref(), Some("t1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));

        store.set_tokens(None, Some("r1".into()));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn empty_tokens_count_as_absent() {
        let store = SessionStore::in_memory();
        store.set_tokens(Some(String::new()), Some(String::new()));
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token(), None);
    }

    #[test]
    fn user_is_independent_of_tokens() {
        let store = SessionStore::in_memory();
        store.set_user(Some(alice()));
        assert!(!store.is_authenticated());
        assert_eq!(store.user(), Some(alice()));

        store.set_tokens(Some("t1".into()), Some("r1".into()));
        store.set_user(None);
        assert!(store.is_authenticated());
        assert_eq!(store.user(), None);
    }

    #[test]
    fn logout_is_idempotent_and_persisted() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        store.set_tokens(Some("t1".into()), Some("r1".into()));
        store.set_user(Some(alice()));

        store.logout();
        store.logout();

        assert_eq!(store.snapshot(), SessionRecord::default());
        assert_eq!(storage.load().unwrap(), Some(SessionRecord::default()));
    }

    #[test]
    fn restore_round_trip() {
        let storage = MemoryStorage::new();
        let store = SessionStore::new(storage.clone());
        store.set_tokens(Some("t1".into()), Some("r1".into()));
        store.set_user(Some(alice()));

        let restarted = SessionStore::new(storage);
        assert!(restarted.is_loading());
        assert!(!restarted.is_authenticated());

        assert!(restarted.restore_from_persistence());
        assert!(!restarted.is_loading());
        assert!(restarted.is_authenticated());
        assert_eq!(restarted.snapshot(), store.snapshot());
    }

    #[test]
    fn restore_without_session_still_becomes_ready() {
        let store = SessionStore::in_memory();
        assert!(!store.restore_from_persistence());
        assert!(!store.is_loading());
        assert!(!store.is_authenticated());
    }

    #[test]
    fn restore_discards_unreadable_record() {
        let store = SessionStore::new(MemoryStorage::with_raw("{not json"));
        assert!(!store.restore_from_persistence());
        assert!(!store.is_loading());
        assert_eq!(store.snapshot(), SessionRecord::default());
    }

    #[test]
    fn restore_recomputes_flag_from_tokens() {
        let raw = r#"{"state":{"accessToken":"","refreshToken":"r1","user":null,"isAuthenticated":true},"version":0}"#;
        let store = SessionStore::new(MemoryStorage::with_raw(raw));
        assert!(!store.restore_from_persistence());
        assert!(!store.is_authenticated());
        assert_eq!(store.refresh_token().as_deref(), Some("r1"));
    }
}
