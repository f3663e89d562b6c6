use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{file_store::FileStore, memory_store::MemoryStore};
use crate::config::{SessionBackend, SessionConfig};
use crate::models::{Role, Session};

/// The SessionStore trait abstracts where the client keeps its auth state.
///
/// Stores never fail from the caller's point of view: a medium that cannot be
/// read or written degrades to the logged-out session on the next `get`.
pub trait SessionStore: Send + Sync {
    /// Returns the current session, all-absent when logged out.
    fn get(&self) -> Session;

    /// Atomically writes all four slots.
    fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        display_name: Option<&str>,
        role: Option<Role>,
    );

    /// Overwrites only the access token, leaving the other slots untouched.
    fn set_access_token(&self, access_token: &str);

    /// Overwrites the access token only if the stored refresh token is still
    /// `refresh_token`. Returns whether the write happened.
    fn set_access_token_if(&self, refresh_token: &str, access_token: &str) -> bool;

    /// Removes all four slots. Clearing an empty store is a no-op.
    fn clear(&self);

    /// Clears the store only if it still holds `refresh_token`. Returns
    /// whether anything was cleared.
    fn clear_if(&self, refresh_token: &str) -> bool;

    fn get_name(&self) -> &str;
}

/// The four named slots as they are persisted: human-readable strings only.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSlots {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl SessionSlots {
    pub fn new(
        access_token: &str,
        refresh_token: &str,
        display_name: Option<&str>,
        role: Option<Role>,
    ) -> Self {
        SessionSlots {
            access_token: Some(access_token.to_string()),
            refresh_token: Some(refresh_token.to_string()),
            username: display_name.map(str::to_string),
            role: role.map(String::from),
        }
    }

    /// Interprets the raw slots. Unknown roles read as no role at all.
    pub fn to_session(&self) -> Session {
        Session::from_parts(
            self.access_token.clone(),
            self.refresh_token.clone(),
            self.username.clone(),
            self.role.as_deref().and_then(|r| r.parse().ok()),
        )
    }

    /// Whether these slots belong to the session issued `refresh_token`.
    pub fn holds_refresh_token(&self, refresh_token: &str) -> bool {
        self.refresh_token.as_deref() == Some(refresh_token)
    }

    pub fn is_empty(&self) -> bool {
        *self == SessionSlots::default()
    }
}

/// Creates a concrete store implementation based on the SessionConfig.
/// If `session.enabled = false`, sessions are kept in memory only.
pub fn create_store(config: &SessionConfig) -> Arc<dyn SessionStore> {
    if !config.enabled {
        info!("Session persistence is disabled. Using MemoryStore.");
        return Arc::new(MemoryStore::new());
    }

    match &config.backend {
        Some(SessionBackend::File(file_config)) => {
            let store = FileStore::new(file_config);
            info!(
                "Persisting sessions to '{}'",
                store.path().to_string_lossy()
            );
            Arc::new(store)
        }
        Some(SessionBackend::Memory) => {
            info!("Using MemoryStore for sessions.");
            Arc::new(MemoryStore::new())
        }
        None => {
            info!("Session persistence enabled without a backend; falling back to MemoryStore.");
            Arc::new(MemoryStore::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::file_store::FileStoreConfig;

    #[test]
    fn test_slots_round_trip_into_session() {
        let slots = SessionSlots::new("A1", "R1", Some("alice"), Some(Role::Admin));
        assert_eq!(slots.role.as_deref(), Some("admin"));

        let session = slots.to_session();
        assert_eq!(session.bearer_token(), Some("A1"));
        assert_eq!(session.display_name.as_deref(), Some("alice"));
        assert_eq!(session.role, Some(Role::Admin));
    }

    #[test]
    fn test_mixed_case_role_slot_is_understood() {
        let slots = SessionSlots {
            access_token: Some("A1".into()),
            refresh_token: Some("R1".into()),
            username: None,
            role: Some("Admin".into()),
        };
        assert_eq!(slots.to_session().role, Some(Role::Admin));
    }

    #[test]
    fn test_unknown_role_slot_reads_as_none() {
        let slots = SessionSlots {
            role: Some("auditor".into()),
            ..SessionSlots::new("A1", "R1", None, None)
        };
        let session = slots.to_session();
        assert!(session.is_authenticated());
        assert_eq!(session.role, None);
    }

    #[test]
    fn test_create_store_disabled_is_memory() {
        let store = create_store(&SessionConfig::default());
        assert_eq!(store.get_name(), "memory");
    }

    #[test]
    fn test_create_store_file_backend() {
        let dir = tempfile::tempdir().unwrap();
        let store = create_store(&SessionConfig {
            enabled: true,
            backend: Some(SessionBackend::File(FileStoreConfig {
                directory: dir.path().to_path_buf(),
                namespace: "inventory".to_string(),
            })),
        });
        assert_eq!(store.get_name(), "file");
    }
}
