use std::sync::Mutex;

use super::{SessionSlots, SessionStore};
use crate::models::{Role, Session};

/// A process-local store. Sessions vanish when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<SessionSlots>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_slots<R>(&self, f: impl FnOnce(&mut SessionSlots) -> R) -> R {
        // A panic while holding the lock cannot leave the slots half-written.
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut slots)
    }
}

impl SessionStore for MemoryStore {
    fn get(&self) -> Session {
        self.with_slots(|slots| slots.to_session())
    }

    fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        display_name: Option<&str>,
        role: Option<Role>,
    ) {
        self.with_slots(|slots| {
            *slots = SessionSlots::new(access_token, refresh_token, display_name, role)
        });
    }

    fn set_access_token(&self, access_token: &str) {
        self.with_slots(|slots| slots.access_token = Some(access_token.to_string()));
    }

    fn set_access_token_if(&self, refresh_token: &str, access_token: &str) -> bool {
        self.with_slots(|slots| {
            if !slots.holds_refresh_token(refresh_token) {
                return false;
            }
            slots.access_token = Some(access_token.to_string());
            true
        })
    }

    fn clear(&self) {
        self.with_slots(|slots| *slots = SessionSlots::default());
    }

    fn clear_if(&self, refresh_token: &str) -> bool {
        self.with_slots(|slots| {
            if !slots.holds_refresh_token(refresh_token) {
                return false;
            }
            *slots = SessionSlots::default();
            true
        })
    }

    fn get_name(&self) -> &str {
        "memory"
    }
}
