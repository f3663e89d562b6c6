use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{SessionSlots, SessionStore};
use crate::models::{Role, Session};

/// Where the file store keeps its slots: `<directory>/<namespace>.json`.
#[derive(Deserialize, Serialize, Debug, Clone, JsonSchema)]
pub struct FileStoreConfig {
    pub directory: PathBuf,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "stockgate".to_string()
}

/// Persists the session as a small pretty-printed JSON document so it survives
/// process restarts. Writes go through a temporary file and a rename, so a
/// reader never observes half a session.
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(config: &FileStoreConfig) -> Self {
        if let Err(e) = fs::create_dir_all(&config.directory) {
            warn!(
                event_name = "store.file.create_dir.failed",
                event_domain = "store",
                directory = %config.directory.display(),
                error = %e,
                "could not create session directory; sessions will read as logged out"
            );
        }
        FileStore {
            path: config.directory.join(format!("{}.json", config.namespace)),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slots(&self) -> SessionSlots {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return SessionSlots::default(),
            Err(e) => {
                warn!(
                    event_name = "store.file.read.failed",
                    event_domain = "store",
                    path = %self.path.display(),
                    error = %e,
                    "could not read session file"
                );
                return SessionSlots::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(
                event_name = "store.file.parse.failed",
                event_domain = "store",
                path = %self.path.display(),
                error = %e,
                "session file is not valid JSON; treating as logged out"
            );
            SessionSlots::default()
        })
    }

    fn write_slots(&self, slots: &SessionSlots) {
        if let Err(e) = self.try_write(slots) {
            warn!(
                event_name = "store.file.write.failed",
                event_domain = "store",
                path = %self.path.display(),
                error = %e,
                "could not persist session"
            );
        }
    }

    fn try_write(&self, slots: &SessionSlots) -> io::Result<()> {
        if slots.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        }
        let contents = serde_json::to_string_pretty(slots)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut SessionSlots)) {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut slots = self.read_slots();
        f(&mut slots);
        self.write_slots(&slots);
    }

    /// Like `update`, but only while the file still holds `refresh_token`.
    fn update_if(&self, refresh_token: &str, f: impl FnOnce(&mut SessionSlots)) -> bool {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut slots = self.read_slots();
        if !slots.holds_refresh_token(refresh_token) {
            return false;
        }
        f(&mut slots);
        self.write_slots(&slots);
        true
    }
}

impl SessionStore for FileStore {
    fn get(&self) -> Session {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read_slots().to_session()
    }

    fn save(
        &self,
        access_token: &str,
        refresh_token: &str,
        display_name: Option<&str>,
        role: Option<Role>,
    ) {
        self.update(|slots| {
            *slots = SessionSlots::new(access_token, refresh_token, display_name, role)
        });
    }

    fn set_access_token(&self, access_token: &str) {
        self.update(|slots| slots.access_token = Some(access_token.to_string()));
    }

    fn set_access_token_if(&self, refresh_token: &str, access_token: &str) -> bool {
        self.update_if(refresh_token, |slots| {
            slots.access_token = Some(access_token.to_string())
        })
    }

    fn clear(&self) {
        self.update(|slots| *slots = SessionSlots::default());
    }

    fn clear_if(&self, refresh_token: &str) -> bool {
        self.update_if(refresh_token, |slots| *slots = SessionSlots::default())
    }

    fn get_name(&self) -> &str {
        "file"
    }
}
