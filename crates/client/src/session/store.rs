//! Durable client-side credential storage.
//!
//! The session persists its token and user record to a key-value store so a
//! restarted process can resume an authenticated session. Writes are best
//! effort: a failed flush is logged and the in-memory view stays
//! authoritative, so storage trouble can never take the session down.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Fixed storage keys for session data.
pub mod keys {
    /// Key for the bearer credential.
    pub const TOKEN: &str = "token";

    /// Key for the serialized user record.
    pub const USER: &str = "user";
}

/// Durable key-value storage for session credentials.
pub trait CredentialStore: Send + Sync {
    /// Read a value.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value.
    fn set(&self, key: &str, value: &str);

    /// Delete a value. Deleting an absent key is a no-op.
    fn remove(&self, key: &str);
}

/// In-memory store. Used in tests and by consumers that do not want
/// credentials to outlive the process.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// JSON-file-backed store.
///
/// The whole map is rewritten on every mutation; session data is two small
/// strings, so this stays cheap. An unreadable or corrupt file is treated as
/// empty rather than an error.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Open a store at `path`, loading any previously persisted entries.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path);
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn load(path: &Path) -> HashMap<String, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "session file is corrupt; starting empty"
                    );
                    HashMap::new()
                }
            },
            // Missing file is the normal first-run case.
            Err(_) => HashMap::new(),
        }
    }

    fn flush(&self, entries: &HashMap<String, String>) {
        let serialized = match serde_json::to_string(entries) {
            Ok(s) => s,
            Err(err) => {
                tracing::warn!(error = %err, "could not serialize session entries");
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.path, serialized) {
            tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "could not persist session entries"
            );
        }
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock();
        entries.insert(key.to_owned(), value.to_owned());
        self.flush(&entries);
    }

    fn remove(&self, key: &str) {
        let mut entries = self.entries.lock();
        if entries.remove(key).is_some() {
            self.flush(&entries);
        }
    }
}
