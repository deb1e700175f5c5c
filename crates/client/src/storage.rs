//! Persistence backends for the session record

use crate::store::SessionRecord;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Version written into the persisted envelope
pub const STORAGE_VERSION: u32 = 0;

/// Storage error types
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Stored session is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Stored session has unsupported version {0}")]
    UnsupportedVersion(u32),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// On-disk / in-browser shape of the persisted record
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    state: SessionRecord,
    version: u32,
}

/// Encode a record into its persisted form
pub fn encode(record: &SessionRecord) -> Result<String, StorageError> {
    let envelope = PersistedSession {
        state: record.clone(),
        version: STORAGE_VERSION,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a persisted record
pub fn decode(raw: &str) -> Result<SessionRecord, StorageError> {
    let envelope: PersistedSession = serde_json::from_str(raw)?;
    if envelope.version != STORAGE_VERSION {
        return Err(StorageError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope.state)
}

/// Save/load a single session record.
///
/// Implementations only move the encoded record around; they never
/// interpret it.
pub trait SessionStorage: Send + Sync {
    /// Load the raw record, `None` when nothing has been saved yet
    fn load_raw(&self) -> Result<Option<String>, StorageError>;

    /// Replace the raw record
    fn save_raw(&self, raw: &str) -> Result<(), StorageError>;

    /// Load and decode the record
    fn load(&self) -> Result<Option<SessionRecord>, StorageError> {
        self.load_raw()?.as_deref().map(decode).transpose()
    }

    /// Encode and save the record
    fn save(&self, record: &SessionRecord) -> Result<(), StorageError> {
        self.save_raw(&encode(record)?)
    }
}

/// Process-local storage.
///
/// Clones share the same slot, so a second store built from a clone sees
/// what the first one saved, as after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-seeded with a raw record
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(raw.into()))),
        }
    }

    /// Current raw contents
    pub fn raw(&self) -> Option<String> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

impl SessionStorage for MemoryStorage {
    fn load_raw(&self) -> Result<Option<String>, StorageError> {
        let slot = self
            .slot
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))?;
        Ok(slot.clone())
    }

    fn save_raw(&self, raw: &str) -> Result<(), StorageError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| StorageError::Unavailable("memory storage lock poisoned".into()))?;
        *slot = Some(raw.to_string());
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

#[cfg(not(target_arch = "wasm32"))]
mod file {
    use super::{SessionStorage, StorageError};
    use std::path::{Path, PathBuf};

    /// JSON file holding the session record
    #[derive(Debug, Clone)]
    pub struct FileStorage {
        path: PathBuf,
    }

    impl FileStorage {
        pub fn new(path: impl Into<PathBuf>) -> Self {
            Self { path: path.into() }
        }

        /// `<dir>/<key>.json`
        pub fn in_dir(dir: impl AsRef<Path>, key: &str) -> Self {
            Self::new(dir.as_ref().join(format!("{key}.json")))
        }

        pub fn path(&self) -> &Path {
            &self.path
        }
    }

    impl SessionStorage for FileStorage {
        fn load_raw(&self) -> Result<Option<String>, StorageError> {
            match std::fs::read_to_string(&self.path) {
                Ok(raw) => Ok(Some(raw)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        }

        fn save_raw(&self, raw: &str) -> Result<(), StorageError> {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            // Write-then-rename so a crash never leaves a half-written record
            let tmp = self.path.with_extension("json.tmp");
            std::fs::write(&tmp, raw)?;
            std::fs::rename(&tmp, &self.path)?;
            Ok(())
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::BrowserStorage;

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{SessionStorage, StorageError};
    use gloo::storage::{LocalStorage, Storage};

    /// Browser `localStorage` entry holding the session record
    #[derive(Debug, Clone)]
    pub struct BrowserStorage {
        key: String,
    }

    impl BrowserStorage {
        pub fn new(key: impl Into<String>) -> Self {
            Self { key: key.into() }
        }
    }

    impl SessionStorage for BrowserStorage {
        fn load_raw(&self) -> Result<Option<String>, StorageError> {
            match LocalStorage::raw().get_item(&self.key) {
                Ok(raw) => Ok(raw),
                Err(_) => Err(StorageError::Unavailable("localStorage read failed".into())),
            }
        }

        fn save_raw(&self, raw: &str) -> Result<(), StorageError> {
            LocalStorage::raw()
                .set_item(&self.key, raw)
                .map_err(|_| StorageError::Unavailable("localStorage write failed".into()))
        }
    }
}
