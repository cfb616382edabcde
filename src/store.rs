//! Durable key-value records
//!
//! Persistence for the two application records: the user profile and the
//! session list. Each record is a JSON document in its own file under the
//! data directory, wrapped in a version envelope so future field changes
//! get an explicit migration step instead of a silent misparse. Reads fall
//! back to a caller-supplied default; writes go through a temp-file rename.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Record key for the user profile
pub const PROFILE_KEY: &str = "profile";
/// Record key for the session list
pub const SESSIONS_KEY: &str = "sessions";

/// Current on-disk record version
const RECORD_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Version envelope around every persisted record
#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    data: T,
}

/// Handle on the data directory
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    /// Open the store, creating the data directory if needed
    pub fn open<P: AsRef<Path>>(dir: P) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Read a record, falling back to `default` when the record is missing,
    /// unreadable, or from an unknown future version. A bare legacy document
    /// (no version envelope) is migrated in place.
    pub fn read_or_default<T>(&self, key: &str, default: T) -> T
    where
        T: DeserializeOwned + Serialize,
    {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return default,
            Err(e) => {
                tracing::warn!(key, error = %e, "failed to read record, using default");
                return default;
            }
        };

        match serde_json::from_str::<Envelope<T>>(&raw) {
            Ok(envelope) if envelope.version == RECORD_VERSION => envelope.data,
            Ok(envelope) => {
                tracing::warn!(
                    key,
                    version = envelope.version,
                    "record has unknown version, using default"
                );
                default
            }
            Err(_) => self.migrate_legacy(key, &raw, default),
        }
    }

    /// Write a record under the current version
    pub fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let envelope = Envelope {
            version: RECORD_VERSION,
            data: value,
        };
        let rendered = serde_json::to_string_pretty(&envelope)?;

        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, rendered)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Accept a pre-versioning document and rewrite it under the envelope
    fn migrate_legacy<T>(&self, key: &str, raw: &str, default: T) -> T
    where
        T: DeserializeOwned + Serialize,
    {
        match serde_json::from_str::<T>(raw) {
            Ok(data) => {
                tracing::info!(key, "migrating legacy record to versioned format");
                if let Err(e) = self.write(key, &data) {
                    tracing::warn!(key, error = %e, "failed to rewrite migrated record");
                }
                data
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "corrupt record, using default");
                default
            }
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}
