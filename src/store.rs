//! Flat-file JSON collections under the data directory.
//!
//! Every mutation rewrites the whole file. Writers inside this process are
//! serialized by the store handle's lock, and alarm records carry a `version`
//! so that conditional updates can detect a competing edit.

mod alarms;
mod subscriptions;

pub use alarms::{AlarmStore, UpdateOutcome};
pub(crate) use alarms::{validate_new, validate_patch};
pub use subscriptions::SubscriptionStore;

use serde::Serialize;
use serde::de::DeserializeOwned;

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

pub const ALARMS_FILE: &str = "alarms.json";
pub const SUBSCRIPTIONS_FILE: &str = "subscriptions.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("store serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("alarm {id} changed concurrently (expected version {expected}, found {actual})")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct JsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub(crate) fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Missing files read as empty. Unreadable or corrupt files also read as
    /// empty; the next write replaces them.
    pub(crate) fn load(&self) -> T {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return T::default(),
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "failed to read store file");
                return T::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "corrupt store file, treating as empty");
                T::default()
            }
        }
    }

    pub(crate) fn save(&self, value: &T) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(value)?;
        atomic_write(&self.path, &contents)?;
        Ok(())
    }
}

pub(crate) fn atomic_write(path: &Path, contents: &str) -> std::io::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| std::io::Error::other("missing parent directory"))?;
    std::fs::create_dir_all(parent)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("store.json");
    let pid = std::process::id();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();

    for attempt in 0..10u32 {
        let temp_path = parent.join(format!(".{file_name}.tmp-{pid}-{nanos}-{attempt}"));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
        {
            Ok(mut file) => {
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;
                std::fs::rename(&temp_path, path)?;
                return Ok(());
            }
            Err(err) if err.kind() == ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate temporary file",
    ))
}

#[cfg(test)]
pub(crate) fn create_temp_dir(test_name: &str) -> PathBuf {
    let mut root = std::env::temp_dir();
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time")
        .as_nanos();
    root.push(format!("chime-{test_name}-{nanos}"));
    std::fs::create_dir_all(&root).expect("create temp dir");
    root
}
