//! File-backed persistence under the configured data directory.
//!
//! ```text
//! {data_dir}/
//!   session.json              persisted auth session
//!   onboarding/{owner}.json   in-progress wizard snapshots
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use japa_core::error::CoreError;
use japa_core::snapshot::{OnboardingSnapshot, SnapshotStore};
use japa_core::types::DbId;

/// Read and decode a JSON file; `None` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Encode and write a JSON file, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Remove a file, treating "already gone" as success.
pub fn remove_file(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Onboarding snapshots stored one JSON file per owner.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("onboarding"),
        }
    }

    fn path(&self, owner_id: DbId) -> PathBuf {
        self.dir.join(format!("{owner_id}.json"))
    }
}

fn internal(e: io::Error) -> CoreError {
    CoreError::Internal(format!("snapshot file: {e}"))
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self, owner_id: DbId) -> Result<Option<OnboardingSnapshot>, CoreError> {
        let snapshot: Option<OnboardingSnapshot> = read_json(&self.path(owner_id)).map_err(internal)?;
        // A snapshot filed under the wrong owner is ignored.
        Ok(snapshot.filter(|s| s.owner_id == owner_id))
    }

    fn save(&self, snapshot: &OnboardingSnapshot) -> Result<(), CoreError> {
        write_json(&self.path(snapshot.owner_id), snapshot).map_err(internal)
    }

    fn clear(&self, owner_id: DbId) -> Result<(), CoreError> {
        remove_file(&self.path(owner_id)).map_err(internal)
    }
}
