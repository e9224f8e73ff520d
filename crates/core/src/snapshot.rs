//! Local onboarding snapshots.
//!
//! The wizard mirrors its form state into a [`SnapshotStore`] on every
//! field change so an interrupted session can resume. Snapshots are a
//! convenience copy; the backend profile stays the system of record.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::form::FormData;
use crate::types::{DbId, Timestamp};

/// A saved copy of in-progress wizard state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnboardingSnapshot {
    pub owner_id: DbId,
    pub form_data: FormData,
    pub updated_at: Timestamp,
}

/// Storage for onboarding snapshots, keyed by owner.
///
/// Writes are last-writer-wins; there is no locking across processes.
pub trait SnapshotStore: Send + Sync {
    fn load(&self, owner_id: DbId) -> Result<Option<OnboardingSnapshot>, CoreError>;
    fn save(&self, snapshot: &OnboardingSnapshot) -> Result<(), CoreError>;
    fn clear(&self, owner_id: DbId) -> Result<(), CoreError>;
}

/// In-process snapshot store.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    snapshots: Mutex<HashMap<DbId, OnboardingSnapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn load(&self, owner_id: DbId) -> Result<Option<OnboardingSnapshot>, CoreError> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| CoreError::Internal("snapshot store poisoned".into()))?;
        Ok(snapshots.get(&owner_id).cloned())
    }

    fn save(&self, snapshot: &OnboardingSnapshot) -> Result<(), CoreError> {
        self.snapshots
            .lock()
            .map_err(|_| CoreError::Internal("snapshot store poisoned".into()))?
            .insert(snapshot.owner_id, snapshot.clone());
        Ok(())
    }

    fn clear(&self, owner_id: DbId) -> Result<(), CoreError> {
        self.snapshots
            .lock()
            .map_err(|_| CoreError::Internal("snapshot store poisoned".into()))?
            .remove(&owner_id);
        Ok(())
    }
}
