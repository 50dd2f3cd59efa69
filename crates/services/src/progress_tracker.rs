use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use course_core::model::{ModuleId, Percent, ProgressMap};
use storage::repository::KeyValueStore;

use crate::error::{HydrationError, PersistError};

/// Versioned key for the persisted progress snapshot.
///
/// An incompatible schema change must rotate the suffix (`v2`, ...) instead
/// of rewriting existing data under this key.
pub const PROGRESS_STORE_KEY: &str = "user_progress_v1";

/// Most recent failure absorbed at the tracker boundary, kept for optional
/// display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LastError {
    Hydration(String),
    Persist(String),
}

#[derive(Debug, Default)]
struct TrackerState {
    map: ProgressMap,
    hydrated: bool,
    saving: bool,
    last_error: Option<LastError>,
}

/// Device-local cache of per-module completion percentages.
///
/// The tracker is the sole owner of its storage key, so persistence is a
/// whole-map overwrite with last-writer-wins semantics. Mutations update the
/// in-memory map synchronously before the awaited write begins; overlapping
/// persists therefore race only on the write, and the later snapshot already
/// contains every prior mutation.
///
/// Reads never fail and never block: before hydration completes they observe
/// an empty map.
pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
    state: Mutex<TrackerState>,
}

impl ProgressTracker {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            state: Mutex::new(TrackerState::default()),
        }
    }

    // The state is a plain map plus flags and every critical section is a
    // handful of assignments, so a poisoned lock still holds consistent data.
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stored completion for a module, or 0 when absent.
    #[must_use]
    pub fn module_progress(&self, module_id: &ModuleId) -> Percent {
        self.state().map.get(module_id)
    }

    /// Mean completion across the given modules; missing modules count as 0
    /// and an empty list yields 0.
    #[must_use]
    pub fn course_progress(&self, module_ids: &[ModuleId]) -> Percent {
        self.state().map.course_progress(module_ids)
    }

    /// True once the one-shot startup hydration has run, whether or not it
    /// succeeded.
    #[must_use]
    pub fn hydrated(&self) -> bool {
        self.state().hydrated
    }

    /// True while a snapshot write is in flight.
    #[must_use]
    pub fn is_saving(&self) -> bool {
        self.state().saving
    }

    /// Most recent absorbed hydration or persistence failure.
    #[must_use]
    pub fn last_error(&self) -> Option<LastError> {
        self.state().last_error.clone()
    }

    /// Copy of the current in-memory map.
    #[must_use]
    pub fn snapshot(&self) -> ProgressMap {
        self.state().map.clone()
    }

    /// Unconditional clamped write: `raw_percent` is rounded and clamped
    /// into 0..=100, stored regardless of the prior value, and the whole map
    /// is persisted.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot write fails. The in-memory
    /// value is updated either way; the next successful write reconciles.
    pub async fn set_module_progress(
        &self,
        module_id: &ModuleId,
        raw_percent: f64,
    ) -> Result<(), PersistError> {
        let percent = Percent::from_raw(raw_percent);
        {
            let mut state = self.state();
            state.map.set(module_id.clone(), percent);
        }
        self.persist_to_storage().await
    }

    /// Clamped write with a monotonicity guard: once a module reads as
    /// complete, a lower report is suppressed entirely (no mutation, no
    /// persistence, returns success).
    ///
    /// Progress reports come from a scroll-position heuristic that can emit
    /// smaller indices transiently on fast scroll-back or remount; a learner
    /// who finished a module must never see it regress.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot write fails.
    pub async fn set_module_progress_safe(
        &self,
        module_id: &ModuleId,
        raw_percent: f64,
    ) -> Result<(), PersistError> {
        let percent = Percent::from_raw(raw_percent);
        {
            let mut state = self.state();
            let current = state.map.get(module_id);
            if current.is_complete() && !percent.is_complete() {
                return Ok(());
            }
            state.map.set(module_id.clone(), percent);
        }
        self.persist_to_storage().await
    }

    /// Adds `delta_percent` (possibly negative) to the stored value through
    /// the unconditional setter, which clamps the sum.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot write fails.
    pub async fn increment_module_progress(
        &self,
        module_id: &ModuleId,
        delta_percent: f64,
    ) -> Result<(), PersistError> {
        let current = self.module_progress(module_id);
        self.set_module_progress(module_id, f64::from(current.value()) + delta_percent)
            .await
    }

    /// Forgets a module entirely, removing it from the persisted snapshot.
    ///
    /// Distinct from setting 0: the getter reads both as 0, but a reset
    /// module no longer appears in the snapshot at all (used when module
    /// content changes).
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot write fails.
    pub async fn reset_module_progress(&self, module_id: &ModuleId) -> Result<(), PersistError> {
        {
            self.state().map.remove(module_id);
        }
        self.persist_to_storage().await
    }

    /// Empties the map and persists the empty snapshot.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` if the snapshot write fails.
    pub async fn clear_all_progress(&self) -> Result<(), PersistError> {
        {
            self.state().map.clear();
        }
        self.persist_to_storage().await
    }

    /// One-shot startup load of the persisted snapshot.
    ///
    /// A missing key leaves the map empty. A read or parse failure also
    /// leaves the map empty and records the error, but the tracker is marked
    /// hydrated in every case so operations never wait on storage.
    ///
    /// # Errors
    ///
    /// Returns `HydrationError` on read or parse failure; callers may ignore
    /// it, since the same error is retained in [`Self::last_error`].
    pub async fn hydrate_from_storage(&self) -> Result<(), HydrationError> {
        let loaded = self.load_snapshot().await;
        let mut state = self.state();
        state.hydrated = true;
        match loaded {
            Ok(Some(map)) => {
                state.map = map;
                Ok(())
            }
            Ok(None) => Ok(()),
            Err(err) => {
                state.last_error = Some(LastError::Hydration(err.to_string()));
                Err(err)
            }
        }
    }

    /// Serializes the current map and writes it wholesale under the
    /// versioned key. No merge: the tracker is the only writer of this key.
    ///
    /// # Errors
    ///
    /// Returns `PersistError` on serialization or write failure; the error
    /// is also recorded in [`Self::last_error`]. There is no retry — the
    /// next mutation naturally rewrites the full map.
    pub async fn persist_to_storage(&self) -> Result<(), PersistError> {
        let snapshot = {
            let mut state = self.state();
            state.saving = true;
            state.map.clone()
        };
        let result = self.write_snapshot(&snapshot).await;
        {
            let mut state = self.state();
            state.saving = false;
            if let Err(err) = &result {
                state.last_error = Some(LastError::Persist(err.to_string()));
            }
        }
        result
    }

    async fn load_snapshot(&self) -> Result<Option<ProgressMap>, HydrationError> {
        let Some(raw) = self.store.get(PROGRESS_STORE_KEY).await? else {
            return Ok(None);
        };
        let map = serde_json::from_str(&raw)?;
        Ok(Some(map))
    }

    async fn write_snapshot(&self, snapshot: &ProgressMap) -> Result<(), PersistError> {
        let raw = serde_json::to_string(snapshot)?;
        self.store.set(PROGRESS_STORE_KEY, &raw).await?;
        Ok(())
    }
}
