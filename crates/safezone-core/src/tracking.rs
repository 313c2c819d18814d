//! Per-subject tracking state.
//!
//! The store maps each subject to its own [`TrackingState`] behind a mutex.
//! Entries are created on first use and live as long as the store. Report
//! processing and timer tasks both take the per-subject lock before reading or
//! clearing timer handles, so a timer can never fire after a report cancelled it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use utoipa::ToSchema;

use crate::geo::Position;
use crate::types::SubjectId;

/// Handle to a scheduled timer task.
///
/// Each handle carries a generation number that is unique within its store.
/// A firing timer checks that its generation is still the one installed in its
/// slot; a replaced or cancelled timer therefore never dispatches.
#[derive(Debug)]
pub struct TimerHandle {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl TimerHandle {
    pub(crate) const fn new(generation: u64, task: JoinHandle<()>) -> Self {
        Self {
            generation,
            task: Some(task),
        }
    }

    /// A handle with no task behind it. Holds a slot to debounce without ticking.
    pub(crate) const fn dormant(generation: u64) -> Self {
        Self {
            generation,
            task: None,
        }
    }

    /// Generation number of this timer.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether a task is behind this handle.
    #[must_use]
    pub const fn is_ticking(&self) -> bool {
        self.task.is_some()
    }

    /// Stop the timer. Safe to call on a timer that already fired.
    pub fn cancel(self) {
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

/// Mutable tracking state of one subject.
#[derive(Debug, Default)]
pub struct TrackingState {
    pub(crate) last_position: Option<Position>,
    pub(crate) last_movement_at: Option<Instant>,
    pub(crate) exit_notifier: Option<TimerHandle>,
    pub(crate) disabled_notifier: Option<TimerHandle>,
    pub(crate) inactivity_timer: Option<TimerHandle>,
    pub(crate) unconfigured_notice_sent: bool,
}

impl TrackingState {
    /// Last position persisted by the processor.
    #[must_use]
    pub const fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    /// Generation of the running exit notifier, if any.
    #[must_use]
    pub fn exit_notifier(&self) -> Option<u64> {
        self.exit_notifier.as_ref().map(TimerHandle::generation)
    }

    /// Generation of the running disabled notifier, if any.
    #[must_use]
    pub fn disabled_notifier(&self) -> Option<u64> {
        self.disabled_notifier.as_ref().map(TimerHandle::generation)
    }

    /// Generation of the pending inactivity timer, if any.
    #[must_use]
    pub fn inactivity_timer(&self) -> Option<u64> {
        self.inactivity_timer.as_ref().map(TimerHandle::generation)
    }

    /// Cancel the exit and disabled notifiers.
    pub(crate) fn cancel_zone_notifiers(&mut self) {
        if let Some(timer) = self.exit_notifier.take() {
            timer.cancel();
        }
        if let Some(timer) = self.disabled_notifier.take() {
            timer.cancel();
        }
    }

    /// Cancel every timer of this subject.
    pub(crate) fn cancel_all(&mut self) {
        self.cancel_zone_notifiers();
        if let Some(timer) = self.inactivity_timer.take() {
            timer.cancel();
        }
    }

    /// Serializable view of this state.
    #[must_use]
    pub fn snapshot(&self, subject_id: &SubjectId) -> TrackingSnapshot {
        TrackingSnapshot {
            subject_id: subject_id.clone(),
            last_position: self.last_position,
            still_for_ms: self.last_movement_at.map(|at| {
                u64::try_from(at.elapsed().as_millis()).unwrap_or(u64::MAX)
            }),
            exit_notifier: self.exit_notifier(),
            disabled_notifier: self.disabled_notifier(),
            inactivity_timer: self.inactivity_timer(),
        }
    }
}

/// Point-in-time view of a subject's tracking state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "subject_id": "42",
    "last_position": {"latitude": 40.4168, "longitude": -3.7038},
    "still_for_ms": 120000,
    "exit_notifier": 7,
    "disabled_notifier": null,
    "inactivity_timer": null
}))]
pub struct TrackingSnapshot {
    /// Subject this snapshot belongs to.
    pub subject_id: SubjectId,

    /// Last reported position.
    pub last_position: Option<Position>,

    /// Milliseconds since the subject last changed position.
    pub still_for_ms: Option<u64>,

    /// Generation of the running "still outside" timer.
    pub exit_notifier: Option<u64>,

    /// Generation of the running "zone disabled" timer.
    pub disabled_notifier: Option<u64>,

    /// Generation of the pending inactivity timer.
    pub inactivity_timer: Option<u64>,
}

/// Shared handle to one subject's state.
pub type SharedTracking = Arc<Mutex<TrackingState>>;

/// Lock a subject's state, recovering it if a previous holder panicked.
pub(crate) fn lock_state(shared: &SharedTracking) -> MutexGuard<'_, TrackingState> {
    shared.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keyed store of tracking state for all subjects.
#[derive(Debug, Default)]
pub struct TrackingStore {
    entries: RwLock<HashMap<SubjectId, SharedTracking>>,
    generations: AtomicU64,
}

impl TrackingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `subject_id`, created empty on first use.
    pub fn entry(&self, subject_id: &SubjectId) -> SharedTracking {
        if let Some(shared) = self.get(subject_id) {
            return shared;
        }
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(entries.entry(subject_id.clone()).or_default())
    }

    /// State of `subject_id` if it has been seen.
    #[must_use]
    pub fn get(&self, subject_id: &SubjectId) -> Option<SharedTracking> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject_id)
            .cloned()
    }

    /// Snapshot of `subject_id` if it has been seen.
    #[must_use]
    pub fn snapshot(&self, subject_id: &SubjectId) -> Option<TrackingSnapshot> {
        self.get(subject_id)
            .map(|shared| lock_state(&shared).snapshot(subject_id))
    }

    /// Number of subjects tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no subject has been seen yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Next timer generation number.
    pub(crate) fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cancel every timer of every subject. Returns the number of subjects visited.
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<SharedTracking> = self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        for shared in &entries {
            lock_state(shared).cancel_all();
        }
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_entry_is_created_once() {
        let store = TrackingStore::new();
        let id = SubjectId::new("1");

        assert!(store.get(&id).is_none());
        let first = store.entry(&id);
        let second = store.entry(&id);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_generations_are_unique() {
        let store = TrackingStore::new();
        let a = store.next_generation();
        let b = store.next_generation();
        assert_ne!(a, b);
        assert!(a > 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_task() {
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let handle = TimerHandle::new(1, task);
        assert!(handle.is_ticking());

        let mut state = TrackingState {
            exit_notifier: Some(handle),
            inactivity_timer: Some(TimerHandle::dormant(2)),
            ..TrackingState::default()
        };
        state.cancel_all();

        assert!(state.exit_notifier().is_none());
        assert!(state.inactivity_timer().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reports_timers() {
        let store = TrackingStore::new();
        let id = SubjectId::new("5");
        {
            let shared = store.entry(&id);
            let mut state = lock_state(&shared);
            state.last_position = Some(Position::new(1.0, 2.0));
            state.last_movement_at = Some(Instant::now());
            state.disabled_notifier = Some(TimerHandle::dormant(9));
        }

        let snapshot = store.snapshot(&id).unwrap();
        assert_eq!(snapshot.last_position, Some(Position::new(1.0, 2.0)));
        assert_eq!(snapshot.disabled_notifier, Some(9));
        assert_eq!(snapshot.exit_notifier, None);
        assert!(snapshot.still_for_ms.is_some());

        assert_eq!(store.cancel_all(), 1);
        assert_eq!(store.snapshot(&id).unwrap().disabled_notifier, None);
    }
}
