//! Snapshot ownership and cool-down bookkeeping
//!
//! The cache is the only component that owns snapshot resources. Ownership
//! transfers exactly twice in a snapshot's life: in at `store`, out at
//! replacement or eviction, where the outgoing resource is released. Reads
//! hand back transient shared handles and self-heal entries whose resource
//! reports itself dead.
//!
//! The cool-down set lives here too: both are id-keyed side tables evicted
//! by the same janitor pass.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use lodestone_core::SnapshotHandle;

/// Re-attraction suppression window after a release
pub const DEFAULT_COOLDOWN_WINDOW: Duration = Duration::from_millis(1500);

/// id → owned visual snapshot, at most one entry per id.
#[derive(Default)]
pub struct SnapshotCache {
    entries: Mutex<FxHashMap<String, SnapshotHandle>>,
}

impl std::fmt::Debug for SnapshotCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotCache")
            .field("len", &self.len())
            .finish()
    }
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a snapshot for an id. A different resource already present for
    /// the id is released immediately; re-storing the same handle is a no-op.
    pub fn store(&self, id: impl Into<String>, snapshot: SnapshotHandle) {
        let id = id.into();
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(previous) = entries.get(&id) {
                if SnapshotHandle::ptr_eq(previous, &snapshot) {
                    return;
                }
                tracing::trace!("replacing snapshot for '{}', releasing prior", id);
                previous.release();
            }
            entries.insert(id, snapshot);
        }
    }

    /// Fetch the snapshot for an id.
    ///
    /// An entry whose resource reports itself invalid is removed and None
    /// returned. The returned handle is transient; concurrent eviction or
    /// replacement may release the resource at any point after this call.
    pub fn get(&self, id: &str) -> Option<SnapshotHandle> {
        let mut entries = self.entries.lock().ok()?;
        let snapshot = entries.get(id)?;
        if !snapshot.is_valid() {
            tracing::trace!("snapshot for '{}' reports invalid, dropping entry", id);
            entries.remove(id);
            return None;
        }
        Some(snapshot.clone())
    }

    /// Remove and release the snapshot for an id; true if one existed
    pub fn evict(&self, id: &str) -> bool {
        if let Ok(mut entries) = self.entries.lock() {
            if let Some(snapshot) = entries.remove(id) {
                tracing::trace!("evicting snapshot for '{}'", id);
                snapshot.release();
                return true;
            }
        }
        false
    }

    /// Ids with a live entry (janitor sweeps)
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .lock()
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// id → release timestamp; suppresses re-attraction for a fixed window.
///
/// Entries are keyed by id alone and survive unregistration, so a new item
/// reusing an id inherits the remaining suppression window.
#[derive(Debug)]
pub struct CooldownSet {
    entries: Mutex<FxHashMap<String, Instant>>,
    window: Duration,
}

impl CooldownSet {
    pub fn new(window: Duration) -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            window,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a release for an id at the current time
    pub fn note(&self, id: impl Into<String>) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(id.into(), Instant::now());
        }
    }

    /// True while the id is inside its suppression window
    pub fn active(&self, id: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .get(id)
                    .map(|released| released.elapsed() < self.window)
                    .unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// Drop entries whose window has passed; returns how many were dropped
    pub fn purge_expired(&self) -> usize {
        if let Ok(mut entries) = self.entries.lock() {
            let before = entries.len();
            entries.retain(|_, released| released.elapsed() < self.window);
            before - entries.len()
        } else {
            0
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
