//! Concurrent registry of tracked items
//!
//! Maps string ids to their item records. The map itself sits under one
//! `RwLock`; each record sits under its own `RwLock` so frequent position
//! commits on one item never block reads of another. Lock order is always
//! map, then record; no code path takes them the other way around.

use std::sync::{Arc, RwLock};

use rustc_hash::FxHashMap;

use lodestone_core::error::{ConfigError, Result};
use lodestone_core::BoolSignal;

use crate::item::{ItemRecord, ItemSample, ItemState};

/// Shared, individually locked item record
pub type SharedItem = Arc<RwLock<ItemRecord>>;

/// Registry mapping item ids to their records.
///
/// Records are created by [`register`](ItemRegistry::register) or lazily by
/// the observe accessors, and removed by [`remove`](ItemRegistry::remove)
/// once no transition is in flight.
#[derive(Default)]
pub struct ItemRegistry {
    items: RwLock<FxHashMap<String, SharedItem>>,
}

impl std::fmt::Debug for ItemRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemRegistry")
            .field("len", &self.len())
            .finish()
    }
}

impl ItemRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an item, or update its strength if already present.
    ///
    /// Updating never touches state or position, so re-registering a
    /// mid-transition item is harmless. A pending removal is cancelled,
    /// since registration is an explicit claim on the id.
    pub fn register(&self, id: impl Into<String>, strength: f32) -> Result<()> {
        if !(strength > 0.0) {
            return Err(ConfigError::NonPositiveStrength(strength));
        }
        let id = id.into();
        if let Ok(mut items) = self.items.write() {
            if let Some(existing) = items.get(&id) {
                if let Ok(mut record) = existing.write() {
                    record.strength = strength;
                    if record.pending_removal {
                        tracing::debug!("re-registration of '{}' cancels pending removal", id);
                        record.pending_removal = false;
                    } else {
                        tracing::debug!("re-registered '{}' (strength {})", id, strength);
                    }
                }
            } else {
                items.insert(id.clone(), Arc::new(RwLock::new(ItemRecord::new(strength))));
                tracing::trace!("registered item '{}' (strength {})", id, strength);
            }
        }
        Ok(())
    }

    /// Unregister an item.
    ///
    /// Removes the record immediately when the item is resting. A
    /// transitioning item only gets flagged; the outstanding animation keeps
    /// running and the janitor removes the record once the item has settled
    /// back to VISIBLE with its cool-down expired. Returns true when the
    /// record was removed in this call.
    pub fn unregister(&self, id: &str) -> bool {
        if let Ok(mut items) = self.items.write() {
            let transitioning = match items.get(id) {
                Some(item) => item
                    .read()
                    .map(|record| record.state.is_transitioning())
                    .unwrap_or(false),
                None => {
                    tracing::trace!("unregister of unknown item '{}'", id);
                    return false;
                }
            };
            if transitioning {
                if let Some(item) = items.get(id) {
                    if let Ok(mut record) = item.write() {
                        record.pending_removal = true;
                        tracing::debug!(
                            "unregister of '{}' deferred (state {:?})",
                            id,
                            record.state
                        );
                    }
                }
                false
            } else {
                items.remove(id);
                tracing::trace!("unregistered item '{}'", id);
                true
            }
        } else {
            false
        }
    }

    /// Force-remove a record regardless of state. Janitor use only; callers
    /// must have verified the item has settled.
    pub(crate) fn remove(&self, id: &str) -> bool {
        if let Ok(mut items) = self.items.write() {
            items.remove(id).is_some()
        } else {
            false
        }
    }

    /// Live "attracted" signal for an id, lazily creating a default record
    pub fn observe_attracted(&self, id: impl Into<String>) -> BoolSignal {
        let item = self.ensure(id);
        item.read()
            .map(|record| record.attracted.clone())
            .unwrap_or_default()
    }

    /// Live "animating" signal for an id, lazily creating a default record
    pub fn observe_animating(&self, id: impl Into<String>) -> BoolSignal {
        let item = self.ensure(id);
        item.read()
            .map(|record| record.animating.clone())
            .unwrap_or_default()
    }

    /// Fetch the shared record for an id
    pub fn item(&self, id: &str) -> Option<SharedItem> {
        self.items.read().ok()?.get(id).cloned()
    }

    /// Current lifecycle state of an id
    pub fn state_of(&self, id: &str) -> Option<ItemState> {
        let item = self.item(id)?;
        let state = item.read().ok()?.state;
        Some(state)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items
            .read()
            .map(|items| items.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.items.read().map(|items| items.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All registered ids (janitor sweeps and diagnostics)
    pub fn ids(&self) -> Vec<String> {
        self.items
            .read()
            .map(|items| items.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Measurements of every resting item that could be scanned for
    /// attraction: VISIBLE, measured, non-zero size, not awaiting removal.
    /// Cool-down and distance filtering stay with the caller, which owns the
    /// active configuration.
    pub fn visible_samples(&self) -> Vec<ItemSample> {
        let Ok(items) = self.items.read() else {
            return Vec::new();
        };
        let mut samples = Vec::new();
        for (id, item) in items.iter() {
            let Ok(record) = item.read() else { continue };
            if record.state != ItemState::Visible || record.pending_removal {
                continue;
            }
            let Some(frame) = record.frame else { continue };
            if frame.size.is_zero() {
                continue;
            }
            samples.push(ItemSample {
                id: id.clone(),
                center: frame.center(),
                size: frame.size,
                strength: record.strength,
            });
        }
        samples
    }

    /// Create-or-fetch a record with default strength
    fn ensure(&self, id: impl Into<String>) -> SharedItem {
        let id = id.into();
        if let Ok(mut items) = self.items.write() {
            items
                .entry(id)
                .or_insert_with(|| Arc::new(RwLock::new(ItemRecord::default())))
                .clone()
        } else {
            Arc::new(RwLock::new(ItemRecord::default()))
        }
    }
}
