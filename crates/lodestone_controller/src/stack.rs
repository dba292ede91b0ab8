//! LIFO stack of currently-attracted item ids
//!
//! The front id is the only one ever evaluated for release. Membership
//! mirrors lifecycle state exactly: an id is on the stack iff its item is
//! ATTRACTING or ATTRACTED. Only the two scans mutate the stack, and they
//! are serialized by the scan guard, so front() followed by pop_front()
//! inside one scan always names the same id.

use std::sync::RwLock;

use smallvec::SmallVec;

/// Ordered unique-id stack, most-recently-attracted at the front.
///
/// A handful of items at most in practice; inline storage covers the
/// common case.
#[derive(Default)]
pub struct AttractionStack {
    ids: RwLock<SmallVec<[String; 4]>>,
}

impl std::fmt::Debug for AttractionStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttractionStack")
            .field("ids", &self.ids())
            .finish()
    }
}

impl AttractionStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an id to the front, dropping any stale entry for it first
    pub fn push_front(&self, id: impl Into<String>) {
        let id = id.into();
        if let Ok(mut ids) = self.ids.write() {
            if let Some(stale) = ids.iter().position(|existing| *existing == id) {
                tracing::trace!("dropping stale stack entry for '{}'", id);
                ids.remove(stale);
            }
            ids.insert(0, id);
        }
    }

    /// Pop and return the front id
    pub fn pop_front(&self) -> Option<String> {
        if let Ok(mut ids) = self.ids.write() {
            if ids.is_empty() {
                None
            } else {
                Some(ids.remove(0))
            }
        } else {
            None
        }
    }

    /// The front id, if any
    pub fn front(&self) -> Option<String> {
        self.ids.read().ok()?.first().cloned()
    }

    /// Remove an id wherever it sits; true if it was present
    pub fn remove(&self, id: &str) -> bool {
        if let Ok(mut ids) = self.ids.write() {
            if let Some(index) = ids.iter().position(|existing| existing == id) {
                ids.remove(index);
                return true;
            }
        }
        false
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .read()
            .map(|ids| ids.iter().any(|existing| existing == id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.ids.read().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Front-to-back copy of the stack
    pub fn ids(&self) -> Vec<String> {
        self.ids
            .read()
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }
}
