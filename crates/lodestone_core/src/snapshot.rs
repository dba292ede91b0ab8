//! Visual snapshot handles
//!
//! A snapshot is a captured rendering of an item (typically a texture held by
//! the render engine) that lets the item keep animating after it leaves
//! normal layout. The controller's cache owns at most one snapshot per item
//! and is the only place ownership transfers: a snapshot is released exactly
//! once, either when replaced by a newer capture or when evicted.
//!
//! Implementations live in the embedder. The contract:
//!
//! - `release` frees the underlying capture; repeated calls must be no-ops
//!   (guard with an atomic, see the test mock below for the shape).
//! - after `release`, `is_valid` returns false. The cache removes entries
//!   whose resource reports itself invalid, so a capture that dies for
//!   external reasons (GPU context loss) heals itself out of the cache.
//! - handles returned by the cache are transient; holding one across calls
//!   races against eviction.

use std::sync::Arc;

/// An owned visual capture of an item.
pub trait SnapshotResource: Send + Sync {
    /// True while the underlying capture is usable
    fn is_valid(&self) -> bool;

    /// Frees the underlying capture; must tolerate repeated calls
    fn release(&self);
}

/// Shared handle to a snapshot; cheap to clone, transient by contract.
pub type SnapshotHandle = Arc<dyn SnapshotResource>;
