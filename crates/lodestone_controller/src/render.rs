//! Seams to the embedding render and platform layers
//!
//! The controller never draws or lays anything out; it issues animation
//! commands through [`RenderEngine`] and learns platform-default geometry
//! through [`GeometryProvider`]. Both are injected at construction.

use std::sync::Arc;

use lodestone_core::{AttractionConfig, AttractionPoint, Point, Rect, SnapshotHandle};

/// Consumer of attraction/release animation commands.
///
/// Completion contract: every `start_*` call must eventually be answered by
/// exactly one matching completion call on the controller
/// (`on_attraction_animation_completed` / `on_release_animation_completed`),
/// even when the engine cannot animate (invalid snapshot, zero viewport).
/// Calling the completion synchronously from inside `start_*` is the
/// accepted degraded path, and the controller holds no locks across these
/// calls so that path cannot deadlock. An engine that never answers strands
/// the item in its transitional state; the controller has no timeout.
pub trait RenderEngine: Send + Sync {
    /// Animate an item from its current frame into an attraction point.
    /// `snapshot` is the cached visual capture if one exists; without it the
    /// engine is expected to degrade (plain fade or jump) rather than fail.
    fn start_attraction_animation(
        &self,
        id: &str,
        from: Rect,
        to: AttractionPoint,
        snapshot: Option<SnapshotHandle>,
    );

    /// Animate an item from an attraction point back to a frame in layout
    fn start_release_animation(
        &self,
        id: &str,
        from: Point,
        to: Rect,
        snapshot: Option<SnapshotHandle>,
    );
}

/// Source of platform-default attraction geometry (e.g. notch detection).
///
/// Queried once at construction and again on every orientation-change
/// notification; returning None leaves the active configuration untouched.
pub trait GeometryProvider: Send + Sync {
    fn default_geometry(&self) -> Option<AttractionConfig>;
}

/// Notification hook fired once per completed transition, with the item id
pub type TransitionHook = Arc<dyn Fn(&str) + Send + Sync>;
