//! Attract/release transition engine
//!
//! All state mutation funnels through here. The two scans are serialized by
//! an atomic scan-in-progress flag (contending calls return [`ScanOutcome::Skipped`]
//! instead of blocking); position commits and completion callbacks touch only
//! the per-item lock and interleave freely with scans on other items.
//!
//! Lock discipline, in acquisition order: configuration lock, registry map
//! lock, item record lock. The stack and cache locks are taken only while no
//! item lock is held, and render-engine commands and notification hooks are
//! always issued with no lock held at all, so a render engine that completes
//! synchronously re-enters the controller safely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use lodestone_core::{
    distance, recede_from, AttractionConfig, AttractionPoint, EdgeTrigger, Point, Rect, Size,
    SnapshotHandle,
};

use crate::cache::{CooldownSet, SnapshotCache};
use crate::item::ItemState;
use crate::registry::ItemRegistry;
use crate::render::{GeometryProvider, RenderEngine, TransitionHook};
use crate::stack::AttractionStack;

/// Result of a scan entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The scan ran; `transitions` items changed state
    Completed { transitions: usize },
    /// Another scan held the guard; retry on the next poll tick
    Skipped,
}

impl ScanOutcome {
    pub fn transitions(&self) -> usize {
        match self {
            ScanOutcome::Completed { transitions } => *transitions,
            ScanOutcome::Skipped => 0,
        }
    }
}

/// RAII hold on the scan-in-progress flag
struct ScanGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ScanGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Shared controller state; the facade and the pollers both drive this.
pub(crate) struct ControllerInner {
    pub(crate) registry: ItemRegistry,
    pub(crate) stack: AttractionStack,
    pub(crate) cache: SnapshotCache,
    pub(crate) cooldowns: CooldownSet,
    pub(crate) config: RwLock<AttractionConfig>,
    pub(crate) distance_check: EdgeTrigger,
    pub(crate) release_check: EdgeTrigger,
    pub(crate) scan_active: AtomicBool,
    pub(crate) render: Arc<dyn RenderEngine>,
    pub(crate) provider: Option<Arc<dyn GeometryProvider>>,
    pub(crate) on_attract: Option<TransitionHook>,
    pub(crate) on_release: Option<TransitionHook>,
}

impl ControllerInner {
    /// Copy of the primary point and thresholds, taken under a brief read
    fn geometry(&self) -> (Option<AttractionPoint>, f32, f32) {
        match self.config.read() {
            Ok(config) => (
                config.primary().copied(),
                config.attraction_threshold,
                config.release_threshold,
            ),
            Err(_) => (None, 0.0, 0.0),
        }
    }

    pub(crate) fn configuration(&self) -> AttractionConfig {
        self.config
            .read()
            .map(|config| config.clone())
            .unwrap_or_else(|_| AttractionConfig {
                points: Vec::new(),
                attraction_threshold: 0.0,
                release_threshold: 0.0,
            })
    }

    // ========================================================================
    // Position commits
    // ========================================================================

    /// Commit a layout measurement for an item and raise any scan requests
    /// that follow from it.
    ///
    /// No-ops for detached or zero-sized measurements, unknown ids, and ids
    /// inside their cool-down window.
    pub(crate) fn update_position(
        &self,
        id: &str,
        attached: bool,
        size: Size,
        position_in_root: Point,
    ) {
        if !attached {
            tracing::trace!("position update for '{}' ignored: detached", id);
            return;
        }
        if size.is_zero() {
            tracing::trace!("position update for '{}' ignored: zero size", id);
            return;
        }
        if self.cooldowns.active(id) {
            tracing::trace!("position update for '{}' ignored: cooling down", id);
            return;
        }
        let Some(item) = self.registry.item(id) else {
            tracing::trace!("position update for unknown item '{}'", id);
            return;
        };

        let (primary, attraction_threshold, release_threshold) = self.geometry();
        let frame = Rect::from_origin_size(position_in_root, size);
        let center = frame.center();
        let dist = primary
            .map(|point| distance(frame.leading_edge(), point.position))
            .unwrap_or(f32::INFINITY);

        let Ok(mut record) = item.write() else { return };
        let previous = record.frame.map(|f| f.center());
        let descending = previous.map(|p| center.y > p.y).unwrap_or(false);
        record.previous_center = previous;
        record.frame = Some(frame);
        record.last_distance = dist;
        record.last_update = Some(std::time::Instant::now());
        let state = record.state;
        let strength = record.strength;
        let pending_removal = record.pending_removal;
        drop(record);

        match state {
            ItemState::Attracted if dist > release_threshold && descending => {
                tracing::debug!(
                    "'{}' drifted out while held (distance {:.1} > {:.1}, descending)",
                    id,
                    dist,
                    release_threshold
                );
                self.release_check.raise();
            }
            ItemState::Visible
                if !pending_removal && dist < attraction_threshold * strength =>
            {
                tracing::trace!(
                    "'{}' entered attraction range (distance {:.1})",
                    id,
                    dist
                );
                self.distance_check.raise();
            }
            _ => {}
        }
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Attract every eligible resting item.
    ///
    /// Eligibility is tested on a snapshot of the registry, then re-tested
    /// under each item's write lock immediately before mutation to close the
    /// race against a concurrent transition. Items are processed in snapshot
    /// iteration order; the last one processed ends up on top of the stack.
    pub(crate) fn scan_for_attraction(&self) -> ScanOutcome {
        let Some(_guard) = ScanGuard::acquire(&self.scan_active) else {
            tracing::trace!("attraction scan skipped: another scan in progress");
            return ScanOutcome::Skipped;
        };
        let (Some(primary), attraction_threshold, _) = self.geometry() else {
            return ScanOutcome::Completed { transitions: 0 };
        };

        let mut transitions = 0;
        for sample in self.registry.visible_samples() {
            if self.cooldowns.active(&sample.id) {
                continue;
            }
            if !(distance(sample.leading_edge(), primary.position)
                < attraction_threshold * sample.strength)
            {
                continue;
            }
            let Some(item) = self.registry.item(&sample.id) else {
                continue;
            };

            // Re-validate under the write lock; the item may have moved or
            // transitioned since the snapshot was taken.
            let mut from = None;
            if let Ok(mut record) = item.write() {
                if record.state == ItemState::Visible && !record.pending_removal {
                    if let Some(frame) = record.frame {
                        let dist = distance(frame.leading_edge(), primary.position);
                        if !frame.size.is_zero()
                            && dist < attraction_threshold * record.strength
                        {
                            record.original_frame = Some(frame);
                            record.state = ItemState::Attracting;
                            record.last_distance = dist;
                            record.attracted.set(true);
                            record.animating.set(true);
                            from = Some(frame);
                        }
                    }
                }
            }
            let Some(from) = from else { continue };

            self.stack.push_front(sample.id.clone());
            transitions += 1;
            tracing::debug!("'{}' VISIBLE -> ATTRACTING", sample.id);

            let snapshot = self.cache.get(&sample.id);
            self.render
                .start_attraction_animation(&sample.id, from, primary, snapshot);
        }

        if transitions > 0 {
            tracing::debug!("attraction scan transitioned {} item(s)", transitions);
        }
        ScanOutcome::Completed { transitions }
    }

    /// Release the stack-front item if it is eligible.
    ///
    /// Only the front id is ever considered. Eligibility (beyond the release
    /// threshold *and* moving toward the bottom) is evaluated fresh against
    /// the active configuration, so a raise caused by a configuration change
    /// releases the held item only when the new thresholds actually leave it
    /// out of range.
    pub(crate) fn scan_for_release(&self) -> ScanOutcome {
        let Some(_guard) = ScanGuard::acquire(&self.scan_active) else {
            tracing::trace!("release scan skipped: another scan in progress");
            return ScanOutcome::Skipped;
        };
        let Some(front) = self.stack.front() else {
            tracing::trace!("release scan: stack empty");
            return ScanOutcome::Completed { transitions: 0 };
        };
        let (Some(primary), _, release_threshold) = self.geometry() else {
            tracing::trace!("release scan: no primary point configured");
            return ScanOutcome::Completed { transitions: 0 };
        };
        let Some(item) = self.registry.item(&front) else {
            tracing::warn!("stack front '{}' has no registry record", front);
            return ScanOutcome::Completed { transitions: 0 };
        };

        let Ok(mut record) = item.write() else {
            return ScanOutcome::Completed { transitions: 0 };
        };
        if record.state != ItemState::Attracted {
            tracing::trace!(
                "release scan: front '{}' is {:?}, not ATTRACTED",
                front,
                record.state
            );
            return ScanOutcome::Completed { transitions: 0 };
        }
        let Some(frame) = record.frame else {
            tracing::trace!("release scan: front '{}' has no measurement", front);
            return ScanOutcome::Completed { transitions: 0 };
        };
        let dist = distance(frame.leading_edge(), primary.position);
        let descending = record
            .previous_center
            .map(|previous| frame.center().y > previous.y)
            .unwrap_or(false);
        if !(dist > release_threshold && descending) {
            tracing::trace!(
                "release scan: front '{}' not eligible (distance {:.1}, descending {})",
                front,
                dist,
                descending
            );
            return ScanOutcome::Completed { transitions: 0 };
        }

        record.state = ItemState::Releasing;
        record.last_distance = dist;
        record.animating.set(true);
        let target = record.original_frame.unwrap_or_else(|| {
            Rect::from_center(
                recede_from(primary.position, frame.center(), release_threshold),
                frame.size,
            )
        });
        drop(record);

        let popped = self.stack.pop_front();
        debug_assert_eq!(popped.as_deref(), Some(front.as_str()));
        tracing::debug!("'{}' ATTRACTED -> RELEASING", front);

        let snapshot = self.cache.get(&front);
        self.render
            .start_release_animation(&front, primary.position, target, snapshot);
        ScanOutcome::Completed { transitions: 1 }
    }

    // ========================================================================
    // Completion callbacks
    // ========================================================================

    /// ATTRACTING -> ATTRACTED. No-op in any other state, so duplicate or
    /// late callbacks fall through without firing the hook twice.
    pub(crate) fn on_attraction_animation_completed(&self, id: &str) {
        let Some(item) = self.registry.item(id) else {
            tracing::warn!("attraction completion for unknown item '{}'", id);
            return;
        };
        let transitioned = match item.write() {
            Ok(mut record) => {
                if record.state == ItemState::Attracting {
                    record.state = ItemState::Attracted;
                    record.animating.set(false);
                    if let Some(expected) = record.expected_phase.take() {
                        if expected != ItemState::Attracted {
                            tracing::debug!(
                                "attraction completion for '{}' but render engine announced {:?}",
                                id,
                                expected
                            );
                        }
                    }
                    true
                } else {
                    tracing::trace!(
                        "attraction completion for '{}' ignored in state {:?}",
                        id,
                        record.state
                    );
                    false
                }
            }
            Err(_) => false,
        };
        if transitioned {
            tracing::debug!("'{}' ATTRACTING -> ATTRACTED", id);
            if let Some(hook) = &self.on_attract {
                hook(id);
            }
        }
    }

    /// RELEASING -> VISIBLE: clears the frozen original, starts the
    /// cool-down, evicts the cached snapshot. No-op in any other state.
    pub(crate) fn on_release_animation_completed(&self, id: &str) {
        let Some(item) = self.registry.item(id) else {
            tracing::warn!("release completion for unknown item '{}'", id);
            return;
        };
        let transitioned = match item.write() {
            Ok(mut record) => {
                if record.state == ItemState::Releasing {
                    record.state = ItemState::Visible;
                    record.original_frame = None;
                    record.attracted.set(false);
                    record.animating.set(false);
                    if let Some(expected) = record.expected_phase.take() {
                        if expected != ItemState::Visible {
                            tracing::debug!(
                                "release completion for '{}' but render engine announced {:?}",
                                id,
                                expected
                            );
                        }
                    }
                    true
                } else {
                    tracing::trace!(
                        "release completion for '{}' ignored in state {:?}",
                        id,
                        record.state
                    );
                    false
                }
            }
            Err(_) => false,
        };
        if transitioned {
            self.cooldowns.note(id);
            self.cache.evict(id);
            tracing::debug!("'{}' RELEASING -> VISIBLE, cool-down started", id);
            if let Some(hook) = &self.on_release {
                hook(id);
            }
        }
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Atomically replace the active point set and thresholds.
    ///
    /// Always raises the distance-check request; raises the release-check
    /// request too while anything is attracted, since new geometry may leave
    /// the held item out of range.
    pub(crate) fn update_configuration(
        &self,
        points: Vec<AttractionPoint>,
        attraction_threshold: f32,
        release_threshold: f32,
    ) -> lodestone_core::Result<()> {
        let config = AttractionConfig::new(points, attraction_threshold, release_threshold)?;
        self.replace_configuration(config);
        Ok(())
    }

    /// Re-query the geometry provider (orientation changed). Returns true
    /// when the provider supplied a configuration.
    pub(crate) fn refresh_from_provider(&self) -> bool {
        let Some(provider) = &self.provider else {
            tracing::trace!("orientation change ignored: no geometry provider");
            return false;
        };
        let Some(config) = provider.default_geometry() else {
            tracing::debug!("geometry provider returned no configuration");
            return false;
        };
        self.replace_configuration(config);
        true
    }

    fn replace_configuration(&self, config: AttractionConfig) {
        tracing::debug!(
            "configuration replaced: {} point(s), attract < {:.1}, release > {:.1}",
            config.points.len(),
            config.attraction_threshold,
            config.release_threshold
        );
        if let Ok(mut active) = self.config.write() {
            *active = config;
        }
        self.distance_check.raise();
        if !self.stack.is_empty() {
            self.release_check.raise();
        }
    }

    // ========================================================================
    // Render side channel
    // ========================================================================

    /// Mark/unmark the animating flag and record the transitional state the
    /// render engine expects next. The announced phase never changes
    /// lifecycle state itself; completions compare against it and log
    /// disagreements.
    pub(crate) fn set_item_animating(&self, id: &str, animating: bool, phase: Option<ItemState>) {
        let Some(item) = self.registry.item(id) else {
            tracing::trace!("set_item_animating for unknown item '{}'", id);
            return;
        };
        let Ok(mut record) = item.write() else { return };
        record.animating.set(animating);
        if let Some(phase) = phase {
            if phase != record.state && phase != record.state.next_in_cycle() {
                tracing::warn!(
                    "render engine announced phase {:?} for '{}' in state {:?}",
                    phase,
                    id,
                    record.state
                );
            }
        }
        record.expected_phase = phase;
    }

    // ========================================================================
    // Janitor
    // ========================================================================

    /// One eviction pass: expired cool-downs, settled deferred removals, and
    /// snapshots whose item is gone or fully settled outside the stack.
    pub(crate) fn run_janitor(&self) {
        let purged = self.cooldowns.purge_expired();
        if purged > 0 {
            tracing::trace!("janitor purged {} expired cool-down(s)", purged);
        }

        for id in self.registry.ids() {
            let Some(item) = self.registry.item(&id) else {
                continue;
            };
            let settled = item
                .read()
                .map(|record| record.pending_removal && record.state == ItemState::Visible)
                .unwrap_or(false);
            if settled && !self.cooldowns.active(&id) {
                self.registry.remove(&id);
                self.cache.evict(&id);
                tracing::debug!("janitor removed '{}' after deferred unregistration", id);
            }
        }

        for id in self.cache.ids() {
            let evictable = match self.registry.item(&id) {
                None => true,
                Some(item) => {
                    item.read()
                        .map(|record| record.state == ItemState::Visible)
                        .unwrap_or(false)
                        && !self.stack.contains(&id)
                }
            };
            if evictable {
                self.cache.evict(&id);
                tracing::trace!("janitor evicted settled snapshot for '{}'", id);
            }
        }
    }

    /// Cached snapshot lookup used by the facade
    pub(crate) fn snapshot(&self, id: &str) -> Option<SnapshotHandle> {
        self.cache.get(id)
    }
}
