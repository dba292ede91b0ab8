//! Public controller facade
//!
//! [`AttractionController`] wires the registry, stack, cache, and transition
//! engine together behind one handle. Construction goes through
//! [`ControllerBuilder`]; everything after `build()` takes `&self` and is
//! safe to call from any thread.
//!
//! The controller can be driven two ways: `start_background()` spawns the
//! poller threads, or an embedder with its own tick loop calls
//! `scan_for_attraction` / `scan_for_release` / `run` of the janitor
//! equivalents itself through the same public entry points.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use lodestone_core::{
    AttractionConfig, AttractionPoint, BoolSignal, EdgeTrigger, Point, Result, Size,
    SnapshotHandle,
};

use crate::cache::{CooldownSet, SnapshotCache, DEFAULT_COOLDOWN_WINDOW};
use crate::engine::{ControllerInner, ScanOutcome};
use crate::item::ItemState;
use crate::registry::ItemRegistry;
use crate::render::{GeometryProvider, RenderEngine, TransitionHook};
use crate::scheduler::{PollerCadence, Pollers};
use crate::stack::AttractionStack;

/// Attraction threshold used when neither a configuration nor a provider is
/// supplied
pub const DEFAULT_ATTRACTION_THRESHOLD: f32 = 200.0;
/// Release threshold used when neither a configuration nor a provider is
/// supplied
pub const DEFAULT_RELEASE_THRESHOLD: f32 = 250.0;

/// The attraction/release controller.
///
/// Tracks registered items, attracts those that come within range of the
/// primary attraction point, holds them on a LIFO stack, and releases the
/// stack front once it drifts out of range moving toward the bottom. All
/// animation work is delegated to the injected [`RenderEngine`]; the
/// controller owns state, not pixels.
///
/// ```ignore
/// let controller = AttractionController::builder(render_engine)
///     .geometry_provider(platform_geometry)
///     .on_attract(|id| println!("{id} captured"))
///     .build();
/// controller.start_background();
///
/// controller.register_item("badge-7", 1.0)?;
/// // the position source now feeds update_position() on layout changes
/// ```
pub struct AttractionController {
    inner: Arc<ControllerInner>,
    cadence: PollerCadence,
    pollers: Mutex<Option<Pollers>>,
}

impl std::fmt::Debug for AttractionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AttractionController")
            .field("items", &self.inner.registry.len())
            .field("stack", &self.inner.stack.len())
            .field("running", &self.is_background_running())
            .finish()
    }
}

impl AttractionController {
    /// Start building a controller around a render engine
    pub fn builder(render: Arc<dyn RenderEngine>) -> ControllerBuilder {
        ControllerBuilder::new(render)
    }

    // ========================================================================
    // Item lifecycle
    // ========================================================================

    /// Register an item, or update its strength if already registered.
    ///
    /// Updating never touches state or position. Rejects non-positive
    /// strength.
    pub fn register_item(&self, id: impl Into<String>, strength: f32) -> Result<()> {
        self.inner.registry.register(id, strength)
    }

    /// Unregister an item.
    ///
    /// Mid-transition items are only flagged; their records survive until
    /// the in-flight animation completes and the cool-down expires, at which
    /// point the janitor removes them. Returns true when the record was
    /// removed immediately.
    pub fn unregister_item(&self, id: &str) -> bool {
        self.inner.registry.unregister(id)
    }

    /// Live "attracted" signal for an id, creating a default record for
    /// unknown ids
    pub fn observe_attracted(&self, id: impl Into<String>) -> BoolSignal {
        self.inner.registry.observe_attracted(id)
    }

    /// Live "animating" signal for an id, creating a default record for
    /// unknown ids
    pub fn observe_animating(&self, id: impl Into<String>) -> BoolSignal {
        self.inner.registry.observe_animating(id)
    }

    /// Current lifecycle state of an id
    pub fn item_state(&self, id: &str) -> Option<ItemState> {
        self.inner.registry.state_of(id)
    }

    // ========================================================================
    // Position source
    // ========================================================================

    /// Commit a layout measurement for an item.
    ///
    /// Call on layout change or periodically (100ms is plenty, 50ms while
    /// attracted). Detached and zero-sized measurements are ignored, as are
    /// updates for ids inside their cool-down window.
    pub fn update_position(&self, id: &str, attached: bool, size: Size, position_in_root: Point) {
        self.inner.update_position(id, attached, size, position_in_root);
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Atomically replace the attraction point set and both thresholds.
    ///
    /// Validation is all-or-nothing; on error the active configuration is
    /// untouched. On success a distance check is requested, plus a release
    /// check while anything is attracted.
    pub fn update_configuration(
        &self,
        points: Vec<AttractionPoint>,
        attraction_threshold: f32,
        release_threshold: f32,
    ) -> Result<()> {
        self.inner
            .update_configuration(points, attraction_threshold, release_threshold)
    }

    /// Snapshot of the active configuration
    pub fn configuration(&self) -> AttractionConfig {
        self.inner.configuration()
    }

    /// Re-query the geometry provider after an orientation change. Returns
    /// true when the provider supplied fresh geometry.
    pub fn notify_orientation_changed(&self) -> bool {
        self.inner.refresh_from_provider()
    }

    // ========================================================================
    // Stack and scans
    // ========================================================================

    /// Number of items currently attracting or attracted
    pub fn stack_size(&self) -> usize {
        self.inner.stack.len()
    }

    /// Request a release check on the next poll tick
    pub fn force_release_check(&self) {
        self.inner.release_check.raise();
    }

    /// Run an attraction scan now (the pollers call this on demand; embedders
    /// with their own tick loop may too)
    pub fn scan_for_attraction(&self) -> ScanOutcome {
        self.inner.scan_for_attraction()
    }

    /// Run a release scan now
    pub fn scan_for_release(&self) -> ScanOutcome {
        self.inner.scan_for_release()
    }

    /// Run one janitor eviction pass now: expired cool-downs, settled
    /// deferred removals, orphaned snapshots (the background janitor calls
    /// this on its own cadence)
    pub fn run_janitor(&self) {
        self.inner.run_janitor();
    }

    // ========================================================================
    // Render engine interface
    // ========================================================================

    /// Completion callback for `start_attraction_animation`; must be called
    /// exactly once per command, duplicates are ignored
    pub fn on_attraction_animation_completed(&self, id: &str) {
        self.inner.on_attraction_animation_completed(id);
    }

    /// Completion callback for `start_release_animation`; must be called
    /// exactly once per command, duplicates are ignored
    pub fn on_release_animation_completed(&self, id: &str) {
        self.inner.on_release_animation_completed(id);
    }

    /// Side channel for the render engine: set the animating flag and
    /// announce the transitional state it is moving the item toward
    pub fn set_item_animating(&self, id: &str, animating: bool, phase: Option<ItemState>) {
        self.inner.set_item_animating(id, animating, phase);
    }

    /// Store a visual snapshot for an id, releasing any different snapshot
    /// previously stored for it. Capture failures upstream simply mean this
    /// never gets called; animations then run without a snapshot.
    pub fn store_snapshot(&self, id: impl Into<String>, snapshot: SnapshotHandle) {
        self.inner.cache.store(id, snapshot);
    }

    /// Cached snapshot for an id, if present and still valid. The handle is
    /// transient; do not retain it past the call.
    pub fn snapshot(&self, id: &str) -> Option<SnapshotHandle> {
        self.inner.snapshot(id)
    }

    // ========================================================================
    // Background pollers
    // ========================================================================

    /// Spawn the background pollers (attraction, release, janitor). Safe to
    /// call repeatedly; subsequent calls are no-ops while running.
    pub fn start_background(&self) {
        if let Ok(mut pollers) = self.pollers.lock() {
            if pollers.is_some() {
                tracing::trace!("background pollers already running");
                return;
            }
            *pollers = Some(Pollers::start(Arc::clone(&self.inner), self.cadence));
            tracing::debug!("background pollers started");
        }
    }

    /// Stop and join the background pollers
    pub fn stop_background(&self) {
        if let Ok(mut pollers) = self.pollers.lock() {
            if let Some(mut running) = pollers.take() {
                running.stop();
                tracing::debug!("background pollers stopped");
            }
        }
    }

    pub fn is_background_running(&self) -> bool {
        self.pollers
            .lock()
            .map(|pollers| pollers.is_some())
            .unwrap_or(false)
    }
}

impl Drop for AttractionController {
    fn drop(&mut self) {
        self.stop_background();
    }
}

/// Fluent builder for [`AttractionController`]
pub struct ControllerBuilder {
    render: Arc<dyn RenderEngine>,
    provider: Option<Arc<dyn GeometryProvider>>,
    configuration: Option<AttractionConfig>,
    cooldown_window: Duration,
    cadence: PollerCadence,
    on_attract: Option<TransitionHook>,
    on_release: Option<TransitionHook>,
}

impl ControllerBuilder {
    fn new(render: Arc<dyn RenderEngine>) -> Self {
        Self {
            render,
            provider: None,
            configuration: None,
            cooldown_window: DEFAULT_COOLDOWN_WINDOW,
            cadence: PollerCadence::default(),
            on_attract: None,
            on_release: None,
        }
    }

    /// Platform geometry source, queried at build time and on orientation
    /// changes
    pub fn geometry_provider(mut self, provider: Arc<dyn GeometryProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Explicit starting configuration; takes precedence over the provider
    pub fn configuration(mut self, configuration: AttractionConfig) -> Self {
        self.configuration = Some(configuration);
        self
    }

    /// Re-attraction suppression window after release (default 1500ms)
    pub fn cooldown_window(mut self, window: Duration) -> Self {
        self.cooldown_window = window;
        self
    }

    /// Scan poll interval while nothing is attracted (default 100ms)
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.cadence.poll_interval = interval;
        self
    }

    /// Scan poll interval while the stack is non-empty (default 50ms)
    pub fn attracted_poll_interval(mut self, interval: Duration) -> Self {
        self.cadence.attracted_poll_interval = interval;
        self
    }

    /// Janitor eviction interval (default 30s)
    pub fn janitor_interval(mut self, interval: Duration) -> Self {
        self.cadence.janitor_interval = interval;
        self
    }

    /// Hook fired once per completed attraction, with the item id
    pub fn on_attract(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_attract = Some(Arc::new(hook));
        self
    }

    /// Hook fired once per completed release, with the item id
    pub fn on_release(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_release = Some(Arc::new(hook));
        self
    }

    /// Build the controller. The starting configuration is the explicit one
    /// if given, else whatever the geometry provider supplies, else an empty
    /// point set with the default thresholds (the controller idles).
    pub fn build(self) -> AttractionController {
        let configuration = self
            .configuration
            .or_else(|| {
                self.provider
                    .as_ref()
                    .and_then(|provider| provider.default_geometry())
            })
            .unwrap_or_else(|| AttractionConfig {
                points: Vec::new(),
                attraction_threshold: DEFAULT_ATTRACTION_THRESHOLD,
                release_threshold: DEFAULT_RELEASE_THRESHOLD,
            });

        let inner = Arc::new(ControllerInner {
            registry: ItemRegistry::new(),
            stack: AttractionStack::new(),
            cache: SnapshotCache::new(),
            cooldowns: CooldownSet::new(self.cooldown_window),
            config: RwLock::new(configuration),
            distance_check: EdgeTrigger::new(),
            release_check: EdgeTrigger::new(),
            scan_active: std::sync::atomic::AtomicBool::new(false),
            render: self.render,
            provider: self.provider,
            on_attract: self.on_attract,
            on_release: self.on_release,
        });

        AttractionController {
            inner,
            cadence: self.cadence,
            pollers: Mutex::new(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestone_core::{Rect, SnapshotResource};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{OnceLock, Weak};

    const BADGE: Size = Size::new(40.0, 40.0);

    // Point at (200, 30); badge leading edge = origin + (20, 10).
    // Near: origin (180, 70) -> leading (200, 80), distance 50.
    // Mid: origin (180, 120) -> leading (200, 130), distance 100.
    // Far: origin (180, 320) -> leading (200, 330), distance 300.
    const NEAR: Point = Point::new(180.0, 70.0);
    const MID: Point = Point::new(180.0, 120.0);
    const FAR: Point = Point::new(180.0, 320.0);

    fn test_config() -> AttractionConfig {
        AttractionConfig::new(
            vec![AttractionPoint::new(Point::new(200.0, 30.0), 160.0, 1.0).unwrap()],
            200.0,
            250.0,
        )
        .unwrap()
    }

    #[derive(Debug, Clone)]
    enum Command {
        Attract {
            id: String,
            from: Rect,
            to: Point,
            with_snapshot: bool,
        },
        Release {
            id: String,
            from: Point,
            to: Rect,
            with_snapshot: bool,
        },
    }

    #[derive(Default)]
    struct RecordingRender {
        commands: Mutex<Vec<Command>>,
    }

    impl RecordingRender {
        fn commands(&self) -> Vec<Command> {
            self.commands.lock().unwrap().clone()
        }

        fn last(&self) -> Command {
            self.commands.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl RenderEngine for RecordingRender {
        fn start_attraction_animation(
            &self,
            id: &str,
            from: Rect,
            to: AttractionPoint,
            snapshot: Option<SnapshotHandle>,
        ) {
            self.commands.lock().unwrap().push(Command::Attract {
                id: id.to_string(),
                from,
                to: to.position,
                with_snapshot: snapshot.is_some(),
            });
        }

        fn start_release_animation(
            &self,
            id: &str,
            from: Point,
            to: Rect,
            snapshot: Option<SnapshotHandle>,
        ) {
            self.commands.lock().unwrap().push(Command::Release {
                id: id.to_string(),
                from,
                to,
                with_snapshot: snapshot.is_some(),
            });
        }
    }

    /// Render engine exercising the degraded path: completes every command
    /// synchronously from inside the start call.
    #[derive(Default)]
    struct CompletingRender {
        target: OnceLock<Weak<ControllerInner>>,
    }

    impl CompletingRender {
        fn attach(&self, controller: &AttractionController) {
            let _ = self.target.set(Arc::downgrade(&controller.inner));
        }
    }

    impl RenderEngine for CompletingRender {
        fn start_attraction_animation(
            &self,
            id: &str,
            _from: Rect,
            _to: AttractionPoint,
            _snapshot: Option<SnapshotHandle>,
        ) {
            if let Some(inner) = self.target.get().and_then(Weak::upgrade) {
                inner.on_attraction_animation_completed(id);
            }
        }

        fn start_release_animation(
            &self,
            id: &str,
            _from: Point,
            _to: Rect,
            _snapshot: Option<SnapshotHandle>,
        ) {
            if let Some(inner) = self.target.get().and_then(Weak::upgrade) {
                inner.on_release_animation_completed(id);
            }
        }
    }

    struct TrackedSnapshot {
        valid: AtomicBool,
        releases: Arc<AtomicUsize>,
    }

    impl TrackedSnapshot {
        fn new(releases: Arc<AtomicUsize>) -> Arc<Self> {
            Arc::new(Self {
                valid: AtomicBool::new(true),
                releases,
            })
        }
    }

    impl SnapshotResource for TrackedSnapshot {
        fn is_valid(&self) -> bool {
            self.valid.load(Ordering::Acquire)
        }

        fn release(&self) {
            if self.valid.swap(false, Ordering::AcqRel) {
                self.releases.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn controller_with(render: Arc<dyn RenderEngine>) -> AttractionController {
        AttractionController::builder(render)
            .configuration(test_config())
            .build()
    }

    /// Stack membership must mirror lifecycle state at every observation
    /// point
    fn assert_membership(controller: &AttractionController) {
        let stacked: HashSet<String> = controller.inner.stack.ids().into_iter().collect();
        for id in controller.inner.registry.ids() {
            let state = controller.inner.registry.state_of(&id).unwrap();
            assert_eq!(
                stacked.contains(&id),
                state.is_stacked(),
                "stack membership mismatch for '{}' in {:?}",
                id,
                state
            );
        }
        for id in &stacked {
            assert!(controller.inner.registry.contains(id));
        }
    }

    /// Drive an item through VISIBLE -> ATTRACTED with a manual completion
    fn attract(controller: &AttractionController, id: &str) {
        controller.update_position(id, true, BADGE, NEAR);
        controller.scan_for_attraction();
        controller.on_attraction_animation_completed(id);
        assert_eq!(controller.item_state(id), Some(ItemState::Attracted));
    }

    #[test]
    fn test_reregister_keeps_state_and_position() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        controller.update_position("badge", true, BADGE, MID);

        controller.register_item("badge", 2.0).unwrap();

        let item = controller.inner.registry.item("badge").unwrap();
        let record = item.read().unwrap();
        assert_eq!(record.strength, 2.0);
        assert_eq!(record.state, ItemState::Visible);
        assert_eq!(record.frame, Some(Rect::from_origin_size(MID, BADGE)));
    }

    #[test]
    fn test_attraction_at_distance_50() {
        let render = Arc::new(RecordingRender::default());
        let controller = controller_with(render.clone());
        controller.register_item("badge", 1.0).unwrap();

        controller.update_position("badge", true, BADGE, NEAR);
        assert!(controller.inner.distance_check.is_raised());

        let outcome = controller.scan_for_attraction();
        assert_eq!(outcome, ScanOutcome::Completed { transitions: 1 });
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracting));
        assert_eq!(controller.stack_size(), 1);
        assert!(controller.observe_attracted("badge").get());
        assert!(controller.observe_animating("badge").get());
        assert_membership(&controller);

        match render.last() {
            Command::Attract {
                id,
                from,
                to,
                with_snapshot,
            } => {
                assert_eq!(id, "badge");
                assert_eq!(from, Rect::from_origin_size(NEAR, BADGE));
                assert_eq!(to, Point::new(200.0, 30.0));
                assert!(!with_snapshot);
            }
            other => panic!("expected attraction command, got {:?}", other),
        }
    }

    #[test]
    fn test_out_of_range_item_does_not_attract() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();

        controller.update_position("badge", true, BADGE, FAR);
        assert!(!controller.inner.distance_check.is_raised());
        assert_eq!(
            controller.scan_for_attraction(),
            ScanOutcome::Completed { transitions: 0 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));
        assert_eq!(controller.stack_size(), 0);
    }

    #[test]
    fn test_strength_scales_attraction_range() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        // Threshold 200 but distance 300: only reachable with strength > 1.5
        controller.register_item("weak", 1.0).unwrap();
        controller.register_item("strong", 2.0).unwrap();

        controller.update_position("weak", true, BADGE, FAR);
        controller.update_position("strong", true, BADGE, FAR);
        controller.scan_for_attraction();

        assert_eq!(controller.item_state("weak"), Some(ItemState::Visible));
        assert_eq!(controller.item_state("strong"), Some(ItemState::Attracting));
    }

    #[test]
    fn test_attraction_completion_fires_hook_once() {
        let attracts = Arc::new(AtomicUsize::new(0));
        let hook_count = attracts.clone();
        let controller = AttractionController::builder(Arc::new(RecordingRender::default()))
            .configuration(test_config())
            .on_attract(move |_id| {
                hook_count.fetch_add(1, Ordering::Relaxed);
            })
            .build();
        controller.register_item("badge", 1.0).unwrap();
        controller.update_position("badge", true, BADGE, NEAR);
        controller.scan_for_attraction();

        controller.on_attraction_animation_completed("badge");
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));
        assert!(!controller.observe_animating("badge").get());
        assert!(controller.observe_attracted("badge").get());
        assert_eq!(attracts.load(Ordering::Relaxed), 1);

        // Duplicate callback: state is no longer ATTRACTING, hook stays at 1
        controller.on_attraction_animation_completed("badge");
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));
        assert_eq!(attracts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_release_cycle_distance_100_to_300() {
        let releases = Arc::new(AtomicUsize::new(0));
        let hook_count = releases.clone();
        let render = Arc::new(RecordingRender::default());
        let controller = AttractionController::builder(render.clone())
            .configuration(test_config())
            .on_release(move |_id| {
                hook_count.fetch_add(1, Ordering::Relaxed);
            })
            .build();
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");
        let original = Rect::from_origin_size(NEAR, BADGE);

        // Held at distance 100: inside the release threshold, no request
        controller.update_position("badge", true, BADGE, MID);
        assert!(!controller.inner.release_check.is_raised());

        // Drift to distance 300 moving toward the bottom: request raised
        controller.update_position("badge", true, BADGE, FAR);
        assert!(controller.inner.release_check.is_raised());

        let outcome = controller.scan_for_release();
        assert_eq!(outcome, ScanOutcome::Completed { transitions: 1 });
        assert_eq!(controller.item_state("badge"), Some(ItemState::Releasing));
        assert_eq!(controller.stack_size(), 0);
        assert!(controller.observe_animating("badge").get());
        assert_membership(&controller);

        match render.last() {
            Command::Release { id, from, to, .. } => {
                assert_eq!(id, "badge");
                assert_eq!(from, Point::new(200.0, 30.0));
                // Release targets the frame frozen at attraction time
                assert_eq!(to, original);
            }
            other => panic!("expected release command, got {:?}", other),
        }

        controller.on_release_animation_completed("badge");
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));
        assert!(!controller.observe_attracted("badge").get());
        assert!(!controller.observe_animating("badge").get());
        assert!(controller.inner.cooldowns.active("badge"));
        assert_eq!(releases.load(Ordering::Relaxed), 1);

        let item = controller.inner.registry.item("badge").unwrap();
        assert!(item.read().unwrap().original_frame.is_none());
    }

    #[test]
    fn test_release_requires_descent() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");

        // Out of range but moving up (y shrinks): hysteresis holds the item
        controller.update_position("badge", true, BADGE, FAR);
        controller.update_position("badge", true, BADGE, Point::new(180.0, 300.0));
        controller.inner.release_check.raise();

        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 0 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));
        assert_eq!(controller.stack_size(), 1);
    }

    #[test]
    fn test_descent_follows_latest_commit() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");

        // Out past the threshold moving down, then a step back up: the most
        // recent movement decides, so the item stays held.
        controller.update_position("badge", true, BADGE, FAR);
        controller.update_position("badge", true, BADGE, Point::new(180.0, 300.0));
        controller.inner.release_check.raise();
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 0 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));

        // Downward again: now it releases.
        controller.update_position("badge", true, BADGE, FAR);
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 1 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Releasing));
    }

    #[test]
    fn test_release_only_considers_stack_front() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("a", 1.0).unwrap();
        controller.register_item("b", 1.0).unwrap();
        controller.update_position("a", true, BADGE, NEAR);
        controller.update_position("b", true, BADGE, NEAR);
        controller.scan_for_attraction();
        controller.on_attraction_animation_completed("a");
        controller.on_attraction_animation_completed("b");
        assert_eq!(controller.stack_size(), 2);
        assert_membership(&controller);

        let front = controller.inner.stack.front().unwrap();
        let back = if front == "a" { "b" } else { "a" };

        // The non-front item drifts out; the front stays near, so the scan
        // must not release anything.
        controller.update_position(&back, true, BADGE, FAR);
        assert!(controller.inner.release_check.is_raised());
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 0 }
        );
        assert_eq!(controller.item_state(&back), Some(ItemState::Attracted));
        assert_eq!(controller.stack_size(), 2);

        // Now the front drifts out; only the front is released.
        controller.update_position(&front, true, BADGE, FAR);
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 1 }
        );
        assert_eq!(controller.item_state(&front), Some(ItemState::Releasing));
        assert_eq!(controller.item_state(&back), Some(ItemState::Attracted));
        assert_eq!(controller.inner.stack.front().as_deref(), Some(back));
        assert_membership(&controller);
    }

    /// Two items through whole cycles back to back: LIFO order, front-only
    /// release to the frozen frame, cool-down re-entry, deferred removal,
    /// and exact command counts at the end.
    #[test]
    fn test_two_item_cycle_end_to_end() {
        let render = Arc::new(RecordingRender::default());
        let controller = AttractionController::builder(render.clone())
            .configuration(test_config())
            .cooldown_window(Duration::from_millis(50))
            .build();
        controller.register_item("alpha", 1.0).unwrap();
        controller.register_item("beta", 1.0).unwrap();

        // Attract one at a time so the stack order is deterministic.
        controller.update_position("alpha", true, BADGE, NEAR);
        controller.scan_for_attraction();
        controller.on_attraction_animation_completed("alpha");
        controller.update_position("beta", true, BADGE, MID);
        controller.scan_for_attraction();
        controller.on_attraction_animation_completed("beta");
        assert_eq!(controller.inner.stack.ids(), vec!["beta", "alpha"]);
        assert_membership(&controller);

        // The non-front item drifting out releases nothing.
        controller.update_position("alpha", true, BADGE, FAR);
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 0 }
        );

        // The front drifts out and returns to its frozen original frame.
        controller.update_position("beta", true, BADGE, FAR);
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 1 }
        );
        match render.last() {
            Command::Release { id, to, .. } => {
                assert_eq!(id, "beta");
                assert_eq!(to, Rect::from_origin_size(MID, BADGE));
            }
            other => panic!("expected release command, got {:?}", other),
        }
        controller.on_release_animation_completed("beta");
        assert_membership(&controller);

        // Cooling down: back in range attracts nothing.
        controller.update_position("beta", true, BADGE, NEAR);
        controller.scan_for_attraction();
        assert_eq!(controller.item_state("beta"), Some(ItemState::Visible));

        // After the window it re-attracts, then is unregistered mid-hold.
        std::thread::sleep(Duration::from_millis(70));
        controller.update_position("beta", true, BADGE, NEAR);
        controller.scan_for_attraction();
        controller.on_attraction_animation_completed("beta");
        assert!(!controller.unregister_item("beta"));

        // The pending item still finishes its cycle; the janitor removes it
        // only once it has settled and cooled down.
        controller.update_position("beta", true, BADGE, FAR);
        controller.scan_for_release();
        controller.on_release_animation_completed("beta");
        controller.run_janitor();
        assert!(controller.inner.registry.contains("beta"));
        std::thread::sleep(Duration::from_millis(70));
        controller.run_janitor();
        assert!(!controller.inner.registry.contains("beta"));

        // The other item rode along held the whole time.
        assert_eq!(controller.item_state("alpha"), Some(ItemState::Attracted));
        assert_eq!(controller.inner.stack.ids(), vec!["alpha"]);
        assert_membership(&controller);

        let commands = render.commands();
        let attracts = commands
            .iter()
            .filter(|command| matches!(command, Command::Attract { .. }))
            .count();
        assert_eq!(attracts, 3);
        assert_eq!(commands.len(), 5);
    }

    #[test]
    fn test_update_configuration_raises_requests() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        let points = vec![AttractionPoint::new(Point::new(300.0, 40.0), 120.0, 1.0).unwrap()];

        // Stack empty: distance check only
        controller
            .update_configuration(points.clone(), 150.0, 220.0)
            .unwrap();
        assert!(controller.inner.distance_check.take());
        assert!(!controller.inner.release_check.is_raised());
        assert_eq!(controller.configuration().attraction_threshold, 150.0);

        // Stack non-empty: both requests
        controller
            .update_configuration(
                vec![AttractionPoint::new(Point::new(200.0, 30.0), 160.0, 1.0).unwrap()],
                200.0,
                250.0,
            )
            .unwrap();
        controller.inner.distance_check.take();
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");
        controller.inner.distance_check.take();
        controller.inner.release_check.take();

        controller.update_configuration(points, 150.0, 220.0).unwrap();
        assert!(controller.inner.distance_check.is_raised());
        assert!(controller.inner.release_check.is_raised());
    }

    #[test]
    fn test_invalid_configuration_leaves_active_one_untouched() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        let before = controller.configuration();

        let result = controller.update_configuration(Vec::new(), -1.0, 250.0);
        assert!(result.is_err());
        assert_eq!(controller.configuration(), before);
        assert!(!controller.inner.distance_check.is_raised());
    }

    #[test]
    fn test_contended_scan_is_skipped() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        controller.update_position("badge", true, BADGE, NEAR);

        controller
            .inner
            .scan_active
            .store(true, Ordering::Release);
        assert_eq!(controller.scan_for_attraction(), ScanOutcome::Skipped);
        assert_eq!(controller.scan_for_release(), ScanOutcome::Skipped);
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));

        controller
            .inner
            .scan_active
            .store(false, Ordering::Release);
        assert_eq!(
            controller.scan_for_attraction(),
            ScanOutcome::Completed { transitions: 1 }
        );
    }

    #[test]
    fn test_cooldown_suppresses_reattraction() {
        let render = Arc::new(RecordingRender::default());
        let controller = AttractionController::builder(render.clone())
            .configuration(test_config())
            .cooldown_window(Duration::from_millis(60))
            .build();
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");
        controller.update_position("badge", true, BADGE, FAR);
        controller.scan_for_release();
        controller.on_release_animation_completed("badge");

        // Back in range during the cool-down: the measurement is ignored
        // and no distance check is requested.
        controller.inner.distance_check.take();
        controller.update_position("badge", true, BADGE, NEAR);
        assert!(!controller.inner.distance_check.is_raised());
        let item = controller.inner.registry.item("badge").unwrap();
        assert_eq!(
            item.read().unwrap().frame,
            Some(Rect::from_origin_size(FAR, BADGE))
        );
        assert_eq!(
            controller.scan_for_attraction(),
            ScanOutcome::Completed { transitions: 0 }
        );
        // One attract and one release so far, nothing new
        assert_eq!(render.commands().len(), 2);

        // After the window the same measurement attracts again
        std::thread::sleep(Duration::from_millis(80));
        controller.update_position("badge", true, BADGE, NEAR);
        assert!(controller.inner.distance_check.is_raised());
        assert_eq!(
            controller.scan_for_attraction(),
            ScanOutcome::Completed { transitions: 1 }
        );
        assert_eq!(render.commands().len(), 3);
    }

    #[test]
    fn test_deferred_unregister_survives_until_janitor() {
        let controller = AttractionController::builder(Arc::new(RecordingRender::default()))
            .configuration(test_config())
            .cooldown_window(Duration::from_millis(40))
            .build();
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");

        assert!(!controller.unregister_item("badge"));
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));
        assert_eq!(controller.stack_size(), 1);

        // The pending item completes its cycle normally
        controller.update_position("badge", true, BADGE, FAR);
        controller.scan_for_release();
        controller.on_release_animation_completed("badge");
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));

        // Still cooling down: janitor leaves it alone
        controller.run_janitor();
        assert!(controller.inner.registry.contains("badge"));

        std::thread::sleep(Duration::from_millis(60));
        controller.run_janitor();
        assert!(!controller.inner.registry.contains("badge"));
        assert_eq!(controller.stack_size(), 0);
        assert!(controller.inner.cache.is_empty());
    }

    #[test]
    fn test_pending_item_is_not_reattracted() {
        let controller = AttractionController::builder(Arc::new(RecordingRender::default()))
            .configuration(test_config())
            .cooldown_window(Duration::from_millis(10))
            .build();
        controller.register_item("badge", 1.0).unwrap();
        attract(&controller, "badge");
        controller.unregister_item("badge");
        controller.update_position("badge", true, BADGE, FAR);
        controller.scan_for_release();
        controller.on_release_animation_completed("badge");

        // Cool-down expired but the janitor has not swept yet; the pending
        // record must not re-enter the cycle.
        std::thread::sleep(Duration::from_millis(20));
        controller.update_position("badge", true, BADGE, NEAR);
        assert_eq!(
            controller.scan_for_attraction(),
            ScanOutcome::Completed { transitions: 0 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));
    }

    #[test]
    fn test_synchronous_completion_path() {
        let render = Arc::new(CompletingRender::default());
        let controller = controller_with(render.clone());
        render.attach(&controller);
        controller.register_item("badge", 1.0).unwrap();

        // The render engine completes inside start_attraction_animation, so
        // one scan carries the item all the way to ATTRACTED.
        controller.update_position("badge", true, BADGE, NEAR);
        let outcome = controller.scan_for_attraction();
        assert_eq!(outcome, ScanOutcome::Completed { transitions: 1 });
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));
        assert_membership(&controller);

        controller.update_position("badge", true, BADGE, FAR);
        assert_eq!(
            controller.scan_for_release(),
            ScanOutcome::Completed { transitions: 1 }
        );
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));
        assert!(controller.inner.cooldowns.active("badge"));
    }

    #[test]
    fn test_snapshot_travels_with_commands_and_dies_on_release() {
        let releases = Arc::new(AtomicUsize::new(0));
        let render = Arc::new(RecordingRender::default());
        let controller = controller_with(render.clone());
        controller.register_item("badge", 1.0).unwrap();
        controller.store_snapshot("badge", TrackedSnapshot::new(releases.clone()));

        controller.update_position("badge", true, BADGE, NEAR);
        controller.scan_for_attraction();
        match render.last() {
            Command::Attract { with_snapshot, .. } => assert!(with_snapshot),
            other => panic!("expected attraction command, got {:?}", other),
        }

        controller.on_attraction_animation_completed("badge");
        controller.update_position("badge", true, BADGE, FAR);
        controller.scan_for_release();
        match render.last() {
            Command::Release { with_snapshot, .. } => assert!(with_snapshot),
            other => panic!("expected release command, got {:?}", other),
        }

        controller.on_release_animation_completed("badge");
        assert!(controller.snapshot("badge").is_none());
        assert_eq!(releases.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_store_replaces_and_releases_prior_snapshot() {
        let releases = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.store_snapshot("badge", TrackedSnapshot::new(releases.clone()));
        controller.store_snapshot("badge", TrackedSnapshot::new(releases.clone()));
        assert_eq!(releases.load(Ordering::Relaxed), 1);
        assert!(controller.snapshot("badge").is_some());
    }

    #[test]
    fn test_janitor_evicts_settled_snapshot() {
        let releases = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        controller.update_position("badge", true, BADGE, FAR);
        controller.store_snapshot("badge", TrackedSnapshot::new(releases.clone()));
        controller.store_snapshot("orphan", TrackedSnapshot::new(releases.clone()));

        controller.run_janitor();

        // Both go: one item is VISIBLE outside the stack, the other is not
        // registered at all.
        assert!(controller.snapshot("badge").is_none());
        assert!(controller.snapshot("orphan").is_none());
        assert_eq!(releases.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_janitor_keeps_snapshot_of_attracted_item() {
        let releases = Arc::new(AtomicUsize::new(0));
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();
        controller.store_snapshot("badge", TrackedSnapshot::new(releases.clone()));
        attract(&controller, "badge");

        controller.run_janitor();
        assert!(controller.snapshot("badge").is_some());
        assert_eq!(releases.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_orientation_change_requeries_provider() {
        struct RotatingProvider {
            landscape: AtomicBool,
        }

        impl GeometryProvider for RotatingProvider {
            fn default_geometry(&self) -> Option<AttractionConfig> {
                let x = if self.landscape.load(Ordering::Acquire) {
                    400.0
                } else {
                    200.0
                };
                AttractionConfig::from_points(vec![
                    AttractionPoint::new(Point::new(x, 30.0), 200.0, 1.0).ok()?
                ])
                .ok()
            }
        }

        let provider = Arc::new(RotatingProvider {
            landscape: AtomicBool::new(false),
        });
        let controller = AttractionController::builder(Arc::new(RecordingRender::default()))
            .geometry_provider(provider.clone())
            .build();
        assert_eq!(
            controller.configuration().primary().unwrap().position.x,
            200.0
        );

        provider.landscape.store(true, Ordering::Release);
        assert!(controller.notify_orientation_changed());
        assert_eq!(
            controller.configuration().primary().unwrap().position.x,
            400.0
        );
        assert!(controller.inner.distance_check.is_raised());
    }

    #[test]
    fn test_orientation_change_without_provider() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        let before = controller.configuration();
        assert!(!controller.notify_orientation_changed());
        assert_eq!(controller.configuration(), before);
    }

    #[test]
    fn test_update_position_noop_paths() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();

        controller.update_position("badge", false, BADGE, NEAR);
        controller.update_position("badge", true, Size::ZERO, NEAR);
        controller.update_position("ghost", true, BADGE, NEAR);

        assert!(!controller.inner.distance_check.is_raised());
        let item = controller.inner.registry.item("badge").unwrap();
        assert!(item.read().unwrap().frame.is_none());
        assert!(!controller.inner.registry.contains("ghost"));
    }

    #[test]
    fn test_force_release_check() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        assert!(!controller.inner.release_check.is_raised());
        controller.force_release_check();
        assert!(controller.inner.release_check.is_raised());
    }

    #[test]
    fn test_side_channel_never_changes_state() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        controller.register_item("badge", 1.0).unwrap();

        controller.set_item_animating("badge", true, Some(ItemState::Attracting));
        assert!(controller.observe_animating("badge").get());
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));

        controller.set_item_animating("badge", false, None);
        assert!(!controller.observe_animating("badge").get());
    }

    #[test]
    fn test_observed_signal_survives_registration() {
        let controller = controller_with(Arc::new(RecordingRender::default()));
        let attracted = controller.observe_attracted("badge");
        assert!(!attracted.get());

        controller.register_item("badge", 1.5).unwrap();
        controller.update_position("badge", true, BADGE, NEAR);
        controller.scan_for_attraction();

        assert!(attracted.get());
    }

    #[test]
    fn test_background_pollers_drive_full_cycle() {
        let render = Arc::new(CompletingRender::default());
        let controller = AttractionController::builder(render.clone())
            .configuration(test_config())
            .cooldown_window(Duration::from_millis(30))
            .poll_interval(Duration::from_millis(5))
            .attracted_poll_interval(Duration::from_millis(5))
            .janitor_interval(Duration::from_millis(10))
            .build();
        render.attach(&controller);
        controller.start_background();
        assert!(controller.is_background_running());
        controller.start_background();

        controller.register_item("badge", 1.0).unwrap();
        controller.update_position("badge", true, BADGE, NEAR);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(controller.item_state("badge"), Some(ItemState::Attracted));

        controller.update_position("badge", true, BADGE, FAR);
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(controller.item_state("badge"), Some(ItemState::Visible));
        assert_eq!(controller.stack_size(), 0);

        controller.stop_background();
        assert!(!controller.is_background_running());
    }

    /// Heavy register/scan/release/unregister churn from several threads at
    /// once must neither deadlock nor leave the stack disagreeing with the
    /// item states once everything settles.
    #[test]
    fn test_concurrent_churn_keeps_membership_consistent() {
        let controller = Arc::new(
            AttractionController::builder(Arc::new(RecordingRender::default()))
                .configuration(test_config())
                .cooldown_window(Duration::from_millis(1))
                .build(),
        );

        let mut workers = Vec::new();
        for worker in 0..4 {
            let controller = Arc::clone(&controller);
            workers.push(std::thread::spawn(move || {
                let id = format!("badge-{}", worker);
                for round in 0..200 {
                    controller.register_item(&id, 1.0).unwrap();
                    controller.update_position(&id, true, BADGE, NEAR);
                    controller.scan_for_attraction();
                    controller.on_attraction_animation_completed(&id);
                    controller.update_position(&id, true, BADGE, FAR);
                    controller.scan_for_release();
                    controller.on_release_animation_completed(&id);
                    if round % 3 == 0 {
                        controller.unregister_item(&id);
                        controller.run_janitor();
                    }
                }
            }));
        }
        let observer = {
            let controller = Arc::clone(&controller);
            std::thread::spawn(move || {
                for _ in 0..400 {
                    for worker in 0..4 {
                        let id = format!("badge-{}", worker);
                        let _ = controller.item_state(&id);
                        let _ = controller.observe_attracted(&id).get();
                    }
                    let _ = controller.stack_size();
                }
            })
        };

        for worker in workers {
            worker.join().unwrap();
        }
        observer.join().unwrap();

        assert_membership(&controller);
        assert!(controller.stack_size() <= 4);
    }
}
