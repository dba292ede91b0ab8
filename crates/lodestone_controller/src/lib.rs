//! Attraction controller for notch-style UI docking
//!
//! Lodestone tracks registered UI items and animates them into and out of
//! *attraction points* (a notch, a dock, a magnetic corner) based on where
//! layout puts them. The embedding UI feeds position updates in; the
//! controller decides when an item is captured and when it is let go, and
//! delegates the actual animation to an injected [`RenderEngine`].
//!
//! Every item moves through one closed cycle, never skipping a step:
//!
//! ```text
//! VISIBLE ──scan──▶ ATTRACTING ──completion──▶ ATTRACTED
//!    ▲                                             │
//!    └──completion── RELEASING ◀────────scan───────┘
//! ```
//!
//! Captured items stack in last-in-first-out order; only the newest capture
//! is considered for release, and release requires both distance (beyond the
//! release threshold, which sits above the attraction threshold for
//! hysteresis) and direction (moving toward the bottom of the screen). A
//! released item enters a cool-down window during which it cannot be
//! re-captured.
//!
//! Scans run on two background poller threads plus a janitor, all edge
//! triggered; embedders with their own frame loop can skip
//! [`AttractionController::start_background`] and drive the scan and
//! janitor entry points directly.
//!
//! ```ignore
//! use std::sync::Arc;
//! use lodestone_controller::{AttractionController, Point, Size};
//!
//! let controller = AttractionController::builder(render_engine)
//!     .geometry_provider(platform_geometry)
//!     .build();
//! controller.start_background();
//!
//! controller.register_item("music-widget", 1.0)?;
//! let attracted = controller.observe_attracted("music-widget");
//!
//! // from the layout pass:
//! controller.update_position("music-widget", true, Size::new(44.0, 44.0), Point::new(180.0, 70.0));
//! ```
//!
//! Known limitation: the controller trusts the render engine to deliver
//! every completion callback. There is no animation timeout, so a dropped
//! callback leaves the item in its transitional state until the embedder
//! intervenes (a render engine that cannot animate should complete
//! synchronously instead of going silent).

pub mod cache;
pub mod controller;
mod engine;
pub mod item;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod stack;

pub use cache::DEFAULT_COOLDOWN_WINDOW;
pub use controller::{
    AttractionController, ControllerBuilder, DEFAULT_ATTRACTION_THRESHOLD,
    DEFAULT_RELEASE_THRESHOLD,
};
pub use engine::ScanOutcome;
pub use item::{ItemState, DEFAULT_STRENGTH};
pub use registry::ItemRegistry;
pub use render::{GeometryProvider, RenderEngine, TransitionHook};
pub use scheduler::{
    PollerCadence, DEFAULT_ATTRACTED_POLL_INTERVAL, DEFAULT_JANITOR_INTERVAL,
    DEFAULT_POLL_INTERVAL,
};
pub use stack::AttractionStack;

pub use lodestone_core::{
    AttractionConfig, AttractionPoint, BoolSignal, ConfigError, Point, Rect, Result, Size,
    SnapshotHandle, SnapshotResource,
};
