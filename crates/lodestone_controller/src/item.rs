//! Item lifecycle state and per-item records

use std::time::Instant;

use lodestone_core::{BoolSignal, Point, Rect, Size};

/// Strength multiplier for records created lazily through observation
pub const DEFAULT_STRENGTH: f32 = 1.0;

/// Lifecycle state of a tracked item.
///
/// Transitions form a closed cycle; no other edge exists:
///
/// ```text
/// VISIBLE ──scan──▶ ATTRACTING ──completion──▶ ATTRACTED
///    ▲                                             │
///    └──completion── RELEASING ◀────────scan───────┘
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ItemState {
    /// Resting in normal layout (initial and terminal per cycle)
    #[default]
    Visible,
    /// Inbound animation in flight
    Attracting,
    /// Held at the attraction point
    Attracted,
    /// Outbound animation in flight
    Releasing,
}

impl ItemState {
    /// True while an animation or hold is in flight; unregistration is
    /// deferred in these states.
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            ItemState::Attracting | ItemState::Attracted | ItemState::Releasing
        )
    }

    /// True for the states whose ids must be attraction-stack members
    pub fn is_stacked(&self) -> bool {
        matches!(self, ItemState::Attracting | ItemState::Attracted)
    }

    /// The single legal successor in the cycle
    pub fn next_in_cycle(&self) -> ItemState {
        match self {
            ItemState::Visible => ItemState::Attracting,
            ItemState::Attracting => ItemState::Attracted,
            ItemState::Attracted => ItemState::Releasing,
            ItemState::Releasing => ItemState::Visible,
        }
    }
}

/// Mutable per-item record.
///
/// Owned exclusively by the registry and guarded by a dedicated `RwLock`;
/// every field is read and written only while that lock is held. The two
/// signals are atomics shared with UI observers, so flipping them under the
/// lock never blocks a reader.
#[derive(Debug)]
pub struct ItemRecord {
    /// Attraction strength multiplier (> 0)
    pub strength: f32,
    pub state: ItemState,
    /// Last committed frame in root coordinates; `None` until first measured
    pub frame: Option<Rect>,
    /// Center of the commit before `frame`; release checks compare the two
    /// centers to detect movement toward the bottom
    pub previous_center: Option<Point>,
    /// Frame frozen at attraction start; the release target
    pub original_frame: Option<Rect>,
    /// Leading-edge distance to the primary point at last measurement
    pub last_distance: f32,
    /// Observable: item currently captured by an attraction point
    pub attracted: BoolSignal,
    /// Observable: an animation is in flight for this item
    pub animating: BoolSignal,
    /// Transitional state announced ahead of time via the render side channel
    pub expected_phase: Option<ItemState>,
    /// Unregistration arrived mid-transition; janitor removes once settled
    pub pending_removal: bool,
    pub last_update: Option<Instant>,
}

impl ItemRecord {
    pub fn new(strength: f32) -> Self {
        Self {
            strength,
            state: ItemState::Visible,
            frame: None,
            previous_center: None,
            original_frame: None,
            last_distance: f32::INFINITY,
            attracted: BoolSignal::new(false),
            animating: BoolSignal::new(false),
            expected_phase: None,
            pending_removal: false,
            last_update: None,
        }
    }
}

impl Default for ItemRecord {
    fn default() -> Self {
        Self::new(DEFAULT_STRENGTH)
    }
}

/// Immutable measurement of an item, copied out of the record at scan time.
#[derive(Clone, Debug, PartialEq)]
pub struct ItemSample {
    pub id: String,
    pub center: Point,
    pub size: Size,
    pub strength: f32,
}

impl ItemSample {
    /// The frame this measurement was taken from
    pub fn frame(&self) -> Rect {
        Rect::from_center(self.center, self.size)
    }

    /// Leading-edge reference point for distance comparison
    pub fn leading_edge(&self) -> Point {
        self.frame().leading_edge()
    }
}
