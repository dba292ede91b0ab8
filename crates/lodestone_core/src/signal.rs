//! Lightweight observable flags
//!
//! Two primitives cover the controller's signalling needs:
//!
//! - [`BoolSignal`] is a level-style observable boolean. The controller keeps
//!   one per item for `attracted` and `animating`; UI bindings clone the
//!   handle and poll it cheaply from any thread.
//! - [`EdgeTrigger`] is an edge-style request flag, raised by mutators and
//!   drained (`take`) by a poller. Draining returns whether the flag was
//!   raised since the last drain, so a request is observed exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable observable boolean; all clones share one value.
#[derive(Clone, Debug, Default)]
pub struct BoolSignal {
    value: Arc<AtomicBool>,
}

impl BoolSignal {
    pub fn new(initial: bool) -> Self {
        Self {
            value: Arc::new(AtomicBool::new(initial)),
        }
    }

    pub fn get(&self) -> bool {
        self.value.load(Ordering::Acquire)
    }

    pub fn set(&self, value: bool) {
        self.value.store(value, Ordering::Release);
    }
}

/// Edge-triggered request flag: raised by any thread, drained by one poller.
#[derive(Debug, Default)]
pub struct EdgeTrigger {
    raised: AtomicBool,
}

impl EdgeTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    /// Clears the flag and reports whether it was raised.
    pub fn take(&self) -> bool {
        self.raised.swap(false, Ordering::Acquire)
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }
}
