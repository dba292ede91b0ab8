//! Background pollers driving the scans and the janitor
//!
//! Three plain OS threads, no async runtime: one drains the distance-check
//! request into attraction scans, one drains the release-check request into
//! release scans, and one runs the slow eviction pass. All three share a
//! stop flag and are joined on stop, so dropping the controller never leaks
//! a thread.
//!
//! Poll cadence tightens from 100ms to 50ms while anything is attracted,
//! matching the recommended position-source reporting rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::engine::{ControllerInner, ScanOutcome};

/// Scan poll interval while nothing is attracted
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Scan poll interval while the stack is non-empty
pub const DEFAULT_ATTRACTED_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Janitor eviction interval
pub const DEFAULT_JANITOR_INTERVAL: Duration = Duration::from_secs(30);

/// Sleep slice for the janitor thread, keeping stop responsive across the
/// long eviction interval
const JANITOR_TICK: Duration = Duration::from_millis(200);

/// Poll intervals for the background threads
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollerCadence {
    pub poll_interval: Duration,
    pub attracted_poll_interval: Duration,
    pub janitor_interval: Duration,
}

impl Default for PollerCadence {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            attracted_poll_interval: DEFAULT_ATTRACTED_POLL_INTERVAL,
            janitor_interval: DEFAULT_JANITOR_INTERVAL,
        }
    }
}

/// Running poller threads; stopped and joined on `stop` or Drop.
pub(crate) struct Pollers {
    stop_flag: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Pollers {
    pub(crate) fn start(inner: Arc<ControllerInner>, cadence: PollerCadence) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let mut handles = Vec::with_capacity(3);

        {
            let inner = Arc::clone(&inner);
            let stop = Arc::clone(&stop_flag);
            handles.push(thread::spawn(move || {
                tracing::trace!("attraction poller started");
                while !stop.load(Ordering::Relaxed) {
                    let tick_start = Instant::now();
                    // A drained request that loses the scan guard is re-raised
                    // so the next tick retries it.
                    if inner.distance_check.take()
                        && inner.scan_for_attraction() == ScanOutcome::Skipped
                    {
                        inner.distance_check.raise();
                    }
                    let interval = if inner.stack.is_empty() {
                        cadence.poll_interval
                    } else {
                        cadence.attracted_poll_interval
                    };
                    let elapsed = tick_start.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
                tracing::trace!("attraction poller stopped");
            }));
        }

        {
            let inner = Arc::clone(&inner);
            let stop = Arc::clone(&stop_flag);
            handles.push(thread::spawn(move || {
                tracing::trace!("release poller started");
                while !stop.load(Ordering::Relaxed) {
                    let tick_start = Instant::now();
                    if inner.release_check.take()
                        && inner.scan_for_release() == ScanOutcome::Skipped
                    {
                        inner.release_check.raise();
                    }
                    let interval = if inner.stack.is_empty() {
                        cadence.poll_interval
                    } else {
                        cadence.attracted_poll_interval
                    };
                    let elapsed = tick_start.elapsed();
                    if elapsed < interval {
                        thread::sleep(interval - elapsed);
                    }
                }
                tracing::trace!("release poller stopped");
            }));
        }

        {
            let stop = Arc::clone(&stop_flag);
            handles.push(thread::spawn(move || {
                tracing::trace!("janitor started");
                let mut last_run = Instant::now();
                while !stop.load(Ordering::Relaxed) {
                    if last_run.elapsed() >= cadence.janitor_interval {
                        inner.run_janitor();
                        last_run = Instant::now();
                    }
                    thread::sleep(JANITOR_TICK.min(cadence.janitor_interval));
                }
                tracing::trace!("janitor stopped");
            }));
        }

        Self { stop_flag, handles }
    }

    pub(crate) fn stop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Pollers {
    fn drop(&mut self) {
        self.stop();
    }
}
