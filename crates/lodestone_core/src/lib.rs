//! Lodestone core types
//!
//! Shared value types and seams for the lodestone attraction controller:
//! 2D geometry, attraction points and validated configuration, observable
//! flags, and the snapshot-resource handle embedders implement.
//!
//! This crate has no threads and no policy; the state machine, registry,
//! and pollers live in `lodestone_controller`.
//!
//! ```ignore
//! use lodestone_core::{AttractionConfig, AttractionPoint, Point};
//!
//! let notch = AttractionPoint::new(Point::new(200.0, 24.0), 160.0, 1.0)?;
//! let config = AttractionConfig::from_points(vec![notch])?;
//! assert!(config.release_threshold > config.attraction_threshold);
//! ```

pub mod config;
pub mod error;
pub mod geometry;
pub mod signal;
pub mod snapshot;

pub use config::{AttractionConfig, AttractionPoint, RELEASE_THRESHOLD_FACTOR};
pub use error::{ConfigError, Result};
pub use geometry::{distance, recede_from, Point, Rect, Size};
pub use signal::{BoolSignal, EdgeTrigger};
pub use snapshot::{SnapshotHandle, SnapshotResource};
