//! Attraction points and the active configuration
//!
//! An [`AttractionPoint`] is a UI-anchored location with a capture radius
//! toward which eligible items animate. A set of points plus the two distance
//! thresholds forms an [`AttractionConfig`]; the first point is the primary
//! one used for all eligibility tests. Constructors validate eagerly, so an
//! invalid value never produces partial state.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::geometry::Point;

/// Release threshold derived from a point radius: the extra quarter gives the
/// attract/release pair its hysteresis band.
pub const RELEASE_THRESHOLD_FACTOR: f32 = 1.25;

/// A location items can attract toward, with capture radius and strength.
///
/// Treated as an immutable value once constructed; replacing the active set
/// goes through `update_configuration` on the controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttractionPoint {
    pub position: Point,
    pub radius: f32,
    pub strength: f32,
}

impl AttractionPoint {
    /// Fails fast on non-positive radius or strength.
    pub fn new(position: Point, radius: f32, strength: f32) -> Result<Self> {
        if !(radius > 0.0) {
            return Err(ConfigError::NonPositiveRadius(radius));
        }
        if !(strength > 0.0) {
            return Err(ConfigError::NonPositiveStrength(strength));
        }
        Ok(Self {
            position,
            radius,
            strength,
        })
    }
}

/// The active attraction geometry: point set plus both distance thresholds.
///
/// The first point is the primary one. An empty point set is legal; the
/// controller simply idles until a configuration with points arrives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttractionConfig {
    pub points: Vec<AttractionPoint>,
    pub attraction_threshold: f32,
    pub release_threshold: f32,
}

impl AttractionConfig {
    /// Validates thresholds and every point; no partial state on error.
    pub fn new(
        points: Vec<AttractionPoint>,
        attraction_threshold: f32,
        release_threshold: f32,
    ) -> Result<Self> {
        if !(attraction_threshold > 0.0) {
            return Err(ConfigError::NonPositiveAttractionThreshold(
                attraction_threshold,
            ));
        }
        if !(release_threshold > 0.0) {
            return Err(ConfigError::NonPositiveReleaseThreshold(release_threshold));
        }
        for point in &points {
            if !(point.radius > 0.0) {
                return Err(ConfigError::NonPositiveRadius(point.radius));
            }
            if !(point.strength > 0.0) {
                return Err(ConfigError::NonPositiveStrength(point.strength));
            }
        }
        Ok(Self {
            points,
            attraction_threshold,
            release_threshold,
        })
    }

    /// Builds a configuration with thresholds derived from the primary
    /// point's radius (attract at the radius, release a quarter further out).
    pub fn from_points(points: Vec<AttractionPoint>) -> Result<Self> {
        let radius = match points.first() {
            Some(primary) => primary.radius,
            None => return Err(ConfigError::NonPositiveRadius(0.0)),
        };
        Self::new(points, radius, radius * RELEASE_THRESHOLD_FACTOR)
    }

    /// The primary attraction point, if any are configured
    pub fn primary(&self) -> Option<&AttractionPoint> {
        self.points.first()
    }
}
