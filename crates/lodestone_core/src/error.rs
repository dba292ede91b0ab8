//! Error types for lodestone_core

use thiserror::Error;

/// Validation errors raised while constructing attraction geometry.
///
/// Every constructor validates eagerly and returns before any state is
/// created, so a caller never observes a partially-applied configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Item or point strength multiplier must be greater than zero
    #[error("strength must be positive, got {0}")]
    NonPositiveStrength(f32),

    /// Attraction point capture radius must be greater than zero
    #[error("attraction point radius must be positive, got {0}")]
    NonPositiveRadius(f32),

    /// Attraction threshold must be greater than zero
    #[error("attraction threshold must be positive, got {0}")]
    NonPositiveAttractionThreshold(f32),

    /// Release threshold must be greater than zero
    #[error("release threshold must be positive, got {0}")]
    NonPositiveReleaseThreshold(f32),
}

/// Result type for lodestone configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
