// SPDX-License-Identifier: MPL-2.0
//! Playback newtypes.
//!
//! Type-safe wrappers for control values, validated once at the control
//! surface so the pipeline never sees an out-of-range speed or position.

// =============================================================================
// PlaybackSpeed
// =============================================================================

/// Normal playback speed.
pub const NORMAL_SPEED: f64 = 1.0;

/// Playback speed multiplier, guaranteed finite and positive.
///
/// # Example
///
/// ```
/// use playwire::domain::playback::PlaybackSpeed;
///
/// assert_eq!(PlaybackSpeed::new(16.0).value(), 16.0);
/// assert!(PlaybackSpeed::try_new(0.0).is_none());
/// assert_eq!(PlaybackSpeed::try_new(0.05).map(PlaybackSpeed::value), Some(0.05));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSpeed(f64);

impl PlaybackSpeed {
    /// Creates a playback speed from a trusted value, such as a config file.
    ///
    /// Zero, negative and non-finite input falls back to normal speed.
    #[must_use]
    pub fn new(speed: f64) -> Self {
        Self::try_new(speed).unwrap_or_default()
    }

    /// Validates a caller-supplied multiplier.
    ///
    /// Returns `None` for zero, negative and non-finite values. Every other
    /// value is kept as given.
    #[must_use]
    pub fn try_new(speed: f64) -> Option<Self> {
        (speed.is_finite() && speed > 0.0).then_some(Self(speed))
    }

    /// Returns the speed value as f64.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }

    /// Returns true if this is normal (1.0x) speed.
    #[must_use]
    pub fn is_normal(self) -> bool {
        (self.0 - NORMAL_SPEED).abs() < 0.001
    }
}

impl Default for PlaybackSpeed {
    fn default() -> Self {
        Self(NORMAL_SPEED)
    }
}

// =============================================================================
// SeekFraction
// =============================================================================

/// Normalized position in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct SeekFraction(f64);

impl SeekFraction {
    /// Accepts any finite value and clamps it into `[0, 1]`.
    #[must_use]
    pub fn try_new(fraction: f64) -> Option<Self> {
        fraction
            .is_finite()
            .then(|| Self(fraction.clamp(0.0, 1.0)))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}
