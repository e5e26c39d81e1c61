// SPDX-License-Identifier: MPL-2.0
//! Time unit conversion utilities for playback.
//!
//! Provides conversions between stream timestamps, seconds and the
//! microsecond units container-level seeks use.
//!
//! # Constants
//!
//! - `MICROS_PER_SECOND`: 1,000,000 (f64 for calculations)

use crate::domain::media::TimeBase;

/// Microseconds per second as f64 for calculations.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Converts seconds to microseconds.
///
/// # Examples
///
/// ```
/// use playwire::video_player::time_units::secs_to_micros;
///
/// assert_eq!(secs_to_micros(1.0), 1_000_000);
/// assert_eq!(secs_to_micros(0.5), 500_000);
/// ```
#[inline]
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn secs_to_micros(secs: f64) -> i64 {
    (secs * MICROS_PER_SECOND).round() as i64
}

/// Converts a stream timestamp to microseconds.
///
/// # Examples
///
/// ```
/// use playwire::domain::media::TimeBase;
/// use playwire::video_player::time_units::pts_to_micros;
///
/// assert_eq!(pts_to_micros(90_000, TimeBase::new(1, 90_000)), 1_000_000);
/// ```
#[inline]
#[must_use]
pub fn pts_to_micros(pts: i64, time_base: TimeBase) -> i64 {
    secs_to_micros(time_base.seconds(pts))
}

/// Seek target for a normalized position: `duration * fraction`, rounded.
///
/// # Examples
///
/// ```
/// use playwire::video_player::time_units::fraction_to_pts;
///
/// assert_eq!(fraction_to_pts(128_000, 0.5), 64_000);
/// assert_eq!(fraction_to_pts(128_000, 2.0), 128_000);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn fraction_to_pts(duration: i64, fraction: f64) -> i64 {
    if duration <= 0 || !fraction.is_finite() {
        return 0;
    }
    (duration as f64 * fraction.clamp(0.0, 1.0)).round() as i64
}

/// Stream duration, falling back to the container duration (microseconds)
/// rescaled into the stream time base. Unknown durations come back as 0.
///
/// # Examples
///
/// ```
/// use playwire::domain::media::TimeBase;
/// use playwire::video_player::time_units::effective_duration;
///
/// let tb = TimeBase::new(1, 1000);
/// assert_eq!(effective_duration(5_000, 0, tb), 5_000);
/// assert_eq!(effective_duration(i64::MIN, 2_000_000, tb), 2_000);
/// assert_eq!(effective_duration(i64::MIN, i64::MIN, tb), 0);
/// ```
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn effective_duration(stream_duration: i64, container_micros: i64, time_base: TimeBase) -> i64 {
    if stream_duration > 0 {
        return stream_duration;
    }
    if container_micros > 0 && time_base.is_valid() {
        return time_base.to_pts(container_micros as f64 / MICROS_PER_SECOND);
    }
    0
}
