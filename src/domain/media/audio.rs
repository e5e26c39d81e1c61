// SPDX-License-Identifier: MPL-2.0
//! Output sizing rules for audio resampling.
//!
//! A resampler keeps delay state across calls, so one input frame can produce
//! more output samples than a plain rate ratio suggests. Buffers are sized for
//! the worst case and never shrink.

use super::types::SampleFormat;

/// Worst-case number of output samples per channel for one conversion.
///
/// Computes `ceil((delay + input) * dst_rate / src_rate)`, where `delay` is the
/// resampler's buffered input expressed in source-rate samples.
///
/// # Example
///
/// ```
/// use playwire::domain::media::max_output_samples;
///
/// // 1024 samples at 48 kHz with 16 samples of delay, resampled to 44.1 kHz
/// assert_eq!(max_output_samples(16, 1024, 48_000, 44_100), 956);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn max_output_samples(delay: i64, input_samples: usize, src_rate: u32, dst_rate: u32) -> usize {
    if src_rate == 0 {
        return 0;
    }
    let total = i128::from(delay.max(0)) + input_samples as i128;
    let src = i128::from(src_rate);
    let scaled = (total * i128::from(dst_rate) + src - 1) / src;
    scaled.clamp(0, usize::MAX as i128) as usize
}

/// Byte length of an interleaved buffer holding `samples` per channel.
#[must_use]
pub fn interleaved_byte_len(samples: usize, channels: u16, format: SampleFormat) -> usize {
    samples
        .saturating_mul(usize::from(channels))
        .saturating_mul(format.bytes_per_sample())
}
