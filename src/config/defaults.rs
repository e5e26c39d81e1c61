// SPDX-License-Identifier: MPL-2.0
//! Centralized default values for all configuration constants.
//!
//! This module serves as the single source of truth for default values
//! used across the pipeline. Constants are organized by category.
//!
//! # Categories
//!
//! - **Video**: Converter target format
//! - **Audio**: Resampler target format
//! - **Playback**: Pause polling, command queue, speed
//! - **Recording**: Encoder frame rate and preset

// ==========================================================================
// Video Defaults
// ==========================================================================

/// Default converted pixel format.
pub const DEFAULT_PIXEL_FORMAT: &str = "bgra";

/// Largest accepted target dimension in pixels.
pub const MAX_TARGET_DIMENSION: u32 = 8192;

// ==========================================================================
// Audio Defaults
// ==========================================================================

/// Default resampler output rate in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Minimum accepted output rate in Hz.
pub const MIN_SAMPLE_RATE: u32 = 8_000;

/// Maximum accepted output rate in Hz.
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Default output channel count. Anything above 2 is downmixed to stereo.
pub const DEFAULT_CHANNELS: u16 = 2;

/// Default resampler output sample format.
pub const DEFAULT_SAMPLE_FORMAT: &str = "s16";

// ==========================================================================
// Playback Defaults
// ==========================================================================

/// Sleep between checks while paused on a bounded source (milliseconds).
pub const DEFAULT_PAUSE_POLL_MS: u64 = 10;

/// Minimum pause poll interval (milliseconds).
pub const MIN_PAUSE_POLL_MS: u64 = 1;

/// Maximum pause poll interval (milliseconds).
pub const MAX_PAUSE_POLL_MS: u64 = 100;

/// Default capacity of the control command queue.
pub const DEFAULT_COMMAND_QUEUE_CAPACITY: usize = 32;

/// Minimum command queue capacity.
pub const MIN_COMMAND_QUEUE_CAPACITY: usize = 4;

/// Default hardware acceleration preference.
pub const DEFAULT_HW_ACCEL: &str = "none";

// ==========================================================================
// Recording Defaults
// ==========================================================================

/// Default encoder frame rate.
pub const DEFAULT_RECORDING_FPS: u32 = 25;

/// Minimum encoder frame rate.
pub const MIN_RECORDING_FPS: u32 = 1;

/// Maximum encoder frame rate.
pub const MAX_RECORDING_FPS: u32 = 120;

/// Default distance between keyframes, in frames (one second at 25 fps).
pub const DEFAULT_KEYFRAME_INTERVAL: u32 = 25;

/// Minimum distance between keyframes (every frame is a keyframe).
pub const MIN_KEYFRAME_INTERVAL: u32 = 1;

/// Maximum distance between keyframes.
pub const MAX_KEYFRAME_INTERVAL: u32 = 600;

/// Default encoder speed preset.
pub const DEFAULT_RECORDING_PRESET: &str = "ultrafast";

// ==========================================================================
// Capture Defaults
// ==========================================================================

/// Default still image format for captured frames.
pub const DEFAULT_CAPTURE_FORMAT: &str = "png";

// ==========================================================================
// Compile-time Validation
// ==========================================================================

const _: () = {
    // Audio validation
    assert!(MIN_SAMPLE_RATE > 0);
    assert!(DEFAULT_SAMPLE_RATE >= MIN_SAMPLE_RATE);
    assert!(DEFAULT_SAMPLE_RATE <= MAX_SAMPLE_RATE);
    assert!(DEFAULT_CHANNELS >= 1 && DEFAULT_CHANNELS <= 2);

    // Playback validation
    assert!(MIN_PAUSE_POLL_MS > 0);
    assert!(DEFAULT_PAUSE_POLL_MS >= MIN_PAUSE_POLL_MS);
    assert!(DEFAULT_PAUSE_POLL_MS <= MAX_PAUSE_POLL_MS);
    assert!(DEFAULT_COMMAND_QUEUE_CAPACITY >= MIN_COMMAND_QUEUE_CAPACITY);

    // Recording validation
    assert!(MIN_RECORDING_FPS > 0);
    assert!(DEFAULT_RECORDING_FPS >= MIN_RECORDING_FPS);
    assert!(DEFAULT_RECORDING_FPS <= MAX_RECORDING_FPS);
    assert!(MIN_KEYFRAME_INTERVAL > 0);
    assert!(DEFAULT_KEYFRAME_INTERVAL >= MIN_KEYFRAME_INTERVAL);
    assert!(DEFAULT_KEYFRAME_INTERVAL <= MAX_KEYFRAME_INTERVAL);
};
