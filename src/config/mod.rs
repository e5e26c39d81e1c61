// SPDX-License-Identifier: MPL-2.0
//! This module handles the pipeline configuration, including loading and saving
//! it to a `settings.toml` file.
//!
//! # Path Resolution Order
//!
//! 1. **Explicit path** - [`load_from_path`] / [`save_to_path`]
//! 2. **Environment variable** (`PLAYWIRE_CONFIG_DIR`)
//! 3. **Platform default** - via `dirs` crate
//!
//! # Examples
//!
//! ```no_run
//! use playwire::config::{self, PlayerConfig};
//!
//! let mut config = config::load().unwrap_or_default();
//! config.audio.sample_rate = 48_000;
//! config::save(&config).expect("Failed to save config");
//! ```

pub mod defaults;

pub use defaults::*;

use crate::domain::media::{AudioTarget, HwAccel, PixelFormat, RecordingSettings, SampleFormat, VideoTarget};
use crate::domain::playback::PlaybackSpeed;
use crate::error::{Error, Result};
use crate::media::frame_export::ExportFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "settings.toml";
const APP_NAME: &str = "Playwire";

/// Environment variable to override the config directory.
pub const ENV_CONFIG_DIR: &str = "PLAYWIRE_CONFIG_DIR";

/// Converter target section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Output width, 0 keeps the source width.
    pub width: u32,
    /// Output height, 0 keeps the source height.
    pub height: u32,
    pub pixel_format: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
        }
    }
}

/// Resampler target section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            sample_format: DEFAULT_SAMPLE_FORMAT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub speed: f64,
    pub pause_poll_ms: u64,
    pub command_queue_capacity: usize,
    /// `none` or a device type name such as `cuda` or `vaapi`.
    pub hw_accel: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: crate::domain::playback::NORMAL_SPEED,
            pause_poll_ms: DEFAULT_PAUSE_POLL_MS,
            command_queue_capacity: DEFAULT_COMMAND_QUEUE_CAPACITY,
            hw_accel: DEFAULT_HW_ACCEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub frame_rate: u32,
    /// Frames between forced keyframes; bounds seek granularity in recordings.
    pub keyframe_interval: u32,
    pub preset: String,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            frame_rate: DEFAULT_RECORDING_FPS,
            keyframe_interval: DEFAULT_KEYFRAME_INTERVAL,
            preset: DEFAULT_RECORDING_PRESET.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// `png`, `jpg` or `webp`.
    pub format: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_CAPTURE_FORMAT.to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    pub video: VideoConfig,
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub recording: RecordingConfig,
    pub capture: CaptureConfig,
}

impl PlayerConfig {
    /// Builds the converter target, rejecting unknown or planar pixel formats.
    pub fn video_target(&self) -> Result<VideoTarget> {
        let format: PixelFormat = self
            .video
            .pixel_format
            .parse()
            .map_err(|e| Error::Config(format!("video.pixel_format: {e}")))?;
        if !format.is_packed() {
            return Err(Error::UnsupportedFormat(format!(
                "video target must be a packed format, got {format}"
            )));
        }
        if self.video.width > MAX_TARGET_DIMENSION || self.video.height > MAX_TARGET_DIMENSION {
            return Err(Error::Config(format!(
                "video target exceeds {MAX_TARGET_DIMENSION} pixels"
            )));
        }
        Ok(VideoTarget {
            width: self.video.width,
            height: self.video.height,
            format,
        })
    }

    /// Builds the resampler target.
    ///
    /// Planar formats parse successfully here; the resampler is the one that
    /// refuses them.
    pub fn audio_target(&self) -> Result<AudioTarget> {
        let format: SampleFormat = self
            .audio
            .sample_format
            .parse()
            .map_err(|e| Error::Config(format!("audio.sample_format: {e}")))?;
        Ok(AudioTarget {
            sample_rate: self.audio.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE),
            channels: self.audio.channels.clamp(1, 2),
            format,
        })
    }

    /// Initial playback speed; invalid values fall back to normal speed.
    #[must_use]
    pub fn playback_speed(&self) -> PlaybackSpeed {
        PlaybackSpeed::new(self.playback.speed)
    }

    #[must_use]
    pub fn hw_accel(&self) -> HwAccel {
        HwAccel::parse(&self.playback.hw_accel)
    }

    #[must_use]
    pub fn pause_poll_interval(&self) -> Duration {
        Duration::from_millis(
            self.playback
                .pause_poll_ms
                .clamp(MIN_PAUSE_POLL_MS, MAX_PAUSE_POLL_MS),
        )
    }

    #[must_use]
    pub fn command_queue_capacity(&self) -> usize {
        self.playback
            .command_queue_capacity
            .max(MIN_COMMAND_QUEUE_CAPACITY)
    }

    #[must_use]
    pub fn recording_settings(&self) -> RecordingSettings {
        RecordingSettings {
            frame_rate: self
                .recording
                .frame_rate
                .clamp(MIN_RECORDING_FPS, MAX_RECORDING_FPS),
            keyframe_interval: self
                .recording
                .keyframe_interval
                .clamp(MIN_KEYFRAME_INTERVAL, MAX_KEYFRAME_INTERVAL),
            preset: self.recording.preset.clone(),
        }
    }

    /// Capture format, falling back to PNG for unknown names.
    #[must_use]
    pub fn capture_format(&self) -> ExportFormat {
        ExportFormat::from_extension(&self.capture.format).unwrap_or_default()
    }
}

/// Returns the configuration directory, honouring [`ENV_CONFIG_DIR`].
#[must_use]
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(ENV_CONFIG_DIR).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|mut path| {
        path.push(APP_NAME);
        path
    })
}

fn get_default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

pub fn load() -> Result<PlayerConfig> {
    if let Some(path) = get_default_config_path() {
        if path.exists() {
            return load_from_path(&path);
        }
    }
    Ok(PlayerConfig::default())
}

pub fn save(config: &PlayerConfig) -> Result<()> {
    if let Some(path) = get_default_config_path() {
        return save_to_path(config, &path);
    }
    Ok(())
}

/// Loads a configuration file. Invalid TOML falls back to defaults.
pub fn load_from_path(path: &Path) -> Result<PlayerConfig> {
    let content = fs::read_to_string(path)?;
    match toml::from_str(&content) {
        Ok(config) => Ok(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "invalid config, using defaults");
            Ok(PlayerConfig::default())
        }
    }
}

pub fn save_to_path(config: &PlayerConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    fs::write(path, content)?;
    Ok(())
}
