// SPDX-License-Identifier: MPL-2.0
//! Stream metadata and format value types.

use std::fmt;
use std::str::FromStr;

/// Rational converting timestamp units to seconds.
///
/// # Example
///
/// ```
/// use playwire::domain::media::TimeBase;
///
/// let tb = TimeBase::new(1, 90_000);
/// assert_eq!(tb.seconds(180_000), 2.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    num: i32,
    den: i32,
}

impl TimeBase {
    /// Microsecond time base used by container-level timestamps.
    pub const MICROSECONDS: TimeBase = TimeBase {
        num: 1,
        den: 1_000_000,
    };

    #[must_use]
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    #[must_use]
    pub fn numerator(self) -> i32 {
        self.num
    }

    #[must_use]
    pub fn denominator(self) -> i32 {
        self.den
    }

    /// Returns `true` when the rational can convert timestamps.
    #[must_use]
    pub fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Converts a timestamp in this time base to seconds.
    ///
    /// An invalid time base yields 0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // i64 pts fit comfortably in f64 for media durations
    pub fn seconds(self, pts: i64) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        pts as f64 * f64::from(self.num) / f64::from(self.den)
    }

    /// Converts seconds to the nearest timestamp in this time base.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // rounded value is range-checked by callers
    pub fn to_pts(self, seconds: f64) -> i64 {
        if !self.is_valid() || !seconds.is_finite() {
            return 0;
        }
        (seconds * f64::from(self.den) / f64::from(self.num)).round() as i64
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// Elementary stream kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => f.write_str("video"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Shape of a video stream as reported by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoParams {
    pub width: u32,
    pub height: u32,
    /// Native pixel format name (e.g. `yuv420p`, `nv12`).
    pub pixel_format: String,
}

/// Shape of an audio stream as reported by the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioParams {
    pub sample_rate: u32,
    pub channels: u16,
    /// Native sample format name (e.g. `fltp`, `s16`).
    pub sample_format: String,
}

/// Kind-specific stream parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamParams {
    Video(VideoParams),
    Audio(AudioParams),
}

/// Per-stream metadata derived once when a source is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Index of the stream inside the container.
    pub index: usize,
    /// Codec short name.
    pub codec: String,
    pub time_base: TimeBase,
    /// Total duration in `time_base` units. Zero or negative for live sources.
    pub duration: i64,
    pub params: StreamParams,
}

impl StreamDescriptor {
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        match self.params {
            StreamParams::Video(_) => MediaKind::Video,
            StreamParams::Audio(_) => MediaKind::Audio,
        }
    }

    /// Returns `true` when the stream has a known, positive duration.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.duration > 0
    }

    /// Total duration in seconds, or 0 for unbounded streams.
    #[must_use]
    pub fn duration_seconds(&self) -> f64 {
        if self.is_bounded() {
            self.time_base.seconds(self.duration)
        } else {
            0.0
        }
    }

    #[must_use]
    pub fn video(&self) -> Option<&VideoParams> {
        match &self.params {
            StreamParams::Video(v) => Some(v),
            StreamParams::Audio(_) => None,
        }
    }

    #[must_use]
    pub fn audio(&self) -> Option<&AudioParams> {
        match &self.params {
            StreamParams::Audio(a) => Some(a),
            StreamParams::Video(_) => None,
        }
    }
}

/// Returns the first descriptor of the given kind.
#[must_use]
pub fn first_of_kind(descriptors: &[StreamDescriptor], kind: MediaKind) -> Option<&StreamDescriptor> {
    descriptors.iter().find(|d| d.kind() == kind)
}

/// Error returned when a format name cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFormat(pub String);

impl fmt::Display for UnknownFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown format '{}'", self.0)
    }
}

impl std::error::Error for UnknownFormat {}

/// Pixel formats the pipeline can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// 8-bit blue, green, red, alpha. Default host format.
    #[default]
    Bgra,
    Rgba,
    Rgb24,
    /// Planar 4:2:0, used as the recording encode format.
    Yuv420p,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for planar ones.
    #[must_use]
    pub fn packed_bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Bgra | PixelFormat::Rgba => Some(4),
            PixelFormat::Rgb24 => Some(3),
            PixelFormat::Yuv420p => None,
        }
    }

    #[must_use]
    pub fn is_packed(self) -> bool {
        self.packed_bytes_per_pixel().is_some()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            PixelFormat::Bgra => "bgra",
            PixelFormat::Rgba => "rgba",
            PixelFormat::Rgb24 => "rgb24",
            PixelFormat::Yuv420p => "yuv420p",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bgra" => Ok(PixelFormat::Bgra),
            "rgba" => Ok(PixelFormat::Rgba),
            "rgb24" | "rgb" => Ok(PixelFormat::Rgb24),
            "yuv420p" => Ok(PixelFormat::Yuv420p),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Audio sample formats. Planar variants are representable so that
/// configuration can name them, but the resampler rejects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SampleFormat {
    U8,
    #[default]
    S16,
    S32,
    F32,
    F64,
    U8Planar,
    S16Planar,
    S32Planar,
    F32Planar,
    F64Planar,
}

impl SampleFormat {
    #[must_use]
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::U8Planar => 1,
            SampleFormat::S16 | SampleFormat::S16Planar => 2,
            SampleFormat::S32 | SampleFormat::S32Planar | SampleFormat::F32 | SampleFormat::F32Planar => 4,
            SampleFormat::F64 | SampleFormat::F64Planar => 8,
        }
    }

    #[must_use]
    pub fn is_planar(self) -> bool {
        matches!(
            self,
            SampleFormat::U8Planar
                | SampleFormat::S16Planar
                | SampleFormat::S32Planar
                | SampleFormat::F32Planar
                | SampleFormat::F64Planar
        )
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16 => "s16",
            SampleFormat::S32 => "s32",
            SampleFormat::F32 => "f32",
            SampleFormat::F64 => "f64",
            SampleFormat::U8Planar => "u8p",
            SampleFormat::S16Planar => "s16p",
            SampleFormat::S32Planar => "s32p",
            SampleFormat::F32Planar => "f32p",
            SampleFormat::F64Planar => "f64p",
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "u8" => Ok(SampleFormat::U8),
            "s16" => Ok(SampleFormat::S16),
            "s32" => Ok(SampleFormat::S32),
            "f32" | "flt" => Ok(SampleFormat::F32),
            "f64" | "dbl" => Ok(SampleFormat::F64),
            "u8p" => Ok(SampleFormat::U8Planar),
            "s16p" => Ok(SampleFormat::S16Planar),
            "s32p" => Ok(SampleFormat::S32Planar),
            "f32p" | "fltp" => Ok(SampleFormat::F32Planar),
            "f64p" | "dblp" => Ok(SampleFormat::F64Planar),
            other => Err(UnknownFormat(other.to_string())),
        }
    }
}

/// Hardware-acceleration preference for video decoding.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HwAccel {
    /// Software decoding only.
    #[default]
    None,
    /// Try the named device type (`cuda`, `vaapi`, `d3d11va`, ...),
    /// falling back to software when it is unavailable.
    Device(String),
}

impl HwAccel {
    /// Parses a preference string. Empty, `none` and `off` disable acceleration.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "off" | "software" => HwAccel::None,
            device => HwAccel::Device(device.to_string()),
        }
    }

    #[must_use]
    pub fn device(&self) -> Option<&str> {
        match self {
            HwAccel::None => None,
            HwAccel::Device(name) => Some(name),
        }
    }
}

impl fmt::Display for HwAccel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HwAccel::None => f.write_str("none"),
            HwAccel::Device(name) => f.write_str(name),
        }
    }
}
