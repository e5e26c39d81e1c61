// SPDX-License-Identifier: MPL-2.0
//! Still-image export of converted video frames.
//!
//! Frames come out of the converter in a packed host format (BGRA by default).
//! They are reordered into RGBA or RGB here and encoded with the `image` crate.

use crate::domain::media::{PixelFormat, VideoFrameView};
use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use image_rs::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Supported export formats for frame capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// PNG format (lossless, best quality).
    #[default]
    Png,
    /// JPEG format (lossy, smaller file size).
    Jpeg,
    /// WebP format (lossless in the `image` encoder).
    WebP,
}

impl ExportFormat {
    /// Returns the file extension for this format.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
            ExportFormat::WebP => "webp",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            ExportFormat::Png => ImageFormat::Png,
            ExportFormat::Jpeg => ImageFormat::Jpeg,
            ExportFormat::WebP => ImageFormat::WebP,
        }
    }

    /// Returns a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            ExportFormat::Png => "PNG (Lossless)",
            ExportFormat::Jpeg => "JPEG (Lossy)",
            ExportFormat::WebP => "WebP",
        }
    }

    /// Returns all supported formats.
    #[must_use]
    pub fn all() -> &'static [ExportFormat] {
        &[ExportFormat::Png, ExportFormat::Jpeg, ExportFormat::WebP]
    }

    /// Detects format from file extension.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<ExportFormat> {
        match ext.to_lowercase().as_str() {
            "png" => Some(ExportFormat::Png),
            "jpg" | "jpeg" => Some(ExportFormat::Jpeg),
            "webp" => Some(ExportFormat::WebP),
            _ => None,
        }
    }

    /// Detects format from file path extension.
    pub fn from_path(path: &Path) -> Option<ExportFormat> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Reorders a packed frame into an RGBA image, dropping row padding.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for planar frames and [`Error::Image`]
/// if the view is shorter than its declared size.
pub fn to_rgba_image(frame: &VideoFrameView<'_>) -> Result<RgbaImage> {
    let reorder: fn(&[u8], &mut Vec<u8>) = match frame.format {
        PixelFormat::Bgra => |row, out| {
            for px in row.chunks_exact(4) {
                out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        },
        PixelFormat::Rgba => |row, out| out.extend_from_slice(row),
        PixelFormat::Rgb24 => |row, out| {
            for px in row.chunks_exact(3) {
                out.extend_from_slice(&[px[0], px[1], px[2], u8::MAX]);
            }
        },
        PixelFormat::Yuv420p => {
            return Err(Error::UnsupportedFormat(format!(
                "cannot export {} frames",
                frame.format
            )))
        }
    };

    let mut pixels = Vec::with_capacity(frame.width as usize * frame.height as usize * 4);
    for y in 0..frame.height {
        let row = frame
            .row(y)
            .ok_or_else(|| Error::Image(format!("frame row {y} is truncated")))?;
        reorder(row, &mut pixels);
    }
    RgbaImage::from_raw(frame.width, frame.height, pixels)
        .ok_or_else(|| Error::Image("failed to create image buffer from frame data".to_string()))
}

fn to_dynamic_image(frame: &VideoFrameView<'_>, format: ExportFormat) -> Result<DynamicImage> {
    let rgba = DynamicImage::ImageRgba8(to_rgba_image(frame)?);
    // JPEG has no alpha channel
    Ok(if format == ExportFormat::Jpeg {
        DynamicImage::ImageRgb8(rgba.to_rgb8())
    } else {
        rgba
    })
}

/// Encodes a frame into an in-memory image file.
///
/// # Errors
///
/// Returns an error if the frame cannot be converted or encoded.
pub fn encode_frame(frame: &VideoFrameView<'_>, format: ExportFormat) -> Result<Vec<u8>> {
    let image = to_dynamic_image(frame, format)?;
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format.image_format())?;
    Ok(bytes.into_inner())
}

/// Saves a frame to disk.
///
/// The format is determined by the file extension if not specified. Returns
/// the format that was used.
///
/// # Errors
///
/// Returns an error if the image cannot be encoded or written to disk.
pub fn save_frame<P: AsRef<Path>>(
    frame: &VideoFrameView<'_>,
    path: P,
    format: Option<ExportFormat>,
) -> Result<ExportFormat> {
    let path = path.as_ref();
    let format = format
        .or_else(|| ExportFormat::from_path(path))
        .unwrap_or_default();
    let encoded = encode_frame(frame, format)?;
    std::fs::write(path, encoded)?;
    tracing::debug!(path = %path.display(), format = format.extension(), "frame saved");
    Ok(format)
}

fn source_stem(source: &str) -> &str {
    Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("video")
}

/// Generates a default filename for frame export.
///
/// Format: `{video_name}_frame_{position}.{ext}`
#[must_use]
pub fn generate_default_filename(source: &str, position_secs: f64, format: ExportFormat) -> String {
    // Video positions are practically bounded (years of video fit in u64 ms), so cast is safe
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let total_ms = (position_secs.max(0.0) * 1000.0).round() as u64;
    let minutes = total_ms / 60000;
    let seconds = (total_ms % 60000) / 1000;
    let millis = total_ms % 1000;

    format!(
        "{}_frame_{:02}-{:02}-{:03}.{}",
        source_stem(source),
        minutes,
        seconds,
        millis,
        format.extension()
    )
}

/// Generates a default recording path: `{video_name}_rec_{YYYYmmdd-HHMMSS}.mp4` in `dir`.
#[must_use]
pub fn generate_recording_path(dir: &Path, source: &str, started: DateTime<Local>) -> PathBuf {
    dir.join(format!(
        "{}_rec_{}.mp4",
        source_stem(source),
        started.format("%Y%m%d-%H%M%S")
    ))
}
