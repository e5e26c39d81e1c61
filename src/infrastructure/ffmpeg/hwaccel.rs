// SPDX-License-Identifier: MPL-2.0
//! Hardware decode device setup and device-to-host frame transfer.
//!
//! Device creation is best effort: any failure is logged and the decoder
//! falls back to software decoding.

use std::ffi::CString;
use std::ptr;

use ffmpeg_next::ffi;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::frame;

use crate::error::{Error, Result};

/// `AV_PIX_FMT_FLAG_HWACCEL`: pixel data lives in device memory.
const PIX_FMT_FLAG_HWACCEL: u64 = 1 << 3;

/// Attaches a hardware device of type `device_name` to an unopened codec context.
///
/// Returns `true` when the device was created. The codec context takes
/// ownership of the device reference.
pub(super) fn attach_device(context: &mut ffmpeg_next::codec::context::Context, device_name: &str) -> bool {
    let Ok(name) = CString::new(device_name) else {
        tracing::warn!(device = device_name, "invalid hardware device name");
        return false;
    };

    // SAFETY: `name` outlives the call; FFmpeg only reads it.
    let device_type = unsafe { ffi::av_hwdevice_find_type_by_name(name.as_ptr()) };
    if device_type == ffi::AVHWDeviceType::AV_HWDEVICE_TYPE_NONE {
        tracing::warn!(device = device_name, "unknown hardware device type, using software decoding");
        return false;
    }

    let mut device: *mut ffi::AVBufferRef = ptr::null_mut();
    // SAFETY: `device` is a valid out-pointer; null device string and options
    // select the default device for the type.
    let ret = unsafe {
        ffi::av_hwdevice_ctx_create(&mut device, device_type, ptr::null(), ptr::null_mut(), 0)
    };
    if ret < 0 || device.is_null() {
        tracing::warn!(
            device = device_name,
            error = %ffmpeg_next::Error::from(ret),
            "hardware device unavailable, using software decoding"
        );
        return false;
    }

    // SAFETY: the context is not opened yet, so FFmpeg has not read
    // `hw_device_ctx`; the reference we own moves into the context and is
    // released by `avcodec_free_context`.
    unsafe {
        (*context.as_mut_ptr()).hw_device_ctx = device;
    }
    tracing::info!(device = device_name, "hardware decoding enabled");
    true
}

/// Checks the format descriptor's capability flag rather than a list of formats.
pub(super) fn is_hardware_format(format: Pixel) -> bool {
    let raw: ffi::AVPixelFormat = format.into();
    // SAFETY: av_pix_fmt_desc_get returns null or a pointer to static data.
    unsafe {
        let descriptor = ffi::av_pix_fmt_desc_get(raw);
        !descriptor.is_null() && ((*descriptor).flags & PIX_FMT_FLAG_HWACCEL) != 0
    }
}

/// Copies a device frame into a fresh host frame.
pub(super) fn transfer_to_host(source: &frame::Video) -> Result<frame::Video> {
    let mut host = frame::Video::empty();
    // SAFETY: both pointers are valid frames; FFmpeg allocates the host buffers.
    let ret = unsafe { ffi::av_hwframe_transfer_data(host.as_mut_ptr(), source.as_ptr(), 0) };
    if ret < 0 {
        return Err(Error::Convert(format!(
            "hardware frame transfer failed: {}",
            ffmpeg_next::Error::from(ret)
        )));
    }
    host.set_pts(source.pts());
    Ok(host)
}
