use std::path::Path;

use tracing::{debug, info};
use v4l::capability::Flags;
use v4l::video::Capture;
use v4l::Device;

use crate::capture::v4l2::pixel_format_for;
use crate::capture::PixelFormat;
use crate::error::ResourceError;

/// Capture formats in order of preference. Raw YUV skips the JPEG decode.
const PREFERRED_FORMATS: [PixelFormat; 8] = [
    PixelFormat::Nv12,
    PixelFormat::Nv21,
    PixelFormat::I420,
    PixelFormat::Yuyv,
    PixelFormat::Mjpeg,
    PixelFormat::Rgb24,
    PixelFormat::Bgr24,
    PixelFormat::Gray8,
];

const MAX_VIDEO_NODES: u32 = 10;

// Detected capture device info
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDevice {
    pub path: String,
    pub card: String,
    /// Best format the device offers
    pub format: PixelFormat,
}

/// Every capture device with at least one format the pipeline can convert
pub fn list_devices() -> Vec<FoundDevice> {
    (0..MAX_VIDEO_NODES)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .filter_map(|path| probe(&path))
        .collect()
}

/// Auto-detect best capture device
pub fn auto_detect_device() -> Result<FoundDevice, ResourceError> {
    info!("Auto-detecting capture devices...");

    let found = list_devices()
        .into_iter()
        .min_by_key(|dev| format_rank(dev.format))
        .ok_or(ResourceError::NoDevice)?;

    info!("Found {:?} device: {} - {}", found.format, found.path, found.card);
    Ok(found)
}

fn probe(path: &str) -> Option<FoundDevice> {
    let dev = Device::with_path(path).ok()?;
    let caps = dev.query_caps().ok()?;
    if !caps.capabilities.contains(Flags::VIDEO_CAPTURE) {
        debug!("{} is not a capture device", path);
        return None;
    }

    let format = dev
        .enum_formats()
        .ok()?
        .into_iter()
        .filter_map(|desc| pixel_format_for(desc.fourcc))
        .min_by_key(|&format| format_rank(format))?;

    Some(FoundDevice {
        path: path.to_string(),
        card: caps.card,
        format,
    })
}

fn format_rank(format: PixelFormat) -> usize {
    PREFERRED_FORMATS
        .iter()
        .position(|&f| f == format)
        .unwrap_or(PREFERRED_FORMATS.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_yuv_ranks_ahead_of_mjpeg() {
        assert!(format_rank(PixelFormat::Nv12) < format_rank(PixelFormat::Yuyv));
        assert!(format_rank(PixelFormat::Yuyv) < format_rank(PixelFormat::Mjpeg));
        assert!(format_rank(PixelFormat::Mjpeg) < format_rank(PixelFormat::Gray8));
    }
}
