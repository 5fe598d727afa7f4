use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::error::FormatError;

/// Raw frame as delivered by a capture source.
///
/// The payload is validated against the metadata on construction, so every
/// `Frame` in circulation is large enough for its declared shape.
#[derive(Clone)]
pub struct Frame {
    /// Immutable frame data - can be shared across threads without copying
    data: Bytes,

    meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMetadata {
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    /// Bytes per row of the first plane. Ignored for compressed formats.
    pub stride: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Gray8,
    /// Packed 4:2:2, Y0 U Y1 V
    Yuyv,
    /// Luma plane followed by interleaved U/V at half resolution
    Nv12,
    /// Luma plane followed by interleaved V/U at half resolution
    Nv21,
    /// Luma plane followed by separate U and V planes at half resolution
    I420,
    Mjpeg,
}

impl PixelFormat {
    /// Bytes per pixel for packed formats, `None` for planar and compressed ones.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => Some(3),
            PixelFormat::Gray8 => Some(1),
            PixelFormat::Yuyv => Some(2),
            PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 | PixelFormat::Mjpeg => None,
        }
    }

    pub fn is_yuv420(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420)
    }

    /// Smallest stride a `width` pixel row can have in this format.
    pub fn min_stride(self, width: u32) -> u32 {
        match self.bytes_per_pixel() {
            Some(bpp) => width * bpp as u32,
            None if self.is_yuv420() => width,
            None => 0,
        }
    }

    /// Row stride of the chroma plane(s) for 4:2:0 formats.
    ///
    /// Separate planes are half the luma stride, rounded up. Interleaved
    /// planes reuse the luma stride but always fit both samples of the last
    /// chroma column.
    pub fn chroma_stride(self, stride: u32, width: u32) -> usize {
        let chroma_width = width.div_ceil(2) as usize;
        match self {
            PixelFormat::I420 => (stride as usize).div_ceil(2),
            PixelFormat::Nv12 | PixelFormat::Nv21 => (stride as usize).max(2 * chroma_width),
            _ => 0,
        }
    }

    /// Minimum payload length for a frame of this format.
    pub fn min_payload_len(self, width: u32, height: u32, stride: u32) -> usize {
        let rows = height as usize;
        let stride = stride as usize;
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 | PixelFormat::Gray8 | PixelFormat::Yuyv => {
                stride * rows
            }
            PixelFormat::Nv12 | PixelFormat::Nv21 => {
                let chroma_rows = rows.div_ceil(2);
                stride * rows + self.chroma_stride(stride as u32, width) * chroma_rows
            }
            PixelFormat::I420 => {
                let chroma_rows = rows.div_ceil(2);
                stride * rows + 2 * self.chroma_stride(stride as u32, width) * chroma_rows
            }
            // Anything but an empty buffer may hold a JPEG
            PixelFormat::Mjpeg => 1,
        }
    }
}

impl Frame {
    /// Wrap a payload, rejecting one that cannot hold the declared frame.
    pub fn new(data: Bytes, meta: FrameMetadata) -> Result<Self, FormatError> {
        check_shape(&meta, data.len())?;
        Ok(Self {
            data,
            meta: Arc::new(meta),
            timestamp: Instant::now(),
        })
    }

    /// Tightly packed frame: stride equals the minimum row length.
    pub fn packed(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        format: PixelFormat,
        sequence: u64,
    ) -> Result<Self, FormatError> {
        Self::new(
            data.into(),
            FrameMetadata {
                sequence,
                width,
                height,
                stride: format.min_stride(width),
                format,
            },
        )
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn meta(&self) -> &FrameMetadata {
        &self.meta
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    /// Same payload under new metadata, stamped now.
    ///
    /// Shares the pixel buffer with `self`; the metadata is validated again.
    pub fn restamped(&self, meta: FrameMetadata) -> Result<Self, FormatError> {
        Self::new(self.data.clone(), meta)
    }
}

fn check_shape(meta: &FrameMetadata, actual: usize) -> Result<(), FormatError> {
    if meta.width == 0 || meta.height == 0 {
        return Err(FormatError::InvalidDimensions {
            width: meta.width,
            height: meta.height,
        });
    }

    let min_stride = meta.format.min_stride(meta.width);
    if meta.stride < min_stride {
        return Err(FormatError::StrideTooSmall {
            stride: meta.stride,
            width: meta.width,
        });
    }

    let expected = meta
        .format
        .min_payload_len(meta.width, meta.height, meta.stride);
    if actual < expected {
        return Err(FormatError::PayloadSize {
            format: meta.format,
            width: meta.width,
            height: meta.height,
            expected,
            actual,
        });
    }

    Ok(())
}

/// Processed, tightly packed RGB24 frame ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    rgb: Vec<u8>,
    width: u32,
    height: u32,
    sequence: u64,
    captured_at: Instant,
}

impl DisplayFrame {
    pub fn new(
        rgb: Vec<u8>,
        width: u32,
        height: u32,
        sequence: u64,
        captured_at: Instant,
    ) -> Result<Self, FormatError> {
        if width == 0 || height == 0 {
            return Err(FormatError::InvalidDimensions { width, height });
        }
        let expected = rgb_len(width, height);
        if rgb.len() != expected {
            return Err(FormatError::PayloadSize {
                format: PixelFormat::Rgb24,
                width,
                height,
                expected,
                actual: rgb.len(),
            });
        }
        Ok(Self {
            rgb,
            width,
            height,
            sequence,
            captured_at,
        })
    }

    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }
}

/// Byte length of a tightly packed RGB24 image.
pub fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nv12_with_padded_rows_needs_padded_planes() {
        // 4x2 image, 8 byte rows: 16 luma + one 8 byte chroma row
        assert_eq!(PixelFormat::Nv12.min_payload_len(4, 2, 8), 24);
        assert_eq!(PixelFormat::I420.min_payload_len(4, 2, 8), 16 + 2 * 4);
    }

    #[test]
    fn odd_dimensions_round_chroma_up() {
        // 3x3 luma, 2x2 chroma samples
        assert_eq!(PixelFormat::I420.min_payload_len(3, 3, 3), 9 + 2 * 2 * 2);
        assert_eq!(PixelFormat::Nv21.min_payload_len(3, 3, 3), 9 + 4 * 2);
    }

    #[test]
    fn short_payload_is_rejected() {
        let err = Frame::packed(vec![0u8; 11], 2, 2, PixelFormat::Rgb24, 0).err();
        assert_eq!(
            err,
            Some(FormatError::PayloadSize {
                format: PixelFormat::Rgb24,
                width: 2,
                height: 2,
                expected: 12,
                actual: 11,
            })
        );
    }

    #[test]
    fn narrow_stride_is_rejected() {
        let meta = FrameMetadata {
            sequence: 0,
            width: 4,
            height: 4,
            stride: 3,
            format: PixelFormat::Nv12,
        };
        assert!(matches!(
            Frame::new(Bytes::from(vec![0u8; 64]), meta),
            Err(FormatError::StrideTooSmall { stride: 3, width: 4 })
        ));
    }

    #[test]
    fn zero_sized_frames_are_rejected() {
        assert!(matches!(
            Frame::packed(Vec::new(), 0, 4, PixelFormat::Gray8, 0),
            Err(FormatError::InvalidDimensions { .. })
        ));
        assert!(DisplayFrame::new(Vec::new(), 4, 0, 0, Instant::now()).is_err());
    }

    #[test]
    fn display_frame_requires_exact_rgb_length() {
        assert!(DisplayFrame::new(vec![0; 12], 2, 2, 1, Instant::now()).is_ok());
        assert!(DisplayFrame::new(vec![0; 13], 2, 2, 1, Instant::now()).is_err());
    }
}
