//! YUV to packed RGB24 conversion
//!
//! BT.601 limited-range coefficients in 8.8 fixed point:
//!
//! ```text
//! R = 1.164 (Y - 16)                 + 1.596 (V - 128)
//! G = 1.164 (Y - 16) - 0.391 (U - 128) - 0.813 (V - 128)
//! B = 1.164 (Y - 16) + 2.018 (U - 128)
//! ```

use crate::capture::frame::{rgb_len, PixelFormat};
use crate::error::FormatError;

/// Arrangement of the chroma samples following a 4:2:0 luma plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaLayout {
    /// Separate U then V planes (I420 / YU12)
    Planar,
    /// Interleaved U,V pairs (NV12)
    UvInterleaved,
    /// Interleaved V,U pairs (NV21)
    VuInterleaved,
}

impl ChromaLayout {
    pub fn format(self) -> PixelFormat {
        match self {
            ChromaLayout::Planar => PixelFormat::I420,
            ChromaLayout::UvInterleaved => PixelFormat::Nv12,
            ChromaLayout::VuInterleaved => PixelFormat::Nv21,
        }
    }
}

/// Converts 4:2:0 frames with padded luma rows into tightly packed RGB24
#[derive(Debug, Clone, Copy)]
pub struct ColorConverter {
    layout: ChromaLayout,
}

impl ColorConverter {
    pub fn new(layout: ChromaLayout) -> Self {
        Self { layout }
    }

    /// Converter for a 4:2:0 pixel format, `None` for anything else.
    pub fn for_format(format: PixelFormat) -> Option<Self> {
        let layout = match format {
            PixelFormat::I420 => ChromaLayout::Planar,
            PixelFormat::Nv12 => ChromaLayout::UvInterleaved,
            PixelFormat::Nv21 => ChromaLayout::VuInterleaved,
            _ => return None,
        };
        Some(Self::new(layout))
    }

    /// Convert one frame. The luma plane occupies the first
    /// `row_stride * height` bytes, chroma follows at half resolution.
    ///
    /// Trailing bytes past the last chroma row are ignored; a short buffer is
    /// a [`FormatError`].
    pub fn convert(
        &self,
        yuv: &[u8],
        width: u32,
        height: u32,
        row_stride: u32,
    ) -> Result<Vec<u8>, FormatError> {
        let mut rgb = Vec::new();
        self.convert_into(yuv, width, height, row_stride, &mut rgb)?;
        Ok(rgb)
    }

    /// Like [`convert`](Self::convert), reusing `rgb`'s allocation.
    pub fn convert_into(
        &self,
        yuv: &[u8],
        width: u32,
        height: u32,
        row_stride: u32,
        rgb: &mut Vec<u8>,
    ) -> Result<(), FormatError> {
        let format = self.layout.format();
        check_input(yuv, width, height, row_stride, format)?;

        let w = width as usize;
        let h = height as usize;
        let stride = row_stride as usize;
        let chroma_stride = format.chroma_stride(row_stride, width);
        let chroma_rows = h.div_ceil(2);
        let (luma, chroma) = yuv.split_at(stride * h);

        rgb.clear();
        rgb.resize(rgb_len(width, height), 0);

        for (y, out_row) in rgb.chunks_exact_mut(w * 3).enumerate() {
            let luma_row = &luma[y * stride..y * stride + w];
            let cy = y / 2;

            match self.layout {
                ChromaLayout::Planar => {
                    let u_row = &chroma[cy * chroma_stride..];
                    let v_row = &chroma[(chroma_rows + cy) * chroma_stride..];
                    for (x, (px, &luma_px)) in out_row.chunks_exact_mut(3).zip(luma_row).enumerate() {
                        px.copy_from_slice(&yuv_to_rgb(luma_px, u_row[x / 2], v_row[x / 2]));
                    }
                }
                ChromaLayout::UvInterleaved | ChromaLayout::VuInterleaved => {
                    let pairs = &chroma[cy * chroma_stride..];
                    let swap = self.layout == ChromaLayout::VuInterleaved;
                    for (x, (px, &luma_px)) in out_row.chunks_exact_mut(3).zip(luma_row).enumerate() {
                        let (first, second) = (pairs[x / 2 * 2], pairs[x / 2 * 2 + 1]);
                        let (u, v) = if swap { (second, first) } else { (first, second) };
                        px.copy_from_slice(&yuv_to_rgb(luma_px, u, v));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Convert packed YUYV 4:2:2 (Y0 U Y1 V) rows into RGB24
pub fn yuyv_to_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    row_stride: u32,
) -> Result<Vec<u8>, FormatError> {
    // A macropixel carries two pixels, so rows always hold an even count
    if width % 2 != 0 {
        return Err(FormatError::InvalidDimensions { width, height });
    }
    check_input(data, width, height, row_stride, PixelFormat::Yuyv)?;

    let w = width as usize;
    let stride = row_stride as usize;
    let mut rgb = vec![0u8; rgb_len(width, height)];

    for (y, out_row) in rgb.chunks_exact_mut(w * 3).enumerate() {
        let row = &data[y * stride..y * stride + w * 2];
        for (macro_px, out) in row.chunks_exact(4).zip(out_row.chunks_exact_mut(6)) {
            let (y0, u, y1, v) = (macro_px[0], macro_px[1], macro_px[2], macro_px[3]);
            out[..3].copy_from_slice(&yuv_to_rgb(y0, u, v));
            out[3..].copy_from_slice(&yuv_to_rgb(y1, u, v));
        }
    }

    Ok(rgb)
}

/// BT.601 limited-range YUV to RGB for a single sample
#[inline]
pub fn yuv_to_rgb(y: u8, u: u8, v: u8) -> [u8; 3] {
    let c = (y as i32 - 16) * 298;
    let d = u as i32 - 128;
    let e = v as i32 - 128;

    let r = (c + 409 * e + 128) >> 8;
    let g = (c - 100 * d - 208 * e + 128) >> 8;
    let b = (c + 516 * d + 128) >> 8;

    [clamp_u8(r), clamp_u8(g), clamp_u8(b)]
}

#[inline]
fn clamp_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

fn check_input(
    data: &[u8],
    width: u32,
    height: u32,
    row_stride: u32,
    format: PixelFormat,
) -> Result<(), FormatError> {
    if width == 0 || height == 0 {
        return Err(FormatError::InvalidDimensions { width, height });
    }
    if row_stride < format.min_stride(width) {
        return Err(FormatError::StrideTooSmall {
            stride: row_stride,
            width,
        });
    }
    let expected = format.min_payload_len(width, height, row_stride);
    if data.len() < expected {
        return Err(FormatError::PayloadSize {
            format,
            width,
            height,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}
