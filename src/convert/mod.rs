//! Conversion of captured frames into packed RGB24

pub mod rotate;
pub mod yuv;

pub use rotate::{rotate_rgb, Rotation};
pub use yuv::{yuyv_to_rgb, ChromaLayout, ColorConverter};

use crate::capture::frame::{rgb_len, Frame, PixelFormat};
use crate::error::FormatError;

/// Decode or convert any supported frame into tightly packed RGB24
pub fn frame_to_rgb(frame: &Frame) -> Result<Vec<u8>, FormatError> {
    let meta = frame.meta();
    let (width, height, stride) = (meta.width, meta.height, meta.stride);
    let data = frame.data();

    match meta.format {
        PixelFormat::Rgb24 => Ok(repack(data, width, height, stride, 3, |px, out| {
            out.copy_from_slice(px)
        })),
        PixelFormat::Bgr24 => Ok(repack(data, width, height, stride, 3, |px, out| {
            out.copy_from_slice(&[px[2], px[1], px[0]])
        })),
        PixelFormat::Gray8 => Ok(repack(data, width, height, stride, 1, |px, out| {
            out.fill(px[0])
        })),
        PixelFormat::Yuyv => yuyv_to_rgb(data, width, height, stride),
        PixelFormat::Nv12 | PixelFormat::Nv21 | PixelFormat::I420 => {
            ColorConverter::for_format(meta.format)
                .ok_or(FormatError::Unsupported(meta.format))?
                .convert(data, width, height, stride)
        }
        PixelFormat::Mjpeg => decode_mjpeg(data, width, height),
    }
}

/// Decode a JPEG frame, checking it against the dimensions the source declared
pub fn decode_mjpeg(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FormatError> {
    let decode_err = |reason: String| FormatError::Decode {
        format: PixelFormat::Mjpeg,
        reason,
    };

    let mut decoder = zune_jpeg::JpegDecoder::new(data);
    let pixels = decoder.decode().map_err(|e| decode_err(e.to_string()))?;

    let decoded = decoder
        .dimensions()
        .ok_or_else(|| decode_err("no frame header".into()))?;
    if decoded != (width as usize, height as usize) {
        return Err(decode_err(format!(
            "image is {}x{}, stream declared {}x{}",
            decoded.0, decoded.1, width, height
        )));
    }
    if pixels.len() != rgb_len(width, height) {
        return Err(decode_err(format!(
            "expected RGB output, decoder produced {} bytes",
            pixels.len()
        )));
    }

    Ok(pixels)
}

/// Strip row padding from a packed format, mapping each pixel into RGB24
fn repack(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    bytes_per_pixel: usize,
    mut map: impl FnMut(&[u8], &mut [u8]),
) -> Vec<u8> {
    let w = width as usize;
    let stride = stride as usize;
    let mut rgb = vec![0u8; rgb_len(width, height)];

    for (y, out_row) in rgb.chunks_exact_mut(w * 3).enumerate() {
        let row = &data[y * stride..y * stride + w * bytes_per_pixel];
        for (px, out) in row.chunks_exact(bytes_per_pixel).zip(out_row.chunks_exact_mut(3)) {
            map(px, out);
        }
    }

    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameMetadata;
    use bytes::Bytes;

    fn frame(data: Vec<u8>, width: u32, height: u32, stride: u32, format: PixelFormat) -> Frame {
        Frame::new(
            Bytes::from(data),
            FrameMetadata {
                sequence: 0,
                width,
                height,
                stride,
                format,
            },
        )
        .unwrap()
    }

    #[test]
    fn padded_rgb_rows_are_compacted() {
        let data = vec![1, 2, 3, 9, 9, 4, 5, 6, 9, 9];
        let rgb = frame_to_rgb(&frame(data, 1, 2, 5, PixelFormat::Rgb24)).unwrap();
        assert_eq!(rgb, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn bgr_channels_are_swapped() {
        let rgb = frame_to_rgb(&frame(vec![10, 20, 30], 1, 1, 3, PixelFormat::Bgr24)).unwrap();
        assert_eq!(rgb, vec![30, 20, 10]);
    }

    #[test]
    fn gray_is_replicated() {
        let rgb = frame_to_rgb(&frame(vec![7, 200], 2, 1, 2, PixelFormat::Gray8)).unwrap();
        assert_eq!(rgb, vec![7, 7, 7, 200, 200, 200]);
    }

    #[test]
    fn garbage_jpeg_is_a_decode_error() {
        let frame = frame(vec![0xde, 0xad, 0xbe, 0xef], 2, 2, 0, PixelFormat::Mjpeg);
        assert!(matches!(
            frame_to_rgb(&frame),
            Err(FormatError::Decode { format: PixelFormat::Mjpeg, .. })
        ));
    }
}
