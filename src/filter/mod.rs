//! Gradient-based edge detection
//!
//! Each call is a pure function of the frame and the [`FilterConfig`] in
//! effect for it:
//!
//! 1. BT.601 grayscale
//! 2. optional binomial pre-blur (quality dependent)
//! 3. 3x3 Sobel magnitude, borders left at zero
//! 4. threshold to a 0/255 mask
//! 5. optional 3x3 closing (quality dependent), borders cleared again
//!
//! The single-channel mask is replicated across RGB for display.

pub mod gray;
pub mod smooth;
pub mod sobel;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::capture::frame::{rgb_len, PixelFormat};
use crate::error::FormatError;

pub use gray::{expand_to_rgb, to_grayscale};
pub use smooth::Blur;
pub use sobel::sobel_magnitude;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    EdgeDetect,
    RawPassthrough,
}

impl Mode {
    pub fn toggled(self) -> Self {
        match self {
            Mode::EdgeDetect => Mode::RawPassthrough,
            Mode::RawPassthrough => Mode::EdgeDetect,
        }
    }
}

/// Trade-off between edge fidelity and processing cost
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityLevel {
    Fast,
    #[default]
    Normal,
    High,
}

/// Concrete knobs behind a [`QualityLevel`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityParams {
    /// Minimum gradient magnitude counted as an edge
    pub threshold: u8,
    pub pre_blur: Option<Blur>,
    /// Close one pixel gaps and thicken edges after thresholding
    pub close_edges: bool,
}

impl QualityLevel {
    pub const ALL: [QualityLevel; 3] = [QualityLevel::Fast, QualityLevel::Normal, QualityLevel::High];

    // Thresholds are chosen so that steps and one pixel lines found at Fast
    // are still found once the pre-blur of the higher tiers flattens them.
    pub fn params(self) -> QualityParams {
        match self {
            QualityLevel::Fast => QualityParams {
                threshold: 128,
                pre_blur: None,
                close_edges: false,
            },
            QualityLevel::Normal => QualityParams {
                threshold: 56,
                pre_blur: Some(Blur::Binomial3),
                close_edges: false,
            },
            QualityLevel::High => QualityParams {
                threshold: 32,
                pre_blur: Some(Blur::Binomial5),
                close_edges: true,
            },
        }
    }

    /// Level from its numeric index: 0 = Fast, 1 = Normal, 2 = High.
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// Per-frame filter settings, swapped as a whole between frames
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub mode: Mode,
    pub quality: QualityLevel,
}

/// Filter a packed RGB24 frame, borrowing the input.
pub fn apply(
    rgb: &[u8],
    width: u32,
    height: u32,
    config: &FilterConfig,
) -> Result<Vec<u8>, FormatError> {
    check_rgb(rgb, width, height)?;
    Ok(match config.mode {
        Mode::RawPassthrough => rgb.to_vec(),
        Mode::EdgeDetect => detect_edges(rgb, width as usize, height as usize, config.quality),
    })
}

/// Filter a packed RGB24 frame, handing the buffer straight back in passthrough.
pub fn apply_owned(
    rgb: Vec<u8>,
    width: u32,
    height: u32,
    config: &FilterConfig,
) -> Result<Vec<u8>, FormatError> {
    check_rgb(&rgb, width, height)?;
    Ok(match config.mode {
        Mode::RawPassthrough => rgb,
        Mode::EdgeDetect => detect_edges(&rgb, width as usize, height as usize, config.quality),
    })
}

/// Single-channel 0/255 edge mask for a grayscale image
pub fn edge_mask(gray: &[u8], width: usize, height: usize, params: QualityParams) -> Vec<u8> {
    let smoothed;
    let source: &[u8] = match params.pre_blur {
        Some(kernel) => {
            smoothed = smooth::blur(gray, width, height, kernel);
            &smoothed
        }
        None => gray,
    };

    let magnitude = sobel::sobel_magnitude(source, width, height);
    let mut mask = sobel::threshold(&magnitude, params.threshold.max(1));

    if params.close_edges {
        mask = smooth::close(&mask, width, height);
        clear_border(&mut mask, width, height);
    }

    mask
}

#[instrument(level = "trace", skip(rgb))]
fn detect_edges(rgb: &[u8], width: usize, height: usize, quality: QualityLevel) -> Vec<u8> {
    let gray = gray::to_grayscale(rgb);
    let mask = edge_mask(&gray, width, height, quality.params());
    gray::expand_to_rgb(&mask)
}

fn clear_border(mask: &mut [u8], width: usize, height: usize) {
    if width == 0 || height == 0 {
        return;
    }
    mask[..width].fill(0);
    mask[(height - 1) * width..].fill(0);
    for row in mask.chunks_exact_mut(width) {
        row[0] = 0;
        row[width - 1] = 0;
    }
}

fn check_rgb(rgb: &[u8], width: u32, height: u32) -> Result<(), FormatError> {
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
    Ok(())
}
