/// Reduce packed RGB24 to one luminance byte per pixel.
///
/// `Y = 0.299 R + 0.587 G + 0.114 B`, rounded, with the weights scaled by
/// 1000 so the hot loop stays in integer math.
pub fn to_grayscale(rgb: &[u8]) -> Vec<u8> {
    rgb.chunks_exact(3)
        .map(|px| {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
        })
        .collect()
}

/// Replicate a single-channel map across R, G and B.
pub fn expand_to_rgb(gray: &[u8]) -> Vec<u8> {
    gray.iter().flat_map(|&v| [v, v, v]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primaries_use_bt601_weights() {
        let gray = to_grayscale(&[255, 0, 0, 0, 255, 0, 0, 0, 255]);
        assert_eq!(gray, vec![76, 150, 29]);
    }

    #[test]
    fn white_stays_in_range() {
        assert_eq!(to_grayscale(&[255, 255, 255]), vec![255]);
        assert_eq!(to_grayscale(&[128, 128, 128]), vec![128]);
    }

    #[test]
    fn expansion_replicates_channels() {
        assert_eq!(expand_to_rgb(&[0, 255]), vec![0, 0, 0, 255, 255, 255]);
    }
}
