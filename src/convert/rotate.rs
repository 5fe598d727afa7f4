use serde::{Deserialize, Serialize};

/// Clockwise quarter turns applied after color conversion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Output dimensions for a `width` x `height` input.
    pub fn dimensions(self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Rotation::None | Rotation::Cw180 => (width, height),
            Rotation::Cw90 | Rotation::Cw270 => (height, width),
        }
    }
}

/// Rotate a packed RGB24 image, returning the pixels and the new dimensions.
///
/// `rgb` must hold exactly `width * height * 3` bytes.
pub fn rotate_rgb(rgb: Vec<u8>, width: u32, height: u32, rotation: Rotation) -> (Vec<u8>, u32, u32) {
    if rotation == Rotation::None {
        return (rgb, width, height);
    }

    let (w, h) = (width as usize, height as usize);
    let (out_w, out_h) = rotation.dimensions(width, height);
    let mut out = vec![0u8; rgb.len()];

    for (dst_y, row) in out.chunks_exact_mut(out_w as usize * 3).enumerate() {
        for (dst_x, px) in row.chunks_exact_mut(3).enumerate() {
            let (src_x, src_y) = match rotation {
                Rotation::Cw90 => (dst_y, h - 1 - dst_x),
                Rotation::Cw180 => (w - 1 - dst_x, h - 1 - dst_y),
                Rotation::Cw270 => (w - 1 - dst_y, dst_x),
                Rotation::None => (dst_x, dst_y),
            };
            let src = (src_y * w + src_x) * 3;
            px.copy_from_slice(&rgb[src..src + 3]);
        }
    }

    (out, out_w, out_h)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 3x2 image, one distinct gray level per pixel:
    // 1 2 3
    // 4 5 6
    fn sample() -> Vec<u8> {
        (1..=6).flat_map(|v| [v, v, v]).collect()
    }

    fn levels(rgb: &[u8]) -> Vec<u8> {
        rgb.chunks_exact(3).map(|px| px[0]).collect()
    }

    #[test]
    fn quarter_turn_clockwise() {
        let (out, w, h) = rotate_rgb(sample(), 3, 2, Rotation::Cw90);
        assert_eq!((w, h), (2, 3));
        assert_eq!(levels(&out), vec![4, 1, 5, 2, 6, 3]);
    }

    #[test]
    fn half_turn() {
        let (out, w, h) = rotate_rgb(sample(), 3, 2, Rotation::Cw180);
        assert_eq!((w, h), (3, 2));
        assert_eq!(levels(&out), vec![6, 5, 4, 3, 2, 1]);
    }

    #[test]
    fn three_quarter_turn() {
        let (out, w, h) = rotate_rgb(sample(), 3, 2, Rotation::Cw270);
        assert_eq!((w, h), (2, 3));
        assert_eq!(levels(&out), vec![3, 6, 2, 5, 1, 4]);
    }

    #[test]
    fn no_rotation_keeps_buffer() {
        let (out, w, h) = rotate_rgb(sample(), 3, 2, Rotation::None);
        assert_eq!((out, w, h), (sample(), 3, 2));
    }
}
