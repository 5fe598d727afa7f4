//! 3x3 Sobel gradient magnitude over unpadded borders

/// Gradient magnitude `sqrt(Gx² + Gy²)`, rounded and clamped to 255.
///
/// The first and last row and column have no full neighborhood and stay 0;
/// there is no wraparound or reflection.
pub fn sobel_magnitude(gray: &[u8], width: usize, height: usize) -> Vec<u8> {
    debug_assert_eq!(gray.len(), width * height);
    let mut magnitude = vec![0u8; width * height];
    if width < 3 || height < 3 {
        return magnitude;
    }

    for y in 1..height - 1 {
        let above = &gray[(y - 1) * width..y * width];
        let row = &gray[y * width..(y + 1) * width];
        let below = &gray[(y + 1) * width..(y + 2) * width];
        let out = &mut magnitude[y * width..(y + 1) * width];

        for x in 1..width - 1 {
            let p = |line: &[u8], dx: usize| line[x + dx - 1] as i32;

            // Gx = [[-1,0,1],[-2,0,2],[-1,0,1]]
            let gx = (p(above, 2) - p(above, 0))
                + 2 * (p(row, 2) - p(row, 0))
                + (p(below, 2) - p(below, 0));
            // Gy = [[-1,-2,-1],[0,0,0],[1,2,1]]
            let gy = (p(below, 0) + 2 * p(below, 1) + p(below, 2))
                - (p(above, 0) + 2 * p(above, 1) + p(above, 2));

            let squared = (gx * gx + gy * gy) as f32;
            out[x] = squared.sqrt().round().min(255.0) as u8;
        }
    }

    magnitude
}

/// Binary edge mask: 255 where `magnitude >= threshold`, else 0.
pub fn threshold(magnitude: &[u8], threshold: u8) -> Vec<u8> {
    magnitude
        .iter()
        .map(|&m| if m >= threshold { 255 } else { 0 })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_image_has_no_gradient() {
        assert!(sobel_magnitude(&[90; 25], 5, 5).iter().all(|&m| m == 0));
    }

    #[test]
    fn horizontal_ramp_gradient() {
        // Each column is 10 brighter than the last: |Gx| = 4 * 20
        let gray: Vec<u8> = (0..5).flat_map(|_| (0..5).map(|x| x * 10)).collect();
        let mag = sobel_magnitude(&gray, 5, 5);
        assert_eq!(mag[2 * 5 + 2], 80);
        assert_eq!(mag[2 * 5], 0);
    }

    #[test]
    fn diagonal_gradient_combines_both_axes() {
        // Gx = Gy = 8 for a unit diagonal ramp
        let gray: Vec<u8> = (0..3).flat_map(|y| (0..3).map(move |x| x + y)).collect();
        let mag = sobel_magnitude(&gray, 3, 3);
        // sqrt(8^2 + 8^2) = 11.3
        assert_eq!(mag[4], 11);
    }

    #[test]
    fn steep_edges_saturate() {
        let gray = [0, 0, 255, 0, 0, 255, 0, 0, 255];
        assert_eq!(sobel_magnitude(&gray, 3, 3)[4], 255);
    }

    #[test]
    fn tiny_images_are_all_border() {
        assert_eq!(sobel_magnitude(&[0, 255, 0, 255], 2, 2), vec![0; 4]);
        assert_eq!(sobel_magnitude(&[0, 255, 0], 3, 1), vec![0; 3]);
    }

    #[test]
    fn threshold_is_inclusive() {
        assert_eq!(threshold(&[9, 10, 11], 10), vec![0, 255, 255]);
    }
}
