//! Pre-blur and post-morphology passes used by the higher quality tiers

/// Separable binomial (Gaussian approximation) kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Blur {
    /// `[1 2 1] / 4` per axis
    Binomial3,
    /// `[1 4 6 4 1] / 16` per axis
    Binomial5,
}

impl Blur {
    fn taps(self) -> &'static [u32] {
        match self {
            Blur::Binomial3 => &[1, 2, 1],
            Blur::Binomial5 => &[1, 4, 6, 4, 1],
        }
    }
}

/// Blur a single-channel image, replicating edge pixels beyond the border.
///
/// Sums are kept exact across both passes and rounded once, so a flat
/// image comes back unchanged.
pub fn blur(gray: &[u8], width: usize, height: usize, kernel: Blur) -> Vec<u8> {
    debug_assert_eq!(gray.len(), width * height);
    let taps = kernel.taps();
    let radius = taps.len() / 2;
    let weight: u32 = taps.iter().sum();
    let norm = weight * weight;

    let clamp_index = |i: usize, offset: usize, len: usize| (i + offset).saturating_sub(radius).min(len - 1);

    let mut horizontal = vec![0u32; width * height];
    for y in 0..height {
        let row = &gray[y * width..(y + 1) * width];
        for x in 0..width {
            horizontal[y * width + x] = taps
                .iter()
                .enumerate()
                .map(|(k, &t)| t * row[clamp_index(x, k, width)] as u32)
                .sum();
        }
    }

    let mut out = vec![0u8; width * height];
    for y in 0..height {
        for x in 0..width {
            let sum: u32 = taps
                .iter()
                .enumerate()
                .map(|(k, &t)| t * horizontal[clamp_index(y, k, height) * width + x])
                .sum();
            out[y * width + x] = ((sum + norm / 2) / norm) as u8;
        }
    }

    out
}

/// 3x3 binary closing (dilate, then erode) of a 0/255 mask.
///
/// Pixels outside the image count as background while dilating and as
/// foreground while eroding, so the result always contains the input.
pub fn close(mask: &[u8], width: usize, height: usize) -> Vec<u8> {
    let dilated = morph(mask, width, height, false, |any_set, _| any_set);
    morph(&dilated, width, height, true, |_, all_set| all_set)
}

fn morph(
    mask: &[u8],
    width: usize,
    height: usize,
    outside_set: bool,
    keep: impl Fn(bool, bool) -> bool,
) -> Vec<u8> {
    let mut out = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let mut any_set = false;
            let mut all_set = true;

            for ny in y as isize - 1..=y as isize + 1 {
                for nx in x as isize - 1..=x as isize + 1 {
                    let inside = ny >= 0 && nx >= 0 && (ny as usize) < height && (nx as usize) < width;
                    let set = if inside {
                        mask[ny as usize * width + nx as usize] != 0
                    } else {
                        outside_set
                    };
                    any_set |= set;
                    all_set &= set;
                }
            }

            if keep(any_set, all_set) {
                out[y * width + x] = 255;
            }
        }
    }

    out
}
