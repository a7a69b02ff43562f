use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use thermalign_core::{DESCRIPTOR_SIZE, Descriptor, Image, Keypoint};

/// Number of intensity comparisons, one bit each
pub const DESCRIPTOR_BITS: usize = DESCRIPTOR_SIZE * 8;

/// Half-size of the box filter applied before sampling (5x5)
const SMOOTHING_RADIUS: usize = 2;

/// Fixed seed so every run uses the same sampling pattern
const PATTERN_SEED: u64 = 0x0b51_e7ee_d5ee_d001;

/// One comparison: bit is set when I(p1) < I(p2)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternPair {
    pub p1: (f32, f32),
    pub p2: (f32, f32),
}

pub struct BriefGenerator {
    w: usize,
    h: usize,
    pattern: Vec<PatternPair>,
}

impl BriefGenerator {
    /// Generator for `width` x `height` images with a `patch_size` square patch.
    ///
    /// Sample points lie on a disc that stays inside the patch under any
    /// rotation once the smoothing window is accounted for.
    pub fn new(width: usize, height: usize, patch_size: usize) -> Self {
        assert!(width > 0 && height > 0);
        let radius = (patch_size / 2).saturating_sub(SMOOTHING_RADIUS).max(1) as f32;
        Self {
            w: width,
            h: height,
            pattern: Self::generate_pattern(radius),
        }
    }

    fn generate_pattern(radius: f32) -> Vec<PatternPair> {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut random_point = || loop {
            let x = rng.gen_range(-radius..=radius);
            let y = rng.gen_range(-radius..=radius);
            if x * x + y * y <= radius * radius {
                return (x, y);
            }
        };

        (0..DESCRIPTOR_BITS)
            .map(|_| PatternPair {
                p1: random_point(),
                p2: random_point(),
            })
            .collect()
    }

    pub fn pattern(&self) -> &[PatternPair] {
        &self.pattern
    }

    /// Descriptors for `kps`, whose coordinates are in this image's pixel grid
    pub fn generate_descriptors(&self, img: &Image, kps: &[Keypoint]) -> Vec<Descriptor> {
        assert_eq!(img.len(), self.w * self.h, "image buffer does not match generator size");
        let smoothed = self.box_smooth(img);

        kps.par_iter()
            .map(|kp| self.describe(&smoothed, kp))
            .collect()
    }

    fn describe(&self, smoothed: &[f32], kp: &Keypoint) -> Descriptor {
        let (s, c) = kp.angle.sin_cos();
        let (cx, cy) = (kp.x, kp.y);
        let mut d = [0u8; DESCRIPTOR_SIZE];

        for (i, pair) in self.pattern.iter().enumerate() {
            let (dx1, dy1) = pair.p1;
            let (dx2, dy2) = pair.p2;
            // Steer the pattern by the keypoint orientation
            let (rx1, ry1) = (cx + c * dx1 - s * dy1, cy + s * dx1 + c * dy1);
            let (rx2, ry2) = (cx + c * dx2 - s * dy2, cy + s * dx2 + c * dy2);

            let val1 = self.bilinear_sample(smoothed, rx1, ry1);
            let val2 = self.bilinear_sample(smoothed, rx2, ry2);

            let bit = (val1 < val2) as u8;
            d[i / 8] |= bit << (i % 8);
        }
        d
    }

    /// 5x5 mean filter computed from an integral image; borders are clamped
    fn box_smooth(&self, img: &Image) -> Vec<f32> {
        let (w, h) = (self.w, self.h);
        let stride = w + 1;
        let mut integral = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row_sum = 0u64;
            for x in 0..w {
                row_sum += img[y * w + x] as u64;
                integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
            }
        }

        let r = SMOOTHING_RADIUS;
        let mut smoothed = vec![0f32; w * h];
        smoothed.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
            let y0 = y.saturating_sub(r);
            let y1 = (y + r + 1).min(h);
            for (x, out) in row.iter_mut().enumerate() {
                let x0 = x.saturating_sub(r);
                let x1 = (x + r + 1).min(w);
                let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                    - integral[y0 * stride + x1]
                    - integral[y1 * stride + x0];
                *out = sum as f32 / ((x1 - x0) * (y1 - y0)) as f32;
            }
        });
        smoothed
    }

    /// Bilinear interpolation for subpixel sampling
    fn bilinear_sample(&self, img: &[f32], x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let x1 = x0 + 1.0;
        let y1 = y0 + 1.0;

        if x0 < 0.0 || y0 < 0.0 || x1 >= self.w as f32 || y1 >= self.h as f32 {
            let cx = x.round().clamp(0.0, (self.w - 1) as f32) as usize;
            let cy = y.round().clamp(0.0, (self.h - 1) as f32) as usize;
            return img[cy * self.w + cx];
        }

        let dx = x - x0;
        let dy = y - y0;

        let x0_idx = x0 as usize;
        let y0_idx = y0 as usize;
        let x1_idx = x1 as usize;
        let y1_idx = y1 as usize;

        let p00 = img[y0_idx * self.w + x0_idx];
        let p10 = img[y0_idx * self.w + x1_idx];
        let p01 = img[y1_idx * self.w + x0_idx];
        let p11 = img[y1_idx * self.w + x1_idx];

        let top = p00 * (1.0 - dx) + p10 * dx;
        let bottom = p01 * (1.0 - dx) + p11 * dx;

        top * (1.0 - dy) + bottom * dy
    }
}
