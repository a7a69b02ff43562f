use rayon::prelude::*;
use thermalign_core::Image;

use crate::types::CornerType;
use crate::utils::has_contiguous_arc;

/// Contiguous ring pixels required for a FAST-9 corner
pub const FAST_ARC_LENGTH: usize = 9;

/// Harris detector free parameter
pub const HARRIS_K: f32 = 0.04;

/// Half-size of the Harris structure tensor window (7x7)
pub const HARRIS_RADIUS: i32 = 3;

/// Corner detection algorithms (FAST and Harris)
pub struct CornerDetector;

impl CornerDetector {
    /// FAST circle offsets for corner detection, clockwise from 12 o'clock
    pub const FAST_OFFSETS: [(i32, i32); 16] = [
        (0, -3), (1, -3), (2, -2), (3, -1),
        (3, 0), (3, 1), (2, 2), (1, 3),
        (0, 3), (-1, 3), (-2, 2), (-3, 1),
        (-3, 0), (-3, -1), (-2, -2), (-1, -3),
    ];

    /// Find FAST-9 corners at least `border` pixels away from every image edge.
    ///
    /// Rows are scanned in parallel; the result is in raster order.
    pub fn detect_fast_corners(img: &Image, width: usize, height: usize, threshold: u8, border: usize) -> Vec<(usize, usize)> {
        let border = border.max(3);
        if width <= 2 * border || height <= 2 * border {
            return Vec::new();
        }

        (border..height - border)
            .into_par_iter()
            .flat_map_iter(|y| {
                (border..width - border)
                    .filter(move |&x| Self::is_fast_corner(img, width, x, y, threshold))
                    .map(move |x| (x, y))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn classify(img: &Image, width: usize, x: usize, y: usize, offset: (i32, i32), center: i32, threshold: i32) -> CornerType {
        let px = (x as i32 + offset.0) as usize;
        let py = (y as i32 + offset.1) as usize;
        let pixel = img[py * width + px] as i32;

        if pixel > center + threshold {
            CornerType::Bright
        } else if pixel < center - threshold {
            CornerType::Dark
        } else {
            CornerType::None
        }
    }

    /// Check if a pixel is a FAST-9 corner
    fn is_fast_corner(img: &Image, width: usize, x: usize, y: usize, threshold: u8) -> bool {
        let center = img[y * width + x] as i32;
        let threshold = threshold as i32;

        // Any arc of 9 covers at least two of the four compass pixels
        let mut compass_bright = 0;
        let mut compass_dark = 0;
        for idx in [0, 4, 8, 12] {
            match Self::classify(img, width, x, y, Self::FAST_OFFSETS[idx], center, threshold) {
                CornerType::Bright => compass_bright += 1,
                CornerType::Dark => compass_dark += 1,
                CornerType::None => {}
            }
        }
        if compass_bright < 2 && compass_dark < 2 {
            return false;
        }

        let mut bright_mask = 0u16;
        let mut dark_mask = 0u16;
        for (i, &offset) in Self::FAST_OFFSETS.iter().enumerate() {
            match Self::classify(img, width, x, y, offset, center, threshold) {
                CornerType::Bright => bright_mask |= 1 << i,
                CornerType::Dark => dark_mask |= 1 << i,
                CornerType::None => {}
            }
        }

        has_contiguous_arc(bright_mask, FAST_ARC_LENGTH) || has_contiguous_arc(dark_mask, FAST_ARC_LENGTH)
    }

    /// Harris corner response over a 7x7 window of Sobel gradients.
    ///
    /// Returns 0.0 when the window does not fit inside the image.
    pub fn compute_harris_response(img: &Image, width: usize, height: usize, x: usize, y: usize) -> f32 {
        let reach = (HARRIS_RADIUS + 1) as usize;
        if x < reach || y < reach || x + reach >= width || y + reach >= height {
            return 0.0;
        }

        let mut ixx = 0.0f64;
        let mut ixy = 0.0f64;
        let mut iyy = 0.0f64;

        for dy in -HARRIS_RADIUS..=HARRIS_RADIUS {
            for dx in -HARRIS_RADIUS..=HARRIS_RADIUS {
                let nx = (x as i32 + dx) as usize;
                let ny = (y as i32 + dy) as usize;
                let (gx, gy) = Self::compute_gradients(img, width, nx, ny);

                ixx += (gx * gx) as f64;
                ixy += (gx * gy) as f64;
                iyy += (gy * gy) as f64;
            }
        }

        // det(M) - k * trace(M)^2
        let det = ixx * iyy - ixy * ixy;
        let trace = ixx + iyy;
        (det - HARRIS_K as f64 * trace * trace) as f32
    }

    /// Sobel gradients; the caller guarantees a one-pixel margin
    fn compute_gradients(img: &Image, width: usize, x: usize, y: usize) -> (f32, f32) {
        let at = |xx: usize, yy: usize| img[yy * width + xx] as f32;

        let gx = at(x + 1, y - 1) + 2.0 * at(x + 1, y) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x - 1, y) - at(x - 1, y + 1);
        let gy = at(x - 1, y + 1) + 2.0 * at(x, y + 1) + at(x + 1, y + 1)
            - at(x - 1, y - 1) - 2.0 * at(x, y - 1) - at(x + 1, y - 1);

        (gx / 8.0, gy / 8.0)
    }
}
