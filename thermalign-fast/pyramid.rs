use rayon::prelude::*;
use thermalign_core::Image;

use crate::types::ScaleLevel;

/// Levels smaller than this on either side are not generated
pub const MIN_LEVEL_SIZE: usize = 32;

/// Image pyramid operations for multi-scale feature detection
pub struct ImagePyramid;

impl ImagePyramid {
    /// Generate scale levels for image pyramid
    pub fn generate_scale_levels(width: usize, height: usize, n_levels: usize, scale_factor: f32) -> Vec<ScaleLevel> {
        let mut levels = Vec::with_capacity(n_levels);
        let mut current_scale = 1.0f32;

        for level in 0..n_levels {
            let scaled_width = ((width as f32) / current_scale).round() as usize;
            let scaled_height = ((height as f32) / current_scale).round() as usize;

            // The base level is always kept, however small
            if level > 0 && (scaled_width < MIN_LEVEL_SIZE || scaled_height < MIN_LEVEL_SIZE) {
                break;
            }

            levels.push(ScaleLevel {
                level,
                scale: current_scale,
                width: scaled_width,
                height: scaled_height,
            });

            current_scale *= scale_factor;
        }

        levels
    }

    /// Build image pyramid from base image
    pub fn build_image_pyramid(img: &Image, width: usize, height: usize, scale_levels: &[ScaleLevel]) -> Vec<Image> {
        scale_levels
            .iter()
            .map(|scale_level| {
                if scale_level.level == 0 {
                    img.clone()
                } else {
                    Self::downsample_image(img, width, height, scale_level)
                }
            })
            .collect()
    }

    /// Downsample image using bilinear interpolation at pixel centres
    fn downsample_image(img: &Image, src_width: usize, src_height: usize, target: &ScaleLevel) -> Image {
        let mut downsampled = vec![0u8; target.width * target.height];

        let x_ratio = src_width as f32 / target.width as f32;
        let y_ratio = src_height as f32 / target.height as f32;

        downsampled
            .par_chunks_mut(target.width)
            .enumerate()
            .for_each(|(y, row)| {
                let src_y = ((y as f32 + 0.5) * y_ratio - 0.5).max(0.0);
                for (x, out) in row.iter_mut().enumerate() {
                    let src_x = ((x as f32 + 0.5) * x_ratio - 0.5).max(0.0);
                    let value = Self::bilinear_sample(img, src_width, src_height, src_x, src_y);
                    *out = value.round().clamp(0.0, 255.0) as u8;
                }
            });

        downsampled
    }

    /// Sample image at fractional coordinates using bilinear interpolation
    fn bilinear_sample(img: &Image, width: usize, height: usize, x: f32, y: f32) -> f32 {
        let x1 = (x.floor() as usize).min(width - 1);
        let y1 = (y.floor() as usize).min(height - 1);
        let x2 = (x1 + 1).min(width - 1);
        let y2 = (y1 + 1).min(height - 1);

        let fx = x - x1 as f32;
        let fy = y - y1 as f32;

        let p11 = img[y1 * width + x1] as f32;
        let p12 = img[y1 * width + x2] as f32;
        let p21 = img[y2 * width + x1] as f32;
        let p22 = img[y2 * width + x2] as f32;

        let interpolated_top = p11 * (1.0 - fx) + p12 * fx;
        let interpolated_bottom = p21 * (1.0 - fx) + p22 * fx;

        interpolated_top * (1.0 - fy) + interpolated_bottom * fy
    }
}
