use image::RgbImage;
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

use crate::error::{BlendError, BlendResult};

/// Default weight of the thermal layer
pub const DEFAULT_ALPHA: f32 = 0.5;

/// Clamp the blend weight to `[0, 1]`; NaN falls back to [`DEFAULT_ALPHA`]
pub fn clamp_alpha(alpha: f32) -> f32 {
    if alpha.is_nan() {
        DEFAULT_ALPHA
    } else {
        alpha.clamp(0.0, 1.0)
    }
}

/// Bilinear sample at `(x, y)`; neighbours outside `src` count as black.
/// Returns `None` when no neighbour is inside.
fn sample(src: &RgbImage, x: f64, y: f64) -> Option<[u8; 3]> {
    let (w, h) = (src.width() as i64, src.height() as i64);
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (x0, y0) = (x0 as i64, y0 as i64);

    let taps = [
        (x0, y0, (1.0 - fx) * (1.0 - fy)),
        (x0 + 1, y0, fx * (1.0 - fy)),
        (x0, y0 + 1, (1.0 - fx) * fy),
        (x0 + 1, y0 + 1, fx * fy),
    ];

    let mut acc = [0.0f64; 3];
    let mut inside = false;
    for (tx, ty, weight) in taps {
        if tx < 0 || ty < 0 || tx >= w || ty >= h || weight == 0.0 {
            continue;
        }
        inside = true;
        let p = src.get_pixel(tx as u32, ty as u32);
        for c in 0..3 {
            acc[c] += weight * p[c] as f64;
        }
    }

    inside.then(|| acc.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

/// Resample `src` into a `width` x `height` frame where `h` maps source
/// coordinates to output coordinates. Unmapped pixels are black.
pub fn warp_perspective(src: &RgbImage, h: &Matrix3<f64>, width: u32, height: u32) -> BlendResult<RgbImage> {
    let inv = h.try_inverse().ok_or(BlendError::SingularTransform)?;
    let mut out = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return Ok(out);
    }

    let row_len = width as usize * 3;
    (*out).par_chunks_mut(row_len).enumerate().for_each(|(y, row)| {
        for (x, px) in row.chunks_exact_mut(3).enumerate() {
            let p = inv * Vector3::new(x as f64, y as f64, 1.0);
            if p.z.abs() < f64::EPSILON {
                continue;
            }
            if let Some(rgb) = sample(src, p.x / p.z, p.y / p.z) {
                px.copy_from_slice(&rgb);
            }
        }
    });

    Ok(out)
}

/// Weighted sum `round((1 - alpha) * base + alpha * layer)` per channel
pub fn blend(base: &RgbImage, layer: &RgbImage, alpha: f32) -> BlendResult<RgbImage> {
    if base.dimensions() != layer.dimensions() {
        return Err(BlendError::DimensionMismatch {
            expected: base.dimensions(),
            actual: layer.dimensions(),
        });
    }

    let alpha = clamp_alpha(alpha) as f64;
    let mut out = base.clone();
    (*out).par_iter_mut().zip(layer.as_raw().par_iter()).for_each(|(b, &l)| {
        let v = (1.0 - alpha) * *b as f64 + alpha * l as f64;
        *b = v.round().clamp(0.0, 255.0) as u8;
    });

    Ok(out)
}

/// Warp `thermal` into the frame of `visible` and blend it on top
pub fn overlay(visible: &RgbImage, thermal: &RgbImage, h: &Matrix3<f64>, alpha: f32) -> BlendResult<RgbImage> {
    let warped = warp_perspective(thermal, h, visible.width(), visible.height())?;
    blend(visible, &warped, alpha)
}
