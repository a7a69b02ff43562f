use std::collections::HashMap;

use thermalign_core::{Image, Keypoint};

/// Orientation assignment and spatial filtering of detected corners
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Orientation by intensity centroid over a circular patch of radius `radius`.
    ///
    /// Pixels falling outside the image are skipped.
    pub fn compute_orientation(img: &Image, width: usize, height: usize, x: f32, y: f32, radius: usize) -> f32 {
        let r = radius as i64;
        let (cx, cy) = (x.round() as i64, y.round() as i64);
        let mut m10 = 0i64;
        let mut m01 = 0i64;

        for dy in -r..=r {
            let yy = cy + dy;
            if yy < 0 || yy >= height as i64 {
                continue;
            }
            // Half-width of the disc on this row
            let span = ((r * r - dy * dy) as f64).sqrt() as i64;
            for dx in -span..=span {
                let xx = cx + dx;
                if xx < 0 || xx >= width as i64 {
                    continue;
                }
                let val = img[yy as usize * width + xx as usize] as i64;
                m10 += dx * val;
                m01 += dy * val;
            }
        }

        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Greedy non-maximum suppression: strongest first, dropping anything
    /// closer than `min_distance` to an already accepted keypoint.
    ///
    /// Output is sorted by descending response; ties keep input order.
    pub fn non_maximum_suppression(keypoints: &[Keypoint], min_distance: f32) -> Vec<Keypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));

        if min_distance <= 0.0 {
            return sorted_keypoints;
        }

        // Accepted keypoints bucketed on a grid with cell side = min_distance,
        // so only the 3x3 neighbouring cells need checking.
        let cell = min_distance;
        let min_distance_sq = min_distance * min_distance;
        let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        let mut suppressed: Vec<Keypoint> = Vec::new();

        for candidate in sorted_keypoints {
            let gx = (candidate.x / cell).floor() as i64;
            let gy = (candidate.y / cell).floor() as i64;

            let mut is_local_max = true;
            'search: for ny in gy - 1..=gy + 1 {
                for nx in gx - 1..=gx + 1 {
                    let Some(bucket) = grid.get(&(nx, ny)) else {
                        continue;
                    };
                    for &idx in bucket {
                        let existing = &suppressed[idx];
                        let dx = candidate.x - existing.x;
                        let dy = candidate.y - existing.y;
                        if dx * dx + dy * dy < min_distance_sq {
                            is_local_max = false;
                            break 'search;
                        }
                    }
                }
            }

            if is_local_max {
                grid.entry((gx, gy)).or_default().push(suppressed.len());
                suppressed.push(candidate);
            }
        }

        suppressed
    }
}
