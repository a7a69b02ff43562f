use rayon::prelude::*;
use thermalign_core::{FeatureConfig, Image, Keypoint};

use crate::corner_detection::CornerDetector;
use crate::error::{FastError, FastResult};
use crate::pyramid::ImagePyramid;
use crate::refinement::KeypointRefinement;
use crate::types::{LevelFeatures, ScaleLevel};

/// FAST requires at least a 7x7 image (3-pixel ring on each side)
pub const MIN_IMAGE_SIZE: usize = 7;

/// Multi-scale FAST corner detector with Harris ranking
#[derive(Debug, Clone)]
pub struct FastDetector {
    cfg: FeatureConfig,
    w: usize,
    h: usize,
    scale_levels: Vec<ScaleLevel>,
}

impl FastDetector {
    /// Creates a new FAST detector with validation
    pub fn new(cfg: FeatureConfig, width: usize, height: usize) -> FastResult<Self> {
        if width == 0 || height == 0 {
            return Err(FastError::InvalidImageSize { width, height });
        }

        if width < MIN_IMAGE_SIZE || height < MIN_IMAGE_SIZE {
            return Err(FastError::ImageTooSmall {
                width,
                height,
                min_size: MIN_IMAGE_SIZE,
            });
        }

        cfg.validate()?;

        let scale_levels = ImagePyramid::generate_scale_levels(width, height, cfg.n_levels, cfg.scale_factor);

        Ok(Self {
            cfg,
            w: width,
            h: height,
            scale_levels,
        })
    }

    /// Validates image data before processing
    fn validate_image(&self, img: &Image) -> FastResult<()> {
        let expected_len = self.w * self.h;
        if img.len() != expected_len {
            return Err(FastError::InvalidImageData {
                expected_len,
                actual_len: img.len(),
            });
        }
        Ok(())
    }

    /// Distance from the image edge inside which no corner is reported.
    ///
    /// Large enough for the orientation disc to fit.
    pub fn border(&self) -> usize {
        self.cfg.edge_threshold.max(self.cfg.patch_size / 2 + 1)
    }

    /// Per-level feature budget, shrinking geometrically with the level scale
    pub fn features_per_level(&self) -> Vec<usize> {
        let n_levels = self.scale_levels.len();
        let factor = 1.0 / self.cfg.scale_factor as f64;
        let max_features = self.cfg.max_features;

        let mut budgets = Vec::with_capacity(n_levels);
        let mut desired = max_features as f64 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32));
        let mut assigned = 0usize;

        for _ in 0..n_levels.saturating_sub(1) {
            let n = (desired.round() as usize).min(max_features - assigned);
            budgets.push(n);
            assigned += n;
            desired *= factor;
        }
        if n_levels > 0 {
            budgets.push(max_features - assigned);
        }

        budgets
    }

    /// Detect oriented corners on every pyramid level.
    ///
    /// Each returned level carries its downsampled image so descriptors can be
    /// computed at the scale the corner was found on.
    pub fn detect_levels(&self, img: &Image) -> FastResult<Vec<LevelFeatures>> {
        self.validate_image(img)?;

        let pyramid = ImagePyramid::build_image_pyramid(img, self.w, self.h, &self.scale_levels);
        let budgets = self.features_per_level();

        let levels: Vec<LevelFeatures> = self
            .scale_levels
            .par_iter()
            .zip(pyramid.into_par_iter())
            .zip(budgets.into_par_iter())
            .map(|((scale_level, level_img), budget)| {
                let keypoints = self.detect_keypoints_at_scale(&level_img, scale_level, budget);
                LevelFeatures {
                    level: *scale_level,
                    image: level_img,
                    keypoints,
                }
            })
            .collect();

        log::debug!(
            "FAST: {} levels, {} keypoints",
            levels.len(),
            levels.iter().map(|l| l.keypoints.len()).sum::<usize>()
        );

        Ok(levels)
    }

    /// Detect keypoints in full-resolution coordinates across all levels
    pub fn detect_keypoints(&self, img: &Image) -> FastResult<Vec<Keypoint>> {
        let levels = self.detect_levels(img)?;
        Ok(levels.iter().flat_map(|level| level.base_keypoints()).collect())
    }

    /// Detect, score, thin and orient keypoints on a single level.
    ///
    /// Coordinates are in the level's pixel grid.
    pub fn detect_keypoints_at_scale(&self, img: &Image, scale_level: &ScaleLevel, budget: usize) -> Vec<Keypoint> {
        let (width, height) = (scale_level.width, scale_level.height);

        let corners = CornerDetector::detect_fast_corners(img, width, height, self.cfg.threshold, self.border());

        let scored: Vec<Keypoint> = corners
            .into_iter()
            .filter_map(|(x, y)| {
                let response = CornerDetector::compute_harris_response(img, width, height, x, y);
                (response > 0.0).then(|| Keypoint {
                    response,
                    octave: scale_level.level,
                    ..Keypoint::new(x as f32, y as f32)
                })
            })
            .collect();

        let mut keypoints = KeypointRefinement::non_maximum_suppression(&scored, self.cfg.nms_distance);
        keypoints.truncate(budget);

        let radius = self.cfg.patch_size / 2;
        for kp in keypoints.iter_mut() {
            kp.angle = KeypointRefinement::compute_orientation(img, width, height, kp.x, kp.y, radius);
        }

        keypoints
    }

    /// Get scale levels for this detector
    pub fn scale_levels(&self) -> &[ScaleLevel] {
        &self.scale_levels
    }

    /// Get detector configuration
    pub fn config(&self) -> &FeatureConfig {
        &self.cfg
    }

    /// Get image dimensions
    pub fn dimensions(&self) -> (usize, usize) {
        (self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> FeatureConfig {
        FeatureConfig {
            n_threads: 1,
            ..FeatureConfig::default()
        }
    }

    fn create_small_test_config() -> FeatureConfig {
        FeatureConfig {
            patch_size: 7,
            edge_threshold: 4,
            n_levels: 1,
            n_threads: 1,
            ..FeatureConfig::default()
        }
    }

    /// Checkerboard of 8x8 cells with pseudo-random intensities
    fn create_textured_image(width: usize, height: usize) -> Image {
        let mut img = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let cell = (x / 8) * 31 + (y / 8) * 17;
                img[y * width + x] = ((cell * 73 + 11) % 251) as u8;
            }
        }
        img
    }

    fn create_corner_image(width: usize, height: usize) -> Image {
        let mut img = vec![50; width * height];
        for y in height / 2 - 3..=height / 2 + 3 {
            for x in width / 2 - 3..=width / 2 + 3 {
                img[y * width + x] = 255;
            }
        }
        img
    }

    #[test]
    fn test_valid_constructor() {
        assert!(FastDetector::new(create_test_config(), 100, 100).is_ok());
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = FastDetector::new(create_test_config(), 0, 100);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));

        let result = FastDetector::new(create_test_config(), 100, 0);
        assert!(matches!(result, Err(FastError::InvalidImageSize { .. })));
    }

    #[test]
    fn test_too_small_image() {
        let result = FastDetector::new(create_test_config(), 6, 6);
        assert!(matches!(result, Err(FastError::ImageTooSmall { .. })));
    }

    #[test]
    fn test_invalid_config() {
        let mut cfg = create_test_config();
        cfg.threshold = 0;
        let result = FastDetector::new(cfg, 100, 100);
        assert!(matches!(result, Err(FastError::InvalidConfig(_))));

        let mut cfg = create_test_config();
        cfg.patch_size = 16;
        let result = FastDetector::new(cfg, 100, 100);
        assert!(matches!(result, Err(FastError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_image_data() {
        let detector = FastDetector::new(create_small_test_config(), 10, 10).unwrap();
        let img = vec![0; 50];
        let result = detector.detect_keypoints(&img);
        assert!(matches!(result, Err(FastError::InvalidImageData { .. })));
    }

    #[test]
    fn test_uniform_image_has_no_keypoints() {
        let detector = FastDetector::new(create_test_config(), 64, 64).unwrap();
        let img = vec![128; 64 * 64];
        assert!(detector.detect_keypoints(&img).unwrap().is_empty());
    }

    #[test]
    fn test_corner_detection() {
        let detector = FastDetector::new(create_small_test_config(), 20, 20).unwrap();
        let img = create_corner_image(20, 20);
        let keypoints = detector.detect_keypoints(&img).unwrap();
        assert!(!keypoints.is_empty());
        for kp in &keypoints {
            assert!(kp.angle.is_finite());
            assert!(kp.response > 0.0);
        }
    }

    #[test]
    fn test_budget_split_sums_to_max_features() {
        let detector = FastDetector::new(create_test_config(), 640, 480).unwrap();
        let budgets = detector.features_per_level();
        assert_eq!(budgets.len(), detector.scale_levels().len());
        assert_eq!(budgets.iter().sum::<usize>(), 5000);
        assert!(budgets[0] > budgets[budgets.len() - 1]);
    }

    #[test]
    fn test_max_features_is_respected() {
        let mut cfg = create_test_config();
        cfg.max_features = 40;
        let detector = FastDetector::new(cfg, 200, 160).unwrap();
        let img = create_textured_image(200, 160);
        let keypoints = detector.detect_keypoints(&img).unwrap();
        assert!(!keypoints.is_empty());
        assert!(keypoints.len() <= 40);
    }

    #[test]
    fn test_keypoints_inside_image_and_tagged_with_level() {
        let detector = FastDetector::new(create_test_config(), 200, 160).unwrap();
        let img = create_textured_image(200, 160);
        let levels = detector.detect_levels(&img).unwrap();
        assert!(levels.len() > 1);
        for level in &levels {
            for kp in &level.keypoints {
                assert_eq!(kp.octave, level.level.level);
                assert!(kp.x >= 0.0 && (kp.x as usize) < level.level.width);
                assert!(kp.y >= 0.0 && (kp.y as usize) < level.level.height);
            }
            for kp in level.base_keypoints() {
                assert!(kp.x >= 0.0 && kp.x < 200.0);
                assert!(kp.y >= 0.0 && kp.y < 160.0);
            }
        }
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = FastDetector::new(create_test_config(), 200, 160).unwrap();
        let img = create_textured_image(200, 160);
        let first = detector.detect_keypoints(&img).unwrap();
        for _ in 0..3 {
            assert_eq!(detector.detect_keypoints(&img).unwrap(), first);
        }
    }

    #[test]
    fn test_configuration_access() {
        let cfg = create_test_config();
        let detector = FastDetector::new(cfg.clone(), 20, 20).unwrap();
        assert_eq!(detector.config(), &cfg);
        assert_eq!(detector.dimensions(), (20, 20));
        assert_eq!(detector.border(), 19);
    }
}
