use image::{GrayImage, RgbImage, imageops};
use thermalign_core::{FeatureConfig, Keypoint, ParameterError, RegistrationConfig};
use thermalign_fast::FastError;

use crate::error::BlendResult;
use crate::extractor::{Features, OrbExtractor};
use crate::homography::{Correspondence, Homography};
use crate::matcher::HammingMatcher;
use crate::ransac::{RansacParams, estimate_homography};
use crate::warp::overlay;

/// A successful registration of a thermal image onto a visible image
#[derive(Debug, Clone)]
pub struct Alignment {
    /// Maps thermal pixel coordinates to visible pixel coordinates
    pub homography: Homography,
    pub visible_keypoints: usize,
    pub thermal_keypoints: usize,
    /// Retained matches, index-aligned with `homography.inliers`
    pub correspondences: Vec<Correspondence>,
}

impl Alignment {
    /// Visible-image locations of the matches that support the homography
    pub fn inlier_points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.correspondences
            .iter()
            .zip(&self.homography.inliers)
            .filter(|&(_, &inlier)| inlier)
            .map(|(c, _)| (c.dst.x, c.dst.y))
    }
}

/// Outcome of registering one pair
#[derive(Debug, Clone)]
pub enum Registration {
    Aligned(Alignment),
    /// One of the images produced no descriptors
    InsufficientFeatures { visible: usize, thermal: usize },
    InsufficientMatches { found: usize, required: usize },
    HomographyUnavailable,
}

/// Extract, match and fit for one visible/thermal pair
#[derive(Debug, Clone)]
pub struct Registrar {
    extractor: OrbExtractor,
    matcher: HammingMatcher,
    registration: RegistrationConfig,
}

impl Registrar {
    pub fn new(features: FeatureConfig, registration: RegistrationConfig) -> Result<Self, ParameterError> {
        features.validate()?;
        registration.validate()?;
        Ok(Self {
            extractor: OrbExtractor::new(features),
            matcher: HammingMatcher::new(registration.keep_fraction),
            registration,
        })
    }

    pub fn feature_config(&self) -> &FeatureConfig {
        self.extractor.config()
    }

    pub fn registration_config(&self) -> &RegistrationConfig {
        &self.registration
    }

    fn features(&self, gray: &GrayImage) -> Features {
        match self.extractor.detect_and_describe_gray(gray) {
            Ok(features) => features,
            Err(FastError::ImageTooSmall { width, height, .. }) => {
                log::debug!("{}x{} image is too small for feature detection", width, height);
                Features::default()
            }
            Err(e) => {
                log::warn!("Feature extraction failed: {}", e);
                Features::default()
            }
        }
    }

    /// Find the homography mapping `thermal` onto `visible`
    pub fn align(&self, visible: &RgbImage, thermal: &RgbImage) -> Registration {
        let visible_features = self.features(&imageops::grayscale(visible));
        let thermal_features = self.features(&imageops::grayscale(thermal));
        log::debug!(
            "Keypoints: {} visible, {} thermal",
            visible_features.len(),
            thermal_features.len()
        );

        if visible_features.is_empty() || thermal_features.is_empty() {
            return Registration::InsufficientFeatures {
                visible: visible_features.len(),
                thermal: thermal_features.len(),
            };
        }

        let matches = self
            .matcher
            .match_descriptors(&visible_features.descriptors, &thermal_features.descriptors);
        log::debug!("Retained {} matches", matches.len());

        let required = self.registration.min_match_count;
        if matches.len() < required {
            return Registration::InsufficientMatches {
                found: matches.len(),
                required,
            };
        }

        let correspondences: Vec<Correspondence> = matches
            .iter()
            .map(|m| {
                let src = &thermal_features.keypoints[m.train_idx];
                let dst = &visible_features.keypoints[m.query_idx];
                correspondence(src, dst)
            })
            .collect();

        match estimate_homography(&correspondences, &self.ransac_params()) {
            Some(homography) => Registration::Aligned(Alignment {
                homography,
                visible_keypoints: visible_features.len(),
                thermal_keypoints: thermal_features.len(),
                correspondences,
            }),
            None => Registration::HomographyUnavailable,
        }
    }

    fn ransac_params(&self) -> RansacParams {
        RansacParams {
            threshold: self.registration.ransac_threshold,
            max_iterations: self.registration.ransac_max_iterations,
            confidence: self.registration.ransac_confidence,
            seed: self.registration.seed,
        }
    }

    /// Warp `thermal` with the alignment and blend it over `visible`
    pub fn composite(
        &self,
        visible: &RgbImage,
        thermal: &RgbImage,
        alignment: &Alignment,
        alpha: f32,
    ) -> BlendResult<RgbImage> {
        overlay(visible, thermal, &alignment.homography.matrix, alpha)
    }
}

fn correspondence(src: &Keypoint, dst: &Keypoint) -> Correspondence {
    Correspondence::new((src.x as f64, src.y as f64), (dst.x as f64, dst.y as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::project;
    use crate::test_support::textured_rgb;
    use crate::warp::warp_perspective;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Matrix3, Point2};

    fn registrar() -> Registrar {
        Registrar::new(FeatureConfig::default(), RegistrationConfig::default()).unwrap()
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bad = RegistrationConfig {
            min_match_count: 2,
            ..RegistrationConfig::default()
        };
        assert!(Registrar::new(FeatureConfig::default(), bad).is_err());
    }

    #[test]
    fn test_identical_images_align_to_identity() {
        let img = textured_rgb(320, 240, 11);
        let registrar = registrar();
        let Registration::Aligned(alignment) = registrar.align(&img, &img) else {
            panic!("identical images did not align");
        };

        assert_abs_diff_eq!(alignment.homography.matrix, Matrix3::identity(), epsilon = 1e-3);
        assert!(alignment.homography.inlier_count() >= 10);
        assert!(alignment.homography.inlier_count() <= alignment.correspondences.len());
        assert_eq!(alignment.inlier_points().count(), alignment.homography.inlier_count());

        for alpha in [0.0, 0.3, 0.5, 1.0] {
            let out = registrar.composite(&img, &img, &alignment, alpha).unwrap();
            assert_eq!(out, img, "alpha {alpha}");
        }
    }

    #[test]
    fn test_alpha_extremes() {
        let visible = textured_rgb(320, 240, 11);
        let thermal = textured_rgb(320, 240, 12);
        let h = Matrix3::identity();
        let registrar = registrar();
        let alignment = Alignment {
            homography: Homography {
                matrix: h,
                inliers: Vec::new(),
            },
            visible_keypoints: 0,
            thermal_keypoints: 0,
            correspondences: Vec::new(),
        };
        assert_eq!(registrar.composite(&visible, &thermal, &alignment, 0.0).unwrap(), visible);
        let warped = warp_perspective(&thermal, &h, 320, 240).unwrap();
        assert_eq!(registrar.composite(&visible, &thermal, &alignment, 1.0).unwrap(), warped);
    }

    #[test]
    fn test_rotation_and_translation_is_recovered() {
        let visible = textured_rgb(320, 240, 21);
        let (s, c) = 3.0f64.to_radians().sin_cos();
        // Thermal frame = visible rotated by 3 degrees about the centre and shifted
        let (cx, cy) = (160.0, 120.0);
        let to_thermal = Matrix3::new(
            c,
            -s,
            cx - c * cx + s * cy + 6.0,
            s,
            c,
            cy - s * cx - c * cy - 4.0,
            0.0,
            0.0,
            1.0,
        );
        let thermal = warp_perspective(&visible, &to_thermal, 320, 240).unwrap();

        let Registration::Aligned(alignment) = registrar().align(&visible, &thermal) else {
            panic!("rotated pair did not align");
        };
        let expected = to_thermal.try_inverse().unwrap();
        for &(x, y) in &[(80.0, 60.0), (160.0, 120.0), (240.0, 180.0), (100.0, 170.0)] {
            let q = Point2::new(x, y);
            let got = project(&alignment.homography.matrix, &q).unwrap();
            let want = project(&expected, &q).unwrap();
            assert!((got - want).norm() < 5.0, "({x}, {y}): {got} vs {want}");
        }
    }

    #[test]
    fn test_flat_image_has_insufficient_features() {
        let flat = RgbImage::from_pixel(200, 150, image::Rgb([90, 90, 90]));
        let textured = textured_rgb(200, 150, 4);
        assert!(matches!(
            registrar().align(&flat, &textured),
            Registration::InsufficientFeatures { visible: 0, .. }
        ));
        let tiny = RgbImage::new(4, 4);
        assert!(matches!(
            registrar().align(&textured, &tiny),
            Registration::InsufficientFeatures { thermal: 0, .. }
        ));
    }

    #[test]
    fn test_too_few_matches_is_reported() {
        let strict = Registrar::new(
            FeatureConfig {
                max_features: 40,
                ..FeatureConfig::default()
            },
            RegistrationConfig {
                keep_fraction: 0.05,
                ..RegistrationConfig::default()
            },
        )
        .unwrap();
        let img = textured_rgb(200, 150, 8);
        match strict.align(&img, &img) {
            Registration::InsufficientMatches { found, required } => {
                assert!(found < required);
                assert_eq!(required, 10);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_collinear_matches_give_no_homography() {
        // A 39 px tall image only leaves row 19 outside the default 19 px border.
        // Cell rows are shifted so a cell boundary, and thus every corner, sits on it.
        let base = textured_rgb(1280, 48, 31);
        let stripe = RgbImage::from_fn(1280, 39, |x, y| *base.get_pixel(x, y + 5));

        let features = OrbExtractor::new(FeatureConfig::default())
            .detect_and_describe_gray(&imageops::grayscale(&stripe))
            .unwrap();
        assert!(features.len() >= 10, "only {} keypoints", features.len());
        assert!(features.keypoints.iter().all(|kp| kp.y == 19.0));

        let all_matches = Registrar::new(
            FeatureConfig::default(),
            RegistrationConfig {
                keep_fraction: 1.0,
                ..RegistrationConfig::default()
            },
        )
        .unwrap();
        match all_matches.align(&stripe, &stripe) {
            Registration::HomographyUnavailable => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}
