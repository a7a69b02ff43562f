use image::GrayImage;
use thermalign_brief::BriefGenerator;
use thermalign_core::{Descriptor, FeatureConfig, Image, Keypoint};
use thermalign_fast::{FastDetector, FastResult};

/// Keypoints and their descriptors, index-aligned
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub keypoints: Vec<Keypoint>,
    pub descriptors: Vec<Descriptor>,
}

impl Features {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }
}

/// ORB-style extractor: multi-scale FAST corners described with steered BRIEF
#[derive(Debug, Clone)]
pub struct OrbExtractor {
    cfg: FeatureConfig,
}

impl OrbExtractor {
    pub fn new(cfg: FeatureConfig) -> Self {
        Self { cfg }
    }

    /// Detect keypoints and compute descriptors on a grayscale view.
    ///
    /// An image without usable corners yields empty [`Features`].
    pub fn detect_and_describe(&self, img: &Image, width: usize, height: usize) -> FastResult<Features> {
        let detector = FastDetector::new(self.cfg.clone(), width, height)?;
        let levels = detector.detect_levels(img)?;

        let mut features = Features::default();
        for level in &levels {
            if level.keypoints.is_empty() {
                continue;
            }
            // Descriptors are sampled on the level the corner was found on
            let brief = BriefGenerator::new(level.level.width, level.level.height, self.cfg.patch_size);
            features
                .descriptors
                .extend(brief.generate_descriptors(&level.image, &level.keypoints));
            features.keypoints.extend(level.base_keypoints());
        }

        Ok(features)
    }

    pub fn detect_and_describe_gray(&self, img: &GrayImage) -> FastResult<Features> {
        let (w, h) = img.dimensions();
        self.detect_and_describe(img.as_raw(), w as usize, h as usize)
    }

    /// Get extractor configuration
    pub fn config(&self) -> &FeatureConfig {
        &self.cfg
    }
}
