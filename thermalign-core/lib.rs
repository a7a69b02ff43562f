#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Row-major 8-bit grayscale image
pub type Image = Vec<u8>;

/// Key-point ≙ FAST corner + orientation (radians), in full-resolution coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub angle: f32,
    /// Harris corner response used for ranking
    pub response: f32,
    /// Pyramid level the corner was detected on
    pub octave: usize,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            angle: 0.0,
            response: 0.0,
            octave: 0,
        }
    }
}

/// 256-bit binary descriptor = 32 bytes
pub type Descriptor = [u8; 32];

/// Number of bytes in a [`Descriptor`]
pub const DESCRIPTOR_SIZE: usize = 32;

/// Candidate correspondence between a reference descriptor (`query_idx`)
/// and a source descriptor (`train_idx`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchCandidate {
    pub query_idx: usize,
    pub train_idx: usize,
    /// Hamming distance between the two descriptors
    pub distance: u32,
}

/// Invalid value in one of the configuration structs
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterError {
    pub field: &'static str,
    pub reason: String,
}

impl std::fmt::Display for ParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid parameter `{}`: {}", self.field, self.reason)
    }
}

impl std::error::Error for ParameterError {}

fn invalid(field: &'static str, reason: impl Into<String>) -> Result<(), ParameterError> {
    Err(ParameterError {
        field,
        reason: reason.into(),
    })
}

/// Feature detection and description settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct FeatureConfig {
    /// FAST intensity threshold (1-127)
    pub threshold: u8,
    /// Side of the square patch used for orientation and descriptors (odd)
    pub patch_size: usize,
    /// Upper bound on keypoints returned per image
    pub max_features: usize,
    /// Number of pyramid levels
    pub n_levels: usize,
    /// Downscale factor between consecutive pyramid levels
    pub scale_factor: f32,
    /// Border in pixels where no corner is reported
    pub edge_threshold: usize,
    /// Minimum distance between surviving corners on one level
    pub nms_distance: f32,
    pub n_threads: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            threshold: 20,
            patch_size: 31,
            max_features: 5000,
            n_levels: 8,
            scale_factor: 1.2,
            edge_threshold: 19,
            nms_distance: 3.0,
            n_threads: num_cpus::get().max(1),
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.threshold == 0 || self.threshold > 127 {
            return invalid("threshold", format!("{} (must be 1-127)", self.threshold));
        }
        if self.patch_size % 2 == 0 || self.patch_size < 7 {
            return invalid("patch_size", format!("{} (must be odd and >= 7)", self.patch_size));
        }
        if self.max_features == 0 {
            return invalid("max_features", "must be > 0");
        }
        if self.n_levels == 0 {
            return invalid("n_levels", "must be > 0");
        }
        if !(self.scale_factor > 1.0) {
            return invalid("scale_factor", format!("{} (must be > 1.0)", self.scale_factor));
        }
        if !(self.nms_distance >= 0.0) {
            return invalid("nms_distance", "must be >= 0");
        }
        Ok(())
    }
}

/// Matching and robust estimation settings
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct RegistrationConfig {
    /// Fraction of the sorted cross-checked matches kept for fitting
    pub keep_fraction: f64,
    /// Below this many retained matches no homography is attempted
    pub min_match_count: usize,
    /// Maximum reprojection error (pixels) for an inlier
    pub ransac_threshold: f64,
    pub ransac_max_iterations: usize,
    pub ransac_confidence: f64,
    /// Seed for the RANSAC sampler
    pub seed: u64,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            keep_fraction: 0.15,
            min_match_count: 10,
            ransac_threshold: 5.0,
            ransac_max_iterations: 2000,
            ransac_confidence: 0.995,
            seed: 0,
        }
    }
}

impl RegistrationConfig {
    pub fn validate(&self) -> Result<(), ParameterError> {
        if !(0.0..=1.0).contains(&self.keep_fraction) {
            return invalid("keep_fraction", format!("{} (must be in [0, 1])", self.keep_fraction));
        }
        if self.min_match_count < 4 {
            return invalid("min_match_count", format!("{} (a homography needs at least 4)", self.min_match_count));
        }
        if !(self.ransac_threshold > 0.0) {
            return invalid("ransac_threshold", "must be > 0");
        }
        if self.ransac_max_iterations == 0 {
            return invalid("ransac_max_iterations", "must be > 0");
        }
        if !(self.ransac_confidence > 0.0 && self.ransac_confidence < 1.0) {
            return invalid("ransac_confidence", "must be in (0, 1)");
        }
        Ok(())
    }
}

/// Initialize Rayon thread pool with the specified number of threads
pub fn init_thread_pool(n_threads: usize) -> Result<(), rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build_global()
}
