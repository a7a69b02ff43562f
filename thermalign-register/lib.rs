//! Registration of a thermal image onto a visible image: ORB features,
//! cross-checked Hamming matching, RANSAC homography, warp and blend.

pub mod error;
pub mod extractor;
pub mod homography;
pub mod matcher;
pub mod pipeline;
pub mod ransac;
pub mod warp;

pub use error::{BlendError, BlendResult};
pub use extractor::{Features, OrbExtractor};
pub use homography::{Correspondence, Homography};
pub use matcher::{HammingMatcher, cross_check_matches, hamming_distance, retain_best};
pub use pipeline::{Alignment, Registrar, Registration};
pub use ransac::{RansacParams, estimate_homography};
pub use warp::{DEFAULT_ALPHA, blend, clamp_alpha, overlay, warp_perspective};
