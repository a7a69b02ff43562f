use thermalign_core::{Image, Keypoint};

/// Scale information for pyramid levels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleLevel {
    pub level: usize,
    pub scale: f32,
    pub width: usize,
    pub height: usize,
}

/// Detection result for one pyramid level.
///
/// Keypoint coordinates are in the level's own pixel grid; see
/// [`LevelFeatures::base_keypoints`] for full-resolution coordinates.
#[derive(Debug, Clone)]
pub struct LevelFeatures {
    pub level: ScaleLevel,
    pub image: Image,
    pub keypoints: Vec<Keypoint>,
}

impl LevelFeatures {
    /// Keypoints rescaled into level-0 coordinates
    pub fn base_keypoints(&self) -> impl Iterator<Item = Keypoint> + '_ {
        let scale = self.level.scale;
        self.keypoints.iter().map(move |kp| Keypoint {
            x: (kp.x + 0.5) * scale - 0.5,
            y: (kp.y + 0.5) * scale - 0.5,
            ..*kp
        })
    }
}

/// Corner type classification for a ring pixel relative to the centre
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CornerType {
    Bright,
    Dark,
    None,
}
