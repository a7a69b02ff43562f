use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;
use std::ffi::OsString;
use std::path::Path;
use thermalign_register::Alignment;

const INLIER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const RADIUS: i32 = 4;

/// Copy of `visible` with a circle at every inlier match
pub fn draw_inlier_keypoints(visible: &RgbImage, alignment: &Alignment) -> RgbImage {
    let mut output = visible.clone();
    for (x, y) in alignment.inlier_points() {
        draw_hollow_circle_mut(&mut output, (x.round() as i32, y.round() as i32), RADIUS, INLIER_COLOR);
    }
    output
}

/// `<output stem>_keypoints.png`
pub fn keypoints_file_name(output: &Path) -> OsString {
    let stem = output.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    format!("{}_keypoints.png", stem).into()
}
