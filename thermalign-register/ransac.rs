use nalgebra::Matrix3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::homography::{Correspondence, Homography, fit_homography, is_degenerate_sample, transfer_error};

/// A model RANSAC can hypothesise from minimal samples
pub trait Model {
    type Point: Clone;
    type Params;

    /// Points needed for one hypothesis
    const SAMPLE_SIZE: usize;

    fn estimate(points: &[Self::Point]) -> Option<Self::Params>;
    fn residual(params: &Self::Params, point: &Self::Point) -> f64;

    fn is_degenerate(_sample: &[Self::Point]) -> bool {
        false
    }
}

/// Iteration control for [`ransac`]
#[derive(Debug, Clone, Copy)]
pub struct RansacParams {
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub seed: u64,
}

/// Best model found and its consensus mask
#[derive(Debug, Clone)]
pub struct RansacFit<P> {
    pub params: P,
    pub inliers: Vec<bool>,
    pub iterations: usize,
}

impl<P> RansacFit<P> {
    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&i| i).count()
    }
}

fn consensus<M: Model>(params: &M::Params, points: &[M::Point], threshold: f64) -> Vec<bool> {
    points.iter().map(|p| M::residual(params, p) < threshold).collect()
}

/// Iterations needed to draw one all-inlier sample with probability `confidence`
fn required_iterations(confidence: f64, inlier_ratio: f64, sample_size: usize, cap: usize) -> usize {
    let all_inliers = inlier_ratio.powi(sample_size as i32);
    if all_inliers >= 1.0 {
        return 1;
    }
    if all_inliers <= f64::EPSILON {
        return cap;
    }
    let n = (1.0 - confidence).ln() / (1.0 - all_inliers).ln();
    if n.is_finite() { (n.ceil() as usize).clamp(1, cap) } else { cap }
}

/// Seeded RANSAC with an adaptive iteration count.
///
/// The winning hypothesis is refitted on its consensus set; the refit is kept
/// only if it does not lose support.
pub fn ransac<M: Model>(points: &[M::Point], params: &RansacParams) -> Option<RansacFit<M::Params>> {
    if points.len() < M::SAMPLE_SIZE {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut best: Option<(M::Params, Vec<bool>, usize)> = None;
    let mut needed = params.max_iterations;
    let mut iterations = 0;

    while iterations < needed.min(params.max_iterations) {
        iterations += 1;
        let sample: Vec<M::Point> = points.choose_multiple(&mut rng, M::SAMPLE_SIZE).cloned().collect();
        if M::is_degenerate(&sample) {
            continue;
        }
        let Some(model) = M::estimate(&sample) else {
            continue;
        };

        let mask = consensus::<M>(&model, points, params.threshold);
        let count = mask.iter().filter(|&&i| i).count();
        if best.as_ref().is_none_or(|(_, _, c)| count > *c) {
            let ratio = count as f64 / points.len() as f64;
            needed = required_iterations(params.confidence, ratio, M::SAMPLE_SIZE, params.max_iterations);
            best = Some((model, mask, count));
        }
    }

    let (model, mask, count) = best?;
    if count < M::SAMPLE_SIZE {
        return None;
    }

    let support: Vec<M::Point> = points
        .iter()
        .zip(&mask)
        .filter(|&(_, &inlier)| inlier)
        .map(|(p, _)| p.clone())
        .collect();

    let (params_out, inliers) = match M::estimate(&support) {
        Some(refit) => {
            let refit_mask = consensus::<M>(&refit, points, params.threshold);
            if refit_mask.iter().filter(|&&i| i).count() >= count {
                (refit, refit_mask)
            } else {
                (model, mask)
            }
        }
        None => (model, mask),
    };

    Some(RansacFit {
        params: params_out,
        inliers,
        iterations,
    })
}

/// Homography hypotheses from 4 correspondences
pub struct HomographyModel;

impl Model for HomographyModel {
    type Point = Correspondence;
    type Params = Matrix3<f64>;

    const SAMPLE_SIZE: usize = 4;

    fn estimate(points: &[Correspondence]) -> Option<Matrix3<f64>> {
        fit_homography(points)
    }

    fn residual(h: &Matrix3<f64>, c: &Correspondence) -> f64 {
        transfer_error(h, c)
    }

    fn is_degenerate(sample: &[Correspondence]) -> bool {
        is_degenerate_sample(sample)
    }
}

/// Robust homography from putative correspondences; `None` when no model
/// with at least four inliers exists.
pub fn estimate_homography(correspondences: &[Correspondence], params: &RansacParams) -> Option<Homography> {
    let fit = ransac::<HomographyModel>(correspondences, params)?;
    if fit.inlier_count() < HomographyModel::SAMPLE_SIZE || fit.params.try_inverse().is_none() {
        return None;
    }
    log::debug!(
        "RANSAC: {}/{} inliers after {} iterations",
        fit.inlier_count(),
        correspondences.len(),
        fit.iterations
    );
    Some(Homography {
        matrix: fit.params,
        inliers: fit.inliers,
    })
}
