use nalgebra::{DMatrix, Matrix3, Point2, Vector3};

/// Point pair: `src` in the thermal image, `dst` in the visible image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    pub src: Point2<f64>,
    pub dst: Point2<f64>,
}

impl Correspondence {
    pub fn new(src: (f64, f64), dst: (f64, f64)) -> Self {
        Self {
            src: Point2::new(src.0, src.1),
            dst: Point2::new(dst.0, dst.1),
        }
    }
}

/// Projective transform from source to destination coordinates,
/// with the inlier mask of the correspondences it was fitted on.
#[derive(Debug, Clone, PartialEq)]
pub struct Homography {
    /// Normalised so that `matrix[(2, 2)] == 1`
    pub matrix: Matrix3<f64>,
    pub inliers: Vec<bool>,
}

impl Homography {
    pub fn identity() -> Self {
        Self {
            matrix: Matrix3::identity(),
            inliers: Vec::new(),
        }
    }

    pub fn inlier_count(&self) -> usize {
        self.inliers.iter().filter(|&&inlier| inlier).count()
    }

    /// Map a source point; `None` when it lands on the line at infinity
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        project(&self.matrix, &Point2::new(x, y)).map(|p| (p.x, p.y))
    }

    pub fn inverse(&self) -> Option<Matrix3<f64>> {
        self.matrix.try_inverse()
    }
}

/// Apply `h` to `p` in homogeneous coordinates
pub fn project(h: &Matrix3<f64>, p: &Point2<f64>) -> Option<Point2<f64>> {
    let v = h * Vector3::new(p.x, p.y, 1.0);
    if v.z.abs() < f64::EPSILON {
        return None;
    }
    Some(Point2::new(v.x / v.z, v.y / v.z))
}

/// Euclidean distance between `h(src)` and `dst`; infinite when unprojectable
pub fn transfer_error(h: &Matrix3<f64>, c: &Correspondence) -> f64 {
    match project(h, &c.src) {
        Some(p) => (p - c.dst).norm(),
        None => f64::INFINITY,
    }
}

/// Similarity moving the centroid to the origin with mean distance sqrt(2)
fn normalization(points: &[Point2<f64>]) -> Option<Matrix3<f64>> {
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    let (cx, cy) = (sx / n, sy / n);
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    if !(mean_dist > f64::EPSILON) {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;

    Some(Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0))
}

/// Normalised direct linear transform.
///
/// Least-squares fit for more than four correspondences. Returns `None` for
/// fewer than four, for coincident points, or when the result is singular.
pub fn fit_homography(correspondences: &[Correspondence]) -> Option<Matrix3<f64>> {
    let n = correspondences.len();
    if n < 4 {
        return None;
    }

    let src: Vec<_> = correspondences.iter().map(|c| c.src).collect();
    let dst: Vec<_> = correspondences.iter().map(|c| c.dst).collect();
    let t_src = normalization(&src)?;
    let t_dst = normalization(&dst)?;

    // Pad with zero rows so the SVD always yields a full 9x9 V
    let mut a = DMatrix::<f64>::zeros((2 * n).max(9), 9);
    for (idx, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
        let s = t_src * Vector3::new(s.x, s.y, 1.0);
        let d = t_dst * Vector3::new(d.x, d.y, 1.0);
        let (x, y) = (s.x, s.y);
        let (u, v) = (d.x, d.y);

        let rx = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u];
        let ry = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y, -v];
        for col in 0..9 {
            a[(2 * idx, col)] = rx[col];
            a[(2 * idx + 1, col)] = ry[col];
        }
    }

    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let (min_idx, _) = svd
        .singular_values
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))?;
    let null = v_t.row(min_idx);

    let h_norm = Matrix3::from_iterator(null.iter().cloned()).transpose();
    let h = t_dst.try_inverse()? * h_norm * t_src;

    normalize_matrix(h)
}

/// Scale so that `h[(2, 2)] == 1`, rejecting non-finite or singular matrices
pub fn normalize_matrix(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let scale = h[(2, 2)];
    if scale.abs() < 1e-12 {
        return None;
    }
    let h = h / scale;
    if !h.iter().all(|v| v.is_finite()) || h.determinant().abs() < 1e-12 {
        return None;
    }
    Some(h)
}

fn cross(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

fn nearly_collinear(o: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    let scale = (a - o).norm() * (b - o).norm();
    cross(o, a, b).abs() <= 1e-6 * scale.max(f64::EPSILON)
}

/// True when a 4-point sample cannot define a proper homography: three points
/// collinear in either image, or a triangle whose orientation flips between
/// the two images.
pub fn is_degenerate_sample(sample: &[Correspondence]) -> bool {
    if sample.len() != 4 {
        return true;
    }
    const TRIPLES: [(usize, usize, usize); 4] = [(0, 1, 2), (1, 2, 3), (2, 3, 0), (3, 0, 1)];

    TRIPLES.iter().any(|&(i, j, k)| {
        let (s, d) = (
            (&sample[i].src, &sample[j].src, &sample[k].src),
            (&sample[i].dst, &sample[j].dst, &sample[k].dst),
        );
        nearly_collinear(s.0, s.1, s.2)
            || nearly_collinear(d.0, d.1, d.2)
            || cross(s.0, s.1, s.2).signum() != cross(d.0, d.1, d.2).signum()
    })
}
