//! Multilateration primitives
//!
//! Stateless estimators turning a set of (reference position, range,
//! confidence) samples into a position. None of them know about the graph.

use crate::core::{Dimensions, Point, HOP_SCALE_WINDOW, SINGULAR_EPSILON};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A reference position with its measured range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: Point,
    /// Metric range, or a hop count for [`hop_triangulate`]
    pub range: f64,
    pub confidence: f64,
}

impl Sample {
    pub fn new(position: Point, range: f64) -> Self {
        Self {
            position,
            range,
            confidence: 1.0,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}

/// Position estimate and its mean absolute range residual
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub position: Point,
    pub residual: f64,
}

/// Position estimate from hop counts and the hop-to-distance scale used
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopFix {
    pub position: Point,
    pub scale: f64,
}

/// Reasons a multilateration attempt yields no usable position
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MultilaterationError {
    #[error("underdetermined: {samples} samples, at least {required} required")]
    Underdetermined { samples: usize, required: usize },

    #[error("singular system: reference positions do not span the space")]
    Singular,

    #[error("estimated hop scale is not positive")]
    NonPositiveScale,

    #[error("hop scale correction {correction:.3} outside accepted window")]
    ScaleCorrection { correction: f64 },
}

/// Position estimator used by the refinement engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Linearised least squares, see [`triangulate`]
    #[default]
    LeastSquares,
    /// Bounding-box intersection, see [`savvides_min_max`]
    MinMax,
}

impl Estimator {
    pub fn estimate(
        self,
        dims: Dimensions,
        samples: &[Sample],
        use_confidences: bool,
    ) -> Result<Fix, MultilaterationError> {
        match self {
            Estimator::LeastSquares => triangulate(dims, samples, use_confidences),
            Estimator::MinMax => savvides_min_max(dims, samples, use_confidences),
        }
    }
}

/// Least-squares multilateration.
///
/// Needs more than `dims` samples. The range equations are linearised
/// against the last sample, then solved a second time against the first
/// estimate (with range zero) so every input sample contributes one equation.
pub fn triangulate(
    dims: Dimensions,
    samples: &[Sample],
    use_confidences: bool,
) -> Result<Fix, MultilaterationError> {
    let n = samples.len();
    if n <= dims.count() {
        return Err(MultilaterationError::Underdetermined {
            samples: n,
            required: dims.count() + 1,
        });
    }

    let reference = samples[n - 1];
    let first = linearised_solve(
        dims,
        &samples[..n - 1],
        &reference.position,
        reference.range,
        use_confidences,
    )?;
    let position = linearised_solve(dims, samples, &first, 0.0, use_confidences)?;

    Ok(Fix {
        position,
        residual: weighted_residual(dims, samples, &position, use_confidences),
    })
}

/// Min-max (bounding box) estimate: the centre of the intersection of the
/// axis-aligned boxes `[p - r, p + r]` around every sample.
pub fn savvides_min_max(
    dims: Dimensions,
    samples: &[Sample],
    use_confidences: bool,
) -> Result<Fix, MultilaterationError> {
    if samples.is_empty() {
        return Err(MultilaterationError::Underdetermined {
            samples: 0,
            required: 1,
        });
    }

    let mut position = Point::zeros();
    for d in 0..dims.count() {
        let lower = samples
            .iter()
            .map(|s| s.position[d] - s.range)
            .fold(f64::NEG_INFINITY, f64::max);
        let upper = samples
            .iter()
            .map(|s| s.position[d] + s.range)
            .fold(f64::INFINITY, f64::min);
        position[d] = (lower + upper) / 2.0;
    }

    Ok(Fix {
        position,
        residual: weighted_residual(dims, samples, &position, use_confidences),
    })
}

/// Multilateration from hop counts.
///
/// `sample.range` holds the hop count. The first pass solves jointly for the
/// position and the squared hop-to-distance scale; the second pass rescales
/// the hop counts and solves again around the first estimate. The result is
/// rejected unless the second pass confirms the scale within
/// [`HOP_SCALE_WINDOW`].
pub fn hop_triangulate(dims: Dimensions, samples: &[Sample]) -> Result<HopFix, MultilaterationError> {
    let n = samples.len();
    if n <= dims.count() + 1 {
        return Err(MultilaterationError::Underdetermined {
            samples: n,
            required: dims.count() + 2,
        });
    }

    let reference = samples[n - 1];
    let (first, scale_sq) = scaled_solve(dims, &samples[..n - 1], &reference.position, reference.range)?;
    if scale_sq <= 0.0 {
        return Err(MultilaterationError::NonPositiveScale);
    }
    let scale = scale_sq.sqrt();

    let rescaled: Vec<Sample> = samples
        .iter()
        .map(|s| Sample::new(s.position, s.range * scale))
        .collect();
    let (position, correction_sq) = scaled_solve(dims, &rescaled, &first, 0.0)?;
    if correction_sq <= 0.0 {
        return Err(MultilaterationError::NonPositiveScale);
    }
    let correction = check_scale_correction(correction_sq.sqrt())?;

    Ok(HopFix {
        position,
        scale: correction * scale,
    })
}

/// Accept a second-pass scale correction only inside [`HOP_SCALE_WINDOW`]
pub fn check_scale_correction(correction: f64) -> Result<f64, MultilaterationError> {
    let (low, high) = HOP_SCALE_WINDOW;
    if (low..=high).contains(&correction) {
        Ok(correction)
    } else {
        Err(MultilaterationError::ScaleCorrection { correction })
    }
}

/// Confidence-weighted mean absolute difference between each range and the
/// distance from `position` to its sample
pub fn weighted_residual(
    dims: Dimensions,
    samples: &[Sample],
    position: &Point,
    use_confidences: bool,
) -> f64 {
    let mut residual = 0.0;
    let mut sum_c = 0.0;
    for sample in samples {
        let c = if use_confidences { sample.confidence } else { 1.0 };
        residual += c * (sample.range - dims.distance(position, &sample.position)).abs();
        sum_c += c;
    }
    if sum_c > 0.0 {
        residual / sum_c
    } else {
        0.0
    }
}

fn squared_norm(dims: Dimensions, p: &Point) -> f64 {
    (0..dims.count()).map(|d| p[d] * p[d]).sum()
}

/// Subtract the reference equation `|x - p_r|^2 = r_r^2` from every row
/// equation `|x - p_i|^2 = r_i^2` and solve the resulting linear system.
fn linearised_solve(
    dims: Dimensions,
    rows: &[Sample],
    reference: &Point,
    reference_range: f64,
    use_confidences: bool,
) -> Result<Point, MultilaterationError> {
    let k = dims.count();
    let ref_norm = squared_norm(dims, reference);
    let mut a = DMatrix::<f64>::zeros(rows.len(), k);
    let mut b = DVector::<f64>::zeros(rows.len());

    for (i, sample) in rows.iter().enumerate() {
        let w = if use_confidences { sample.confidence.max(0.0).sqrt() } else { 1.0 };
        for d in 0..k {
            a[(i, d)] = w * 2.0 * (reference[d] - sample.position[d]);
        }
        b[i] = w
            * (sample.range.powi(2) - reference_range.powi(2) - squared_norm(dims, &sample.position)
                + ref_norm);
    }

    let solution = solve_least_squares(a, b)?;
    Ok(dims.point(solution.as_slice()))
}

/// Like [`linearised_solve`] with the squared scale as an extra unknown:
/// `|x - p_i|^2 = s^2 h_i^2`. Returns the position and `s^2`.
fn scaled_solve(
    dims: Dimensions,
    rows: &[Sample],
    reference: &Point,
    reference_hops: f64,
) -> Result<(Point, f64), MultilaterationError> {
    let k = dims.count();
    let ref_norm = squared_norm(dims, reference);
    let mut a = DMatrix::<f64>::zeros(rows.len(), k + 1);
    let mut b = DVector::<f64>::zeros(rows.len());

    for (i, sample) in rows.iter().enumerate() {
        for d in 0..k {
            a[(i, d)] = 2.0 * (reference[d] - sample.position[d]);
        }
        a[(i, k)] = -(sample.range.powi(2) - reference_hops.powi(2));
        b[i] = ref_norm - squared_norm(dims, &sample.position);
    }

    let solution = solve_least_squares(a, b)?;
    Ok((dims.point(&solution.as_slice()[..k]), solution[k]))
}

fn solve_least_squares(a: DMatrix<f64>, b: DVector<f64>) -> Result<DVector<f64>, MultilaterationError> {
    let unknowns = a.ncols();
    if a.nrows() < unknowns {
        return Err(MultilaterationError::Singular);
    }
    let svd = a.svd(true, true);
    if svd.rank(SINGULAR_EPSILON) < unknowns {
        return Err(MultilaterationError::Singular);
    }
    let solution = svd
        .solve(&b, SINGULAR_EPSILON)
        .map_err(|_| MultilaterationError::Singular)?;
    if solution.iter().all(|v| v.is_finite()) {
        Ok(solution)
    } else {
        Err(MultilaterationError::Singular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn exact_samples(dims: Dimensions, truth: &Point, refs: &[Point]) -> Vec<Sample> {
        refs.iter()
            .map(|p| Sample::new(*p, dims.distance(truth, p)))
            .collect()
    }

    fn square_corners() -> Vec<Point> {
        vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
            Point::new(0.0, 10.0, 0.0),
            Point::new(10.0, 10.0, 0.0),
        ]
    }

    #[test]
    fn test_triangulate_recovers_square_centre() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let samples = exact_samples(Dimensions::Two, &truth, &square_corners());
        let fix = triangulate(Dimensions::Two, &samples, false).unwrap();
        assert_abs_diff_eq!(fix.position.x, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fix.position.y, 5.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fix.residual, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangulate_minimal_sample_count_3d() {
        let truth = Point::new(3.0, 7.0, 2.5);
        let refs = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
            Point::new(0.0, 10.0, 0.0),
            Point::new(0.0, 0.0, 10.0),
        ];
        let samples = exact_samples(Dimensions::Three, &truth, &refs);
        let fix = triangulate(Dimensions::Three, &samples, true).unwrap();
        assert_abs_diff_eq!((fix.position - truth).norm(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fix.residual, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_triangulate_rejects_underdetermined() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let samples = exact_samples(Dimensions::Two, &truth, &square_corners()[..2]);
        assert_eq!(
            triangulate(Dimensions::Two, &samples, false),
            Err(MultilaterationError::Underdetermined { samples: 2, required: 3 })
        );
        assert!(triangulate(Dimensions::Two, &[], false).is_err());
    }

    #[test]
    fn test_triangulate_rejects_collinear_references() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let refs = vec![
            Point::new(0.0, 0.0, 0.0),
            Point::new(5.0, 0.0, 0.0),
            Point::new(10.0, 0.0, 0.0),
        ];
        let samples = exact_samples(Dimensions::Two, &truth, &refs);
        assert_eq!(
            triangulate(Dimensions::Two, &samples, false),
            Err(MultilaterationError::Singular)
        );
    }

    #[test]
    fn test_residual_uses_confidence_weights() {
        let samples = vec![
            Sample::new(Point::new(0.0, 0.0, 0.0), 1.0).with_confidence(3.0),
            Sample::new(Point::new(2.0, 0.0, 0.0), 3.0).with_confidence(1.0),
        ];
        let at = Point::new(1.0, 0.0, 0.0);
        // deviations 0 and 2
        assert_abs_diff_eq!(weighted_residual(Dimensions::Two, &samples, &at, true), 0.5);
        assert_abs_diff_eq!(weighted_residual(Dimensions::Two, &samples, &at, false), 1.0);
    }

    #[test]
    fn test_min_max_box_centre() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let samples = exact_samples(Dimensions::Two, &truth, &square_corners());
        let fix = savvides_min_max(Dimensions::Two, &samples, false).unwrap();
        // every box is [p - 7.07, p + 7.07]; intersection is symmetric around the centre
        assert_abs_diff_eq!(fix.position.x, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(fix.position.y, 5.0, epsilon = 1e-9);
        assert!(savvides_min_max(Dimensions::Two, &[], false).is_err());
    }

    #[test]
    fn test_min_max_off_centre_bounds() {
        let samples = vec![
            Sample::new(Point::new(0.0, 0.0, 0.0), 4.0),
            Sample::new(Point::new(6.0, 0.0, 0.0), 4.0),
        ];
        let fix = savvides_min_max(Dimensions::Two, &samples, false).unwrap();
        // x in [2, 4], y in [-4, 4]
        assert_abs_diff_eq!(fix.position.x, 3.0);
        assert_abs_diff_eq!(fix.position.y, 0.0);
    }

    #[test]
    fn test_hop_triangulate_consistent_hops() {
        let truth = Point::new(4.0, 6.0, 0.0);
        let hop_length = 2.5;
        let mut refs = square_corners();
        refs.push(Point::new(5.0, -3.0, 0.0));
        let samples: Vec<Sample> = refs
            .iter()
            .map(|p| Sample::new(*p, Dimensions::Two.distance(&truth, p) / hop_length))
            .collect();

        let fix = hop_triangulate(Dimensions::Two, &samples).unwrap();
        assert_abs_diff_eq!((fix.position - truth).norm(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fix.scale, hop_length, epsilon = 1e-6);
    }

    #[test]
    fn test_hop_triangulate_rejects_inconsistent_hops() {
        let mut refs = square_corners();
        refs.push(Point::new(5.0, -5.0, 0.0));
        let samples: Vec<Sample> = refs
            .iter()
            .zip([1.0, 1.0, 1.0, 1.0, 5.0])
            .map(|(p, hops)| Sample::new(*p, hops))
            .collect();

        match hop_triangulate(Dimensions::Two, &samples) {
            Err(MultilaterationError::ScaleCorrection { correction }) => {
                assert_abs_diff_eq!(correction, 1.48, epsilon = 0.01);
            }
            other => panic!("expected a rejected scale correction, got {other:?}"),
        }
    }

    #[test]
    fn test_hop_triangulate_needs_extra_sample() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let samples = exact_samples(Dimensions::Two, &truth, &square_corners()[..3]);
        assert_eq!(
            hop_triangulate(Dimensions::Two, &samples),
            Err(MultilaterationError::Underdetermined { samples: 3, required: 4 })
        );
    }

    #[test]
    fn test_scale_correction_window() {
        assert!(matches!(
            check_scale_correction(1.5),
            Err(MultilaterationError::ScaleCorrection { .. })
        ));
        assert_eq!(check_scale_correction(1.02), Ok(1.02));
        assert!(check_scale_correction(0.9).is_ok());
        assert!(check_scale_correction(0.89).is_err());
    }

    #[test]
    fn test_estimator_dispatch() {
        let truth = Point::new(5.0, 5.0, 0.0);
        let samples = exact_samples(Dimensions::Two, &truth, &square_corners());
        for estimator in [Estimator::LeastSquares, Estimator::MinMax] {
            let fix = estimator.estimate(Dimensions::Two, &samples, true).unwrap();
            assert_abs_diff_eq!(fix.position.x, 5.0, epsilon = 1e-6);
        }
    }
}
