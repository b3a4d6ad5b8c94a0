use nalgebra::{Complex, DMatrix, DVector, Schur};
use tracing::debug;

use super::gaussian::GaussianFit;
use crate::error::FadError;

/// Offset added to both covariances when the eigenvalue computation on their
/// product fails the first time.
pub const DEFAULT_EPSILON: f64 = 1e-7;

/// Largest imaginary part tolerated in the square roots of the product's
/// eigenvalues before the result is declared meaningless.
const IMAG_TOLERANCE: f64 = 1e-3;

const SCHUR_MAX_ITER: usize = 10_000;

/// Fréchet distance between two Gaussian fits:
///
/// `||mu_a - mu_b||^2 + tr(cov_a) + tr(cov_b) - 2 tr(sqrt(cov_a cov_b))`
///
/// Zero for identical fits, growing as means drift apart or covariances
/// stop overlapping. `epsilon` is the stabilization offset forwarded to
/// [`stable_trace_sqrt_product`]; pass [`DEFAULT_EPSILON`] unless a caller
/// has a reason to tune it.
pub fn frechet_distance(
    a: &GaussianFit,
    b: &GaussianFit,
    epsilon: f64,
) -> Result<f64, FadError> {
    if a.dimension() != b.dimension() {
        return Err(FadError::DimensionMismatch {
            left: a.dimension(),
            right: b.dimension(),
        });
    }
    let mean_diff = a.mean() - b.mean();
    let trace_sqrt = stable_trace_sqrt_product(a.covariance(), b.covariance(), epsilon)?;
    Ok(mean_diff.dot(&mean_diff) + a.covariance().trace() + b.covariance().trace()
        - 2.0 * trace_sqrt)
}

/// Trace of the matrix square root of `sigma_a * sigma_b`.
///
/// The trace is taken over the square roots of the product's eigenvalues,
/// which equals `tr(sqrt(sigma_a sigma_b))` for the diagonalizable matrices
/// produced by covariance pairs. If the eigenvalue computation fails, both
/// inputs are offset by `epsilon` on the diagonal and the computation runs
/// once more; a second failure reports [`FadError::NotFinite`]. Square roots
/// with an imaginary part beyond tolerance mean the product strayed too far
/// from positive semi-definite, and the result would be garbage, so that
/// case is an error rather than a silently truncated number.
pub fn stable_trace_sqrt_product(
    sigma_a: &DMatrix<f64>,
    sigma_b: &DMatrix<f64>,
    epsilon: f64,
) -> Result<f64, FadError> {
    if sigma_a.nrows() != sigma_b.nrows() {
        return Err(FadError::DimensionMismatch {
            left: sigma_a.nrows(),
            right: sigma_b.nrows(),
        });
    }

    let spectrum = match product_spectrum(&(sigma_a * sigma_b)) {
        Some(spectrum) => spectrum,
        None => {
            debug!("Eigenvalue computation failed, retrying with offset {epsilon:e}");
            let offset = DMatrix::identity(sigma_a.nrows(), sigma_a.ncols()) * epsilon;
            let retried = (sigma_a + &offset) * (sigma_b + &offset);
            product_spectrum(&retried).ok_or(FadError::NotFinite)?
        }
    };

    let mut trace = 0.0;
    let mut max_imag = 0.0_f64;
    for eigenvalue in spectrum.iter() {
        let root = eigenvalue.sqrt();
        max_imag = max_imag.max(root.im.abs());
        trace += root.re;
    }
    if max_imag > IMAG_TOLERANCE {
        return Err(FadError::ComplexResidue { max_imag });
    }
    Ok(trace)
}

/// Complex eigenvalues of `matrix`, or `None` when the input is non-finite
/// or the Schur iteration does not converge.
fn product_spectrum(matrix: &DMatrix<f64>) -> Option<DVector<Complex<f64>>> {
    if matrix.iter().any(|value| !value.is_finite()) {
        return None;
    }
    let schur = Schur::try_new(matrix.clone(), f64::EPSILON, SCHUR_MAX_ITER)?;
    let eigenvalues = schur.complex_eigenvalues();
    if eigenvalues
        .iter()
        .any(|value| !value.re.is_finite() || !value.im.is_finite())
    {
        return None;
    }
    Some(eigenvalues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fit(mean: &[f64], covariance: DMatrix<f64>) -> GaussianFit {
        GaussianFit::from_parts(DVector::from_column_slice(mean), covariance).unwrap()
    }

    #[test]
    fn identical_fits_have_zero_distance() {
        let covariance = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
        let a = fit(&[1.0, -2.0], covariance.clone());
        let b = fit(&[1.0, -2.0], covariance);

        let distance = frechet_distance(&a, &b, DEFAULT_EPSILON).unwrap();
        assert!(distance.abs() < 1e-9, "distance {distance}");
    }

    #[test]
    fn mean_shift_alone_gives_squared_norm() {
        let a = fit(&[0.0, 0.0], DMatrix::identity(2, 2));
        let b = fit(&[3.0, 4.0], DMatrix::identity(2, 2));

        let distance = frechet_distance(&a, &b, DEFAULT_EPSILON).unwrap();
        assert!((distance - 25.0).abs() < 1e-9, "distance {distance}");
    }

    #[test]
    fn one_dimensional_closed_form() {
        // (m_a - m_b)^2 + (sqrt(v_a) - sqrt(v_b))^2 for scalar Gaussians.
        let a = fit(&[0.0], DMatrix::from_element(1, 1, 4.0));
        let b = fit(&[3.0], DMatrix::from_element(1, 1, 1.0));

        let distance = frechet_distance(&a, &b, DEFAULT_EPSILON).unwrap();
        assert!((distance - 10.0).abs() < 1e-9, "distance {distance}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = fit(
            &[0.5, -1.5],
            DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]),
        );
        let b = fit(
            &[-0.25, 2.0],
            DMatrix::from_row_slice(2, 2, &[1.5, -0.5, -0.5, 4.0]),
        );

        let forward = frechet_distance(&a, &b, DEFAULT_EPSILON).unwrap();
        let backward = frechet_distance(&b, &a, DEFAULT_EPSILON).unwrap();
        assert!((forward - backward).abs() < 1e-9);
        assert!(forward > 0.0);
    }

    #[test]
    fn mismatched_dimensions_are_rejected() {
        let a = fit(&[0.0, 0.0], DMatrix::identity(2, 2));
        let b = fit(&[0.0, 0.0, 0.0], DMatrix::identity(3, 3));

        let err = frechet_distance(&a, &b, DEFAULT_EPSILON).unwrap_err();
        assert!(matches!(
            err,
            FadError::DimensionMismatch { left: 2, right: 3 }
        ));
    }

    #[test]
    fn diagonal_product_has_analytic_trace() {
        // diag(4, 9) * diag(1, 16) = diag(4, 144); trace of sqrt is 2 + 12.
        let a = DMatrix::from_diagonal(&DVector::from_column_slice(&[4.0, 9.0]));
        let b = DMatrix::from_diagonal(&DVector::from_column_slice(&[1.0, 16.0]));

        let trace = stable_trace_sqrt_product(&a, &b, DEFAULT_EPSILON).unwrap();
        assert!((trace - 14.0).abs() < 1e-9, "trace {trace}");
    }

    #[test]
    fn well_conditioned_inputs_never_take_the_retry_branch() {
        let a = DMatrix::from_row_slice(2, 2, &[3.0, 1.0, 1.0, 2.0]);
        let b = DMatrix::from_row_slice(2, 2, &[1.5, -0.5, -0.5, 4.0]);

        let tight = stable_trace_sqrt_product(&a, &b, DEFAULT_EPSILON).unwrap();
        let huge = stable_trace_sqrt_product(&a, &b, 10.0).unwrap();
        // Bitwise equality: the offset is only ever applied on the retry, so
        // a well-conditioned product must be oblivious to it.
        assert_eq!(tight.to_bits(), huge.to_bits());
    }

    #[test]
    fn singular_covariance_still_yields_finite_trace() {
        // Rank-1 covariance; the product has a zero eigenvalue.
        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        let other = DMatrix::from_row_slice(2, 2, &[2.0, 0.0, 0.0, 3.0]);

        let trace = stable_trace_sqrt_product(&singular, &other, DEFAULT_EPSILON).unwrap();
        assert!(trace.is_finite());
        assert!(trace >= 0.0);
    }

    #[test]
    fn non_finite_input_is_an_error() {
        let mut bad = DMatrix::identity(2, 2);
        bad[(0, 1)] = f64::NAN;

        let err = stable_trace_sqrt_product(&bad, &DMatrix::identity(2, 2), DEFAULT_EPSILON)
            .unwrap_err();
        assert!(matches!(err, FadError::NotFinite));
    }

    #[test]
    fn negative_spectrum_reports_complex_residue() {
        // -I * I has eigenvalues of -1; their square roots are purely
        // imaginary, far beyond what the tolerance accepts.
        let negated = DMatrix::identity(2, 2) * -1.0;

        let err = stable_trace_sqrt_product(&negated, &DMatrix::identity(2, 2), DEFAULT_EPSILON)
            .unwrap_err();
        match err {
            FadError::ComplexResidue { max_imag } => {
                assert!((max_imag - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
