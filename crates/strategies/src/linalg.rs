//! Least-squares helpers shared by the linear-in-parameters models.

use nalgebra::{DMatrix, DVector};

/// Ordinary least squares via SVD. `None` when the solve fails or any
/// coefficient is non-finite.
pub(crate) fn least_squares(design: DMatrix<f64>, target: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = design.svd(true, true);
    let coefficients = svd.solve(target, 1e-12).ok()?;
    coefficients.iter().all(|c| c.is_finite()).then_some(coefficients)
}

/// Ridge regression with a per-coefficient penalty:
/// minimises `|X b - y|^2 + sum(penalty_j * b_j^2)`.
///
/// Solved as ordinary least squares on `X` stacked over `diag(sqrt(penalty))`
/// so nearly collinear columns stay well conditioned.
pub(crate) fn ridge(design: &DMatrix<f64>, target: &DVector<f64>, penalties: &[f64]) -> Option<DVector<f64>> {
    let (rows, cols) = design.shape();
    if penalties.len() != cols {
        return None;
    }
    let augmented = DMatrix::from_fn(rows + cols, cols, |r, c| {
        if r < rows {
            design[(r, c)]
        } else if r - rows == c {
            penalties[c].max(0.0).sqrt()
        } else {
            0.0
        }
    });
    let padded = DVector::from_fn(rows + cols, |r, _| if r < rows { target[r] } else { 0.0 });
    least_squares(augmented, &padded)
}
