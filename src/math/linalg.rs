//! Small dense linear algebra for the Gaussian posterior approximation.
//!
//! Dimensions are tiny (tens of parameters), so plain `nalgebra` dense
//! matrices are enough.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Cholesky factor of a symmetric matrix, adding diagonal jitter if needed.
///
/// Finite-difference Hessians are only approximately positive definite, so we
/// try progressively larger ridge terms before giving up.
pub fn cholesky_with_jitter(matrix: &DMatrix<f64>) -> Option<(Cholesky<f64, Dyn>, f64)> {
    let sym = (matrix + matrix.transpose()) * 0.5;
    let scale = sym
        .diagonal()
        .iter()
        .map(|v| v.abs())
        .fold(0.0_f64, f64::max)
        .max(1.0);

    for &jitter in &[0.0, 1e-10, 1e-8, 1e-6, 1e-4] {
        let mut candidate = sym.clone();
        for i in 0..candidate.nrows() {
            candidate[(i, i)] += jitter * scale;
        }
        if let Some(chol) = candidate.cholesky() {
            if chol.l().iter().all(|v| v.is_finite()) {
                return Some((chol, jitter * scale));
            }
        }
    }
    None
}

/// Draw `mean + L^-T eps` for a precision matrix factored as `L L^T`.
///
/// The result is distributed as `Normal(mean, precision^-1)`.
pub fn sample_from_precision(
    mean: &DVector<f64>,
    precision_chol: &Cholesky<f64, Dyn>,
    eps: &DVector<f64>,
) -> Option<DVector<f64>> {
    let lt = precision_chol.l().transpose();
    let offset = lt.solve_upper_triangular(eps)?;
    Some(mean + offset)
}
