//! Gaussian (Laplace) approximation of the posterior at its mode.
//!
//! The precision matrix is the negative finite-difference Hessian of the
//! unconstrained log-density at the mode; draws are `mode + L^-T eps`.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::fit::LogDensity;
use crate::math::{cholesky_with_jitter, sample_from_precision};

#[derive(Debug, Clone)]
pub struct GaussianApproximation {
    mean: DVector<f64>,
    precision: Cholesky<f64, Dyn>,
    /// Diagonal ridge added to make the precision positive definite.
    pub jitter: f64,
}

impl GaussianApproximation {
    pub fn at_mode(target: &dyn LogDensity, mode: &[f64]) -> Result<Self> {
        let hessian = finite_difference_hessian(target, mode)?;
        let precision = -hessian;
        let (chol, jitter) = cholesky_with_jitter(&precision).ok_or_else(|| {
            Error::Computation("posterior curvature at the mode is not positive definite".into())
        })?;
        Ok(Self {
            mean: DVector::from_column_slice(mode),
            precision: chol,
            jitter,
        })
    }

    pub fn mean(&self) -> &[f64] {
        self.mean.as_slice()
    }

    pub fn covariance(&self) -> DMatrix<f64> {
        self.precision.inverse()
    }

    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<Vec<f64>>> {
        let dim = self.mean.len();
        (0..n)
            .map(|_| {
                let eps = DVector::<f64>::from_iterator(dim, (0..dim).map(|_| StandardNormal.sample(rng)));
                sample_from_precision(&self.mean, &self.precision, &eps)
                    .map(|x| x.as_slice().to_vec())
                    .ok_or_else(|| Error::Computation("triangular solve failed while sampling".into()))
            })
            .collect()
    }
}

/// Central-difference Hessian of `target` at `z`.
pub fn finite_difference_hessian(target: &dyn LogDensity, z: &[f64]) -> Result<DMatrix<f64>> {
    let n = z.len();
    let h: Vec<f64> = z.iter().map(|v| 1e-4 * v.abs().max(1.0)).collect();
    let f0 = target.log_density(z)?;
    if !f0.is_finite() {
        return Err(Error::Computation(format!("log density is not finite at the mode (got {f0})")));
    }

    let eval = |steps: &[(usize, f64)]| -> Result<f64> {
        let mut p = z.to_vec();
        for &(i, s) in steps {
            p[i] += s;
        }
        target.log_density(&p)
    };

    let pairs: Vec<(usize, usize)> = (0..n).flat_map(|i| (i..n).map(move |j| (i, j))).collect();
    let entries = pairs
        .par_iter()
        .map(|&(i, j)| {
            let value = if i == j {
                let fp = eval(&[(i, h[i])])?;
                let fm = eval(&[(i, -h[i])])?;
                (fp - 2.0 * f0 + fm) / (h[i] * h[i])
            } else {
                let fpp = eval(&[(i, h[i]), (j, h[j])])?;
                let fpm = eval(&[(i, h[i]), (j, -h[j])])?;
                let fmp = eval(&[(i, -h[i]), (j, h[j])])?;
                let fmm = eval(&[(i, -h[i]), (j, -h[j])])?;
                (fpp - fpm - fmp + fmm) / (4.0 * h[i] * h[j])
            };
            Ok((i, j, value))
        })
        .collect::<Result<Vec<_>>>()?;

    let mut hess = DMatrix::<f64>::zeros(n, n);
    for (i, j, v) in entries {
        if !v.is_finite() {
            return Err(Error::Computation(format!(
                "non-finite curvature for coordinates ({i}, {j})"
            )));
        }
        hess[(i, j)] = v;
        hess[(j, i)] = v;
    }
    Ok(hess)
}
