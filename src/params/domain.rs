//! Parameter domains and their transforms to unconstrained space.
//!
//! `forward` maps unconstrained `z` to a constrained value, `inverse` goes
//! back, and `log_abs_det_jacobian` is `log|d value / d z|` at `z`:
//!
//! - `Real`: identity
//! - `Positive`: `exp(z)`, `log|J| = z`
//! - `Bounded{low, high}`: `low + (high - low) * sigmoid(z)`
//! - `Simplex` (length K, K-1 unconstrained values): stick-breaking with the
//!   offset that maps `z = 0` to the uniform simplex
//! - `Ordered`: first element free, then `x_i = x_{i-1} + exp(z_i)`

use serde::{Deserialize, Serialize};

use crate::math::{log_sigmoid, logit, sigmoid};

const SIMPLEX_SUM_TOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Domain {
    Real,
    Positive,
    Bounded { low: f64, high: f64 },
    Simplex,
    Ordered,
}

impl Domain {
    pub fn display_name(&self) -> String {
        match self {
            Domain::Real => "real".to_string(),
            Domain::Positive => "positive".to_string(),
            Domain::Bounded { low, high } => format!("bounded({low}, {high})"),
            Domain::Simplex => "simplex".to_string(),
            Domain::Ordered => "ordered".to_string(),
        }
    }

    /// Check `value` against the domain, describing the violated constraint.
    pub fn check(&self, value: &[f64]) -> Result<(), String> {
        if value.is_empty() {
            return Err("must have at least one element".to_string());
        }
        if let Some(v) = value.iter().find(|v| !v.is_finite()) {
            return Err(format!("must be finite (got {v})"));
        }
        match *self {
            Domain::Real => Ok(()),
            Domain::Positive => match value.iter().find(|&&v| v <= 0.0) {
                Some(v) => Err(format!("must be > 0 (got {v})")),
                None => Ok(()),
            },
            Domain::Bounded { low, high } => {
                if !(low < high) {
                    return Err(format!("has an empty interval ({low}, {high})"));
                }
                match value.iter().find(|&&v| v <= low || v >= high) {
                    Some(v) => Err(format!("must lie in ({low}, {high}) (got {v})")),
                    None => Ok(()),
                }
            }
            Domain::Simplex => {
                if value.len() < 2 {
                    return Err("simplex must have at least 2 elements".to_string());
                }
                if let Some(v) = value.iter().find(|&&v| v < 0.0) {
                    return Err(format!("simplex elements must be >= 0 (got {v})"));
                }
                let sum: f64 = value.iter().sum();
                if (sum - 1.0).abs() > SIMPLEX_SUM_TOL {
                    return Err(format!("simplex elements must sum to 1 (got {sum})"));
                }
                Ok(())
            }
            Domain::Ordered => {
                if let Some(w) = value.windows(2).find(|w| w[1] <= w[0]) {
                    return Err(format!(
                        "must be strictly increasing (got {} then {})",
                        w[0], w[1]
                    ));
                }
                Ok(())
            }
        }
    }

    pub fn contains(&self, value: &[f64]) -> bool {
        self.check(value).is_ok()
    }

    /// Number of unconstrained coordinates for a value of length `len`.
    pub fn unconstrained_len(&self, len: usize) -> usize {
        match self {
            Domain::Simplex => len.saturating_sub(1),
            _ => len,
        }
    }

    /// Unconstrained `z` to constrained value.
    pub fn forward(&self, z: &[f64]) -> Vec<f64> {
        match *self {
            Domain::Real => z.to_vec(),
            Domain::Positive => z.iter().map(|v| v.exp()).collect(),
            Domain::Bounded { low, high } => {
                z.iter().map(|&v| low + (high - low) * sigmoid(v)).collect()
            }
            Domain::Simplex => {
                let k = z.len() + 1;
                let mut out = Vec::with_capacity(k);
                let mut stick = 1.0;
                for (i, &zi) in z.iter().enumerate() {
                    let frac = sigmoid(zi + stick_offset(k, i));
                    let x = stick * frac;
                    out.push(x);
                    stick -= x;
                }
                out.push(stick.max(0.0));
                out
            }
            Domain::Ordered => {
                let mut out = Vec::with_capacity(z.len());
                for (i, &zi) in z.iter().enumerate() {
                    if i == 0 {
                        out.push(zi);
                    } else {
                        let prev = out[i - 1];
                        out.push(prev + zi.exp());
                    }
                }
                out
            }
        }
    }

    /// Constrained value to unconstrained `z`.
    pub fn inverse(&self, value: &[f64]) -> Vec<f64> {
        match *self {
            Domain::Real => value.to_vec(),
            Domain::Positive => value.iter().map(|v| v.ln()).collect(),
            Domain::Bounded { low, high } => {
                value.iter().map(|&v| logit((v - low) / (high - low))).collect()
            }
            Domain::Simplex => {
                let k = value.len();
                let mut z = Vec::with_capacity(k.saturating_sub(1));
                let mut stick = 1.0;
                for (i, &x) in value.iter().take(k.saturating_sub(1)).enumerate() {
                    let frac = if stick > 0.0 { x / stick } else { 0.5 };
                    z.push(logit(frac) - stick_offset(k, i));
                    stick -= x;
                }
                z
            }
            Domain::Ordered => value
                .iter()
                .enumerate()
                .map(|(i, &v)| if i == 0 { v } else { (v - value[i - 1]).ln() })
                .collect(),
        }
    }

    /// `log|det d forward(z) / dz|`.
    pub fn log_abs_det_jacobian(&self, z: &[f64]) -> f64 {
        match *self {
            Domain::Real => 0.0,
            Domain::Positive => z.iter().sum(),
            Domain::Bounded { low, high } => z
                .iter()
                .map(|&v| (high - low).ln() + log_sigmoid(v) + log_sigmoid(-v))
                .sum(),
            Domain::Simplex => {
                let k = z.len() + 1;
                let mut stick: f64 = 1.0;
                let mut total = 0.0;
                for (i, &zi) in z.iter().enumerate() {
                    let u = zi + stick_offset(k, i);
                    total += log_sigmoid(u) + log_sigmoid(-u) + stick.ln();
                    stick -= stick * sigmoid(u);
                }
                total
            }
            Domain::Ordered => z.iter().skip(1).sum(),
        }
    }

    /// Relative distance to the nearest boundary is below `tol`.
    pub fn near_boundary(&self, value: &[f64], tol: f64) -> bool {
        match *self {
            Domain::Real | Domain::Ordered => false,
            Domain::Positive => value.iter().any(|&v| v < tol),
            Domain::Bounded { low, high } => value.iter().any(|&v| {
                let u = (v - low) / (high - low);
                u < tol || u > 1.0 - tol
            }),
            Domain::Simplex => value.iter().any(|&v| v < tol),
        }
    }
}

/// Stick-breaking offset `-ln(K - 1 - i)` so that `z = 0` gives `1/K` everywhere.
fn stick_offset(k: usize, i: usize) -> f64 {
    -((k - 1 - i) as f64).ln()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn assert_round_trip(domain: Domain, value: &[f64]) {
        let z = domain.inverse(value);
        assert_eq!(z.len(), domain.unconstrained_len(value.len()));
        let back = domain.forward(&z);
        assert_eq!(back.len(), value.len());
        for (a, b) in back.iter().zip(value) {
            assert_relative_eq!(*a, *b, epsilon = 1e-10, max_relative = 1e-10);
        }
    }

    #[test]
    fn round_trips_every_domain() {
        assert_round_trip(Domain::Real, &[-3.0, 0.0, 12.5]);
        assert_round_trip(Domain::Positive, &[1e-3, 1.0, 250.0]);
        assert_round_trip(Domain::Bounded { low: -2.0, high: 5.0 }, &[-1.99, 0.0, 4.5]);
        assert_round_trip(Domain::Simplex, &[0.2, 0.5, 0.3]);
        assert_round_trip(Domain::Simplex, &[0.95, 0.05]);
        assert_round_trip(Domain::Ordered, &[-1.0, -0.5, 3.0, 3.001]);
    }

    #[test]
    fn simplex_origin_is_uniform() {
        let x = Domain::Simplex.forward(&[0.0, 0.0, 0.0]);
        for v in x {
            assert_relative_eq!(v, 0.25, epsilon = 1e-12);
        }
    }

    #[test]
    fn forward_lands_in_domain() {
        let z = [-4.0, 0.3, 2.5];
        for domain in [
            Domain::Real,
            Domain::Positive,
            Domain::Bounded { low: 0.0, high: 1.0 },
            Domain::Simplex,
            Domain::Ordered,
        ] {
            let x = domain.forward(&z);
            assert!(domain.contains(&x), "{} -> {x:?}", domain.display_name());
        }
    }

    #[test]
    fn check_reports_constraint() {
        let err = Domain::Positive.check(&[1.0, -0.5]).unwrap_err();
        assert!(err.contains("> 0"));
        assert!(Domain::Simplex.check(&[0.4, 0.4]).unwrap_err().contains("sum to 1"));
        assert!(Domain::Ordered.check(&[1.0, 1.0]).is_err());
        assert!(Domain::Bounded { low: 0.0, high: 1.0 }.check(&[1.0]).is_err());
    }

    fn numeric_log_jacobian(domain: Domain, z: &[f64]) -> f64 {
        // For the square transforms the Jacobian is triangular; for the simplex
        // use the first K-1 outputs, which determine the last.
        let n = z.len();
        let h = 1e-6;
        let mut jac = nalgebra::DMatrix::<f64>::zeros(n, n);
        for j in 0..n {
            let mut zp = z.to_vec();
            let mut zm = z.to_vec();
            zp[j] += h;
            zm[j] -= h;
            let fp = domain.forward(&zp);
            let fm = domain.forward(&zm);
            for i in 0..n {
                jac[(i, j)] = (fp[i] - fm[i]) / (2.0 * h);
            }
        }
        jac.determinant().abs().ln()
    }

    #[test]
    fn log_jacobian_matches_numeric_determinant() {
        let z = [0.4, -1.1, 0.7];
        for domain in [
            Domain::Positive,
            Domain::Bounded { low: -1.0, high: 3.0 },
            Domain::Simplex,
            Domain::Ordered,
        ] {
            assert_relative_eq!(
                domain.log_abs_det_jacobian(&z),
                numeric_log_jacobian(domain, &z),
                epsilon = 1e-5
            );
        }
    }

    proptest! {
        #[test]
        fn ordered_forward_is_strictly_increasing(z in prop::collection::vec(-5.0f64..5.0, 1..30)) {
            let x = Domain::Ordered.forward(&z);
            prop_assert_eq!(x.len(), z.len());
            for w in x.windows(2) {
                prop_assert!(w[1] > w[0], "{x:?}");
            }
            prop_assert!(Domain::Ordered.check(&x).is_ok());
            let back = Domain::Ordered.inverse(&x);
            for (a, b) in back.iter().zip(&z) {
                prop_assert!((a - b).abs() < 1e-6, "{back:?} vs {z:?}");
            }
        }
    }
}
