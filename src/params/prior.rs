//! Prior distributions over parameter values.
//!
//! Scalar priors apply element-wise to vector parameters; `Dirichlet` scores
//! the whole vector. `Flat` contributes nothing and cannot be sampled.

use rand::Rng;
use rand_distr::{Distribution, Exp, Gamma, LogNormal, Normal, Uniform};
use serde::{Deserialize, Serialize};
use statrs::function::gamma::ln_gamma;

use crate::math::{LN_SQRT_2PI, normal_logpdf};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "dist", rename_all = "snake_case")]
pub enum Prior {
    #[default]
    Flat,
    Normal {
        loc: f64,
        scale: f64,
    },
    HalfNormal {
        scale: f64,
    },
    LogNormal {
        loc: f64,
        scale: f64,
    },
    Uniform {
        low: f64,
        high: f64,
    },
    Exponential {
        rate: f64,
    },
    Dirichlet {
        concentration: Vec<f64>,
    },
}

impl Prior {
    /// Validate hyperparameters against a parameter of length `len`.
    pub fn validate(&self, len: usize) -> Result<(), String> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(format!("prior {name} must be finite and > 0 (got {v})"))
            }
        };
        match self {
            Prior::Flat => Ok(()),
            Prior::Normal { loc, scale } | Prior::LogNormal { loc, scale } => {
                if !loc.is_finite() {
                    return Err(format!("prior loc must be finite (got {loc})"));
                }
                positive("scale", *scale)
            }
            Prior::HalfNormal { scale } => positive("scale", *scale),
            Prior::Exponential { rate } => positive("rate", *rate),
            Prior::Uniform { low, high } => {
                if low.is_finite() && high.is_finite() && low < high {
                    Ok(())
                } else {
                    Err(format!("uniform prior needs finite low < high (got {low}, {high})"))
                }
            }
            Prior::Dirichlet { concentration } => {
                if concentration.len() != len {
                    return Err(format!(
                        "dirichlet concentration has {} entries for a parameter of length {len}",
                        concentration.len()
                    ));
                }
                concentration.iter().try_for_each(|&a| positive("concentration", a))
            }
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Prior::Flat)
    }

    /// Log prior density of `value`; `-inf` outside the prior's support.
    pub fn log_prob(&self, value: &[f64]) -> f64 {
        match self {
            Prior::Flat => 0.0,
            Prior::Normal { loc, scale } => {
                value.iter().map(|&v| normal_logpdf(v, *loc, *scale)).sum()
            }
            Prior::HalfNormal { scale } => value
                .iter()
                .map(|&v| {
                    if v < 0.0 {
                        f64::NEG_INFINITY
                    } else {
                        std::f64::consts::LN_2 + normal_logpdf(v, 0.0, *scale)
                    }
                })
                .sum(),
            Prior::LogNormal { loc, scale } => value
                .iter()
                .map(|&v| {
                    if v <= 0.0 {
                        f64::NEG_INFINITY
                    } else {
                        let z = (v.ln() - loc) / scale;
                        -0.5 * z * z - scale.ln() - LN_SQRT_2PI - v.ln()
                    }
                })
                .sum(),
            Prior::Uniform { low, high } => value
                .iter()
                .map(|&v| {
                    if v < *low || v > *high {
                        f64::NEG_INFINITY
                    } else {
                        -(high - low).ln()
                    }
                })
                .sum(),
            Prior::Exponential { rate } => value
                .iter()
                .map(|&v| if v < 0.0 { f64::NEG_INFINITY } else { rate.ln() - rate * v })
                .sum(),
            Prior::Dirichlet { concentration } => {
                if value.iter().any(|&v| v < 0.0) {
                    return f64::NEG_INFINITY;
                }
                let total: f64 = concentration.iter().sum();
                let norm = ln_gamma(total) - concentration.iter().map(|&a| ln_gamma(a)).sum::<f64>();
                norm + value
                    .iter()
                    .zip(concentration)
                    .map(|(&x, &a)| (a - 1.0) * x.ln())
                    .sum::<f64>()
            }
        }
    }

    /// Draw a value of length `len`, or `None` for a flat prior.
    pub fn sample<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Option<Vec<f64>> {
        match self {
            Prior::Flat => None,
            Prior::Normal { loc, scale } => {
                let dist = Normal::new(*loc, *scale).ok()?;
                Some((0..len).map(|_| dist.sample(rng)).collect())
            }
            Prior::HalfNormal { scale } => {
                let dist = Normal::new(0.0, *scale).ok()?;
                Some((0..len).map(|_| dist.sample(rng).abs()).collect())
            }
            Prior::LogNormal { loc, scale } => {
                let dist = LogNormal::new(*loc, *scale).ok()?;
                Some((0..len).map(|_| dist.sample(rng)).collect())
            }
            Prior::Uniform { low, high } => {
                let dist = Uniform::new(*low, *high);
                Some((0..len).map(|_| dist.sample(rng)).collect())
            }
            Prior::Exponential { rate } => {
                let dist = Exp::new(*rate).ok()?;
                Some((0..len).map(|_| dist.sample(rng)).collect())
            }
            Prior::Dirichlet { concentration } => {
                let mut draws = Vec::with_capacity(concentration.len());
                for &a in concentration {
                    let dist = Gamma::new(a, 1.0).ok()?;
                    draws.push(dist.sample(rng));
                }
                let total: f64 = draws.iter().sum();
                if !(total > 0.0) {
                    return None;
                }
                Some(draws.into_iter().map(|g| g / total).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn flat_prior_is_zero_and_unsampled() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(Prior::Flat.log_prob(&[1e9]), 0.0);
        assert!(Prior::Flat.sample(3, &mut rng).is_none());
    }

    #[test]
    fn uniform_dirichlet_is_constant_on_simplex() {
        let prior = Prior::Dirichlet { concentration: vec![1.0, 1.0, 1.0] };
        // Density of Dirichlet(1,1,1) is Gamma(3) = 2 everywhere.
        assert_relative_eq!(prior.log_prob(&[0.2, 0.3, 0.5]), 2f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(prior.log_prob(&[0.9, 0.05, 0.05]), 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn half_normal_excludes_negative_values() {
        let prior = Prior::HalfNormal { scale: 1.0 };
        assert_eq!(prior.log_prob(&[-0.1]), f64::NEG_INFINITY);
        assert_relative_eq!(
            prior.log_prob(&[0.0]),
            std::f64::consts::LN_2 - LN_SQRT_2PI,
            epsilon = 1e-12
        );
    }

    #[test]
    fn samples_lie_in_support() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = Prior::Dirichlet { concentration: vec![2.0, 5.0] }.sample(2, &mut rng).unwrap();
        assert_relative_eq!(d.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        let u = Prior::Uniform { low: 1.0, high: 2.0 }.sample(50, &mut rng).unwrap();
        assert!(u.iter().all(|&v| (1.0..2.0).contains(&v)));
        let e = Prior::Exponential { rate: 3.0 }.sample(50, &mut rng).unwrap();
        assert!(e.iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn validate_checks_hyperparameters() {
        assert!(Prior::Normal { loc: 0.0, scale: -1.0 }.validate(1).is_err());
        assert!(Prior::Dirichlet { concentration: vec![1.0] }.validate(2).is_err());
        assert!(Prior::Uniform { low: 2.0, high: 1.0 }.validate(1).is_err());
        assert!(Prior::LogNormal { loc: 0.0, scale: 0.5 }.validate(3).is_ok());
    }
}
