//! Adaptive random-walk Metropolis in unconstrained space.
//!
//! Each chain:
//!
//! - starts at the initial point (chains after the first are jittered)
//! - adapts during warmup: a global step scale is tuned in batches toward the
//!   target acceptance rate, and halfway through warmup the per-coordinate
//!   proposal scales are reset to the spread of the warmup draws so far
//! - keeps `draws` states after warmup with the proposal frozen
//!
//! Chains are independent, run in parallel, and each gets its own seed
//! derived from the base seed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::fit::LogDensity;

const ADAPT_BATCH: usize = 50;
const INIT_JITTER: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct SamplerConfig {
    pub chains: usize,
    pub warmup: usize,
    pub draws: usize,
    pub seed: u64,
    pub target_acceptance: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            chains: 4,
            warmup: 1000,
            draws: 1000,
            seed: 42,
            target_acceptance: 0.234,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chain {
    /// Post-warmup states in unconstrained space.
    pub draws: Vec<Vec<f64>>,
    /// Post-warmup acceptance rate.
    pub acceptance_rate: f64,
    pub evaluations: usize,
}

/// Seed for chain `chain` (SplitMix64 step over the base seed).
pub fn chain_seed(seed: u64, chain: usize) -> u64 {
    let mut z = seed.wrapping_add((chain as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

pub fn sample_chains(target: &dyn LogDensity, init: &[f64], config: &SamplerConfig) -> Result<Vec<Chain>> {
    if config.chains == 0 || config.draws == 0 {
        return Err(Error::Config("sampling needs at least one chain and one draw".into()));
    }
    (0..config.chains)
        .into_par_iter()
        .map(|c| run_chain(target, init, config, c))
        .collect()
}

fn run_chain(target: &dyn LogDensity, init: &[f64], config: &SamplerConfig, chain: usize) -> Result<Chain> {
    let dim = init.len();
    let mut rng = StdRng::seed_from_u64(chain_seed(config.seed, chain));
    let mut evaluations = 0usize;

    let (mut x, mut lp) = starting_point(target, init, chain, &mut rng, &mut evaluations)?;

    if dim == 0 {
        return Ok(Chain {
            draws: vec![Vec::new(); config.draws],
            acceptance_rate: 1.0,
            evaluations,
        });
    }

    let base_log_lambda = (2.38 / (dim as f64).sqrt()).ln();
    let mut log_lambda = base_log_lambda;
    let mut scales = vec![INIT_JITTER; dim];
    let mut warmup_draws: Vec<Vec<f64>> = Vec::with_capacity(config.warmup);
    let mut batch_accepted = 0usize;
    let mut batch_index = 0usize;
    let rescale_at = config.warmup / 2;

    for it in 0..config.warmup {
        if step(target, &mut x, &mut lp, &scales, log_lambda.exp(), &mut rng, &mut evaluations)? {
            batch_accepted += 1;
        }
        warmup_draws.push(x.clone());

        if (it + 1) % ADAPT_BATCH == 0 {
            batch_index += 1;
            let rate = batch_accepted as f64 / ADAPT_BATCH as f64;
            log_lambda += (rate - config.target_acceptance) / (batch_index as f64).sqrt();
            batch_accepted = 0;
        }
        if it + 1 == rescale_at && rescale_at >= 2 * ADAPT_BATCH {
            scales = coordinate_spread(&warmup_draws[rescale_at / 2..]);
            log_lambda = base_log_lambda;
            batch_index = 0;
        }
    }

    let step_size = log_lambda.exp();
    let mut accepted = 0usize;
    let mut draws = Vec::with_capacity(config.draws);
    for _ in 0..config.draws {
        if step(target, &mut x, &mut lp, &scales, step_size, &mut rng, &mut evaluations)? {
            accepted += 1;
        }
        draws.push(x.clone());
    }

    Ok(Chain {
        draws,
        acceptance_rate: accepted as f64 / config.draws as f64,
        evaluations,
    })
}

fn starting_point(
    target: &dyn LogDensity,
    init: &[f64],
    chain: usize,
    rng: &mut StdRng,
    evaluations: &mut usize,
) -> Result<(Vec<f64>, f64)> {
    if chain > 0 {
        for _ in 0..20 {
            let x: Vec<f64> = init
                .iter()
                .map(|v| {
                    let e: f64 = StandardNormal.sample(rng);
                    v + INIT_JITTER * e
                })
                .collect();
            *evaluations += 1;
            let lp = target.log_density(&x)?;
            if lp.is_finite() {
                return Ok((x, lp));
            }
        }
    }
    *evaluations += 1;
    let lp = target.log_density(init)?;
    if !lp.is_finite() {
        return Err(Error::Computation(format!(
            "log density is not finite at the initial point (got {lp})"
        )));
    }
    Ok((init.to_vec(), lp))
}

/// One Metropolis step; returns whether the proposal was accepted.
fn step(
    target: &dyn LogDensity,
    x: &mut Vec<f64>,
    lp: &mut f64,
    scales: &[f64],
    step_size: f64,
    rng: &mut StdRng,
    evaluations: &mut usize,
) -> Result<bool> {
    let proposal: Vec<f64> = x
        .iter()
        .zip(scales)
        .map(|(v, s)| {
            let e: f64 = StandardNormal.sample(rng);
            v + step_size * s * e
        })
        .collect();
    *evaluations += 1;
    let lp_new = target.log_density(&proposal)?;
    if !lp_new.is_finite() {
        return Ok(false);
    }
    let log_u = rng.r#gen::<f64>().ln();
    if log_u < lp_new - *lp {
        *x = proposal;
        *lp = lp_new;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Per-coordinate standard deviation of `draws`, floored so no coordinate freezes.
fn coordinate_spread(draws: &[Vec<f64>]) -> Vec<f64> {
    let dim = draws.first().map_or(0, Vec::len);
    let n = draws.len() as f64;
    (0..dim)
        .map(|d| {
            let mean = draws.iter().map(|x| x[d]).sum::<f64>() / n;
            let var = draws.iter().map(|x| (x[d] - mean).powi(2)).sum::<f64>() / (n - 1.0).max(1.0);
            let sd = var.sqrt();
            if sd.is_finite() && sd > 1e-8 { sd } else { INIT_JITTER }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Gaussian {
        mean: [f64; 2],
        sd: [f64; 2],
    }

    impl LogDensity for Gaussian {
        fn dim(&self) -> usize {
            2
        }

        fn log_density(&self, z: &[f64]) -> Result<f64> {
            Ok((0..2)
                .map(|i| -0.5 * ((z[i] - self.mean[i]) / self.sd[i]).powi(2))
                .sum())
        }
    }

    fn config() -> SamplerConfig {
        SamplerConfig {
            chains: 4,
            warmup: 1000,
            draws: 2000,
            seed: 7,
            target_acceptance: 0.234,
        }
    }

    #[test]
    fn recovers_gaussian_mean_and_spread() {
        let target = Gaussian {
            mean: [3.0, -1.0],
            sd: [0.5, 2.0],
        };
        let chains = sample_chains(&target, &[0.0, 0.0], &config()).unwrap();
        assert_eq!(chains.len(), 4);
        let all: Vec<&Vec<f64>> = chains.iter().flat_map(|c| c.draws.iter()).collect();
        let n = all.len() as f64;
        let mean0 = all.iter().map(|x| x[0]).sum::<f64>() / n;
        let mean1 = all.iter().map(|x| x[1]).sum::<f64>() / n;
        assert!((mean0 - 3.0).abs() < 0.1, "mean0 = {mean0}");
        assert!((mean1 + 1.0).abs() < 0.4, "mean1 = {mean1}");
        let sd0 = (all.iter().map(|x| (x[0] - mean0).powi(2)).sum::<f64>() / n).sqrt();
        assert!((sd0 - 0.5).abs() < 0.1, "sd0 = {sd0}");
        for c in &chains {
            assert!(c.acceptance_rate > 0.1 && c.acceptance_rate < 0.6, "{}", c.acceptance_rate);
        }
    }

    #[test]
    fn same_seed_same_chains() {
        let target = Gaussian {
            mean: [0.0, 0.0],
            sd: [1.0, 1.0],
        };
        let cfg = SamplerConfig {
            warmup: 200,
            draws: 100,
            ..config()
        };
        let a = sample_chains(&target, &[0.0, 0.0], &cfg).unwrap();
        let b = sample_chains(&target, &[0.0, 0.0], &cfg).unwrap();
        assert_eq!(a[2].draws, b[2].draws);
        assert_ne!(a[0].draws, a[1].draws);
    }

    #[test]
    fn chain_seeds_differ() {
        assert_ne!(chain_seed(1, 0), chain_seed(1, 1));
        assert_ne!(chain_seed(1, 0), chain_seed(2, 0));
    }
}
