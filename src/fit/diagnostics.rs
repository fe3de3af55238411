//! Fit quality checks.
//!
//! - BIC for point estimates
//! - split R-hat across chains
//! - warnings for parameters sitting on a domain boundary, poor acceptance
//!   rates and unmixed chains

use std::collections::BTreeMap;

use crate::domain::ConvergenceWarning;
use crate::fit::Chain;
use crate::fit::ParameterLayout;
use crate::params::ParamValues;

pub const R_HAT_WARN: f64 = 1.05;
pub const ACCEPTANCE_LOW: f64 = 0.05;
pub const ACCEPTANCE_HIGH: f64 = 0.9;

/// BIC = k ln(n) - 2 ln L.
pub fn bic(n: usize, k: usize, log_likelihood: f64) -> f64 {
    k as f64 * (n as f64).ln() - 2.0 * log_likelihood
}

/// Split R-hat for one scalar across chains.
///
/// Each chain is split in half and the halves are trimmed to a common length.
/// Returns NaN when there are too few draws or the within-chain variance vanishes.
pub fn split_r_hat(chains: &[&[f64]]) -> f64 {
    if chains.is_empty() {
        return f64::NAN;
    }
    let mut halves: Vec<&[f64]> = Vec::with_capacity(2 * chains.len());
    for chain in chains {
        if chain.len() < 4 {
            return f64::NAN;
        }
        let mid = chain.len() / 2;
        halves.push(&chain[..mid]);
        halves.push(&chain[mid..]);
    }
    let len = halves.iter().map(|c| c.len()).min().unwrap_or(0);
    let halves: Vec<&[f64]> = halves.iter().map(|c| &c[..len]).collect();

    let m = halves.len() as f64;
    let n = len as f64;
    let means: Vec<f64> = halves.iter().map(|c| c.iter().sum::<f64>() / n).collect();
    let grand = means.iter().sum::<f64>() / m;
    let between = means.iter().map(|mu| (mu - grand).powi(2)).sum::<f64>() * n / (m - 1.0);
    let within = halves
        .iter()
        .zip(&means)
        .map(|(c, mu)| c.iter().map(|x| (x - mu).powi(2)).sum::<f64>() / (n - 1.0))
        .sum::<f64>()
        / m;
    if within < 1e-30 {
        return f64::NAN;
    }
    let var_plus = (n - 1.0) / n * within + between / n;
    (var_plus / within).sqrt()
}

/// R-hat for every constrained element, keyed `name` (scalars) or `name[i]`.
///
/// `chain_values[c][d]` is draw `d` of chain `c`, already mapped to constrained
/// space. Elements whose R-hat is undefined are left out.
pub fn r_hat_by_element(chain_values: &[Vec<ParamValues>]) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    let Some(first) = chain_values.first().and_then(|c| c.first()) else {
        return out;
    };
    for (name, value) in first.iter() {
        for idx in 0..value.len() {
            let series: Vec<Vec<f64>> = chain_values
                .iter()
                .map(|chain| {
                    chain
                        .iter()
                        .filter_map(|draw| draw.get(name).and_then(|v| v.get(idx).copied()))
                        .collect()
                })
                .collect();
            let refs: Vec<&[f64]> = series.iter().map(Vec::as_slice).collect();
            let r = split_r_hat(&refs);
            if r.is_finite() {
                let key = if value.len() == 1 { name.clone() } else { format!("{name}[{idx}]") };
                out.insert(key, r);
            }
        }
    }
    out
}

pub fn boundary_warnings(layout: &ParameterLayout, values: &ParamValues, tol: f64) -> Vec<ConvergenceWarning> {
    layout
        .entries()
        .iter()
        .filter(|e| values.get(&e.name).is_some_and(|v| e.domain.near_boundary(v, tol)))
        .map(|e| ConvergenceWarning::AtBoundary {
            parameter: e.name.clone(),
        })
        .collect()
}

pub fn acceptance_warnings(chains: &[Chain]) -> Vec<ConvergenceWarning> {
    chains
        .iter()
        .enumerate()
        .filter(|(_, c)| !(ACCEPTANCE_LOW..=ACCEPTANCE_HIGH).contains(&c.acceptance_rate))
        .map(|(chain, c)| ConvergenceWarning::AcceptanceRate {
            chain,
            rate: c.acceptance_rate,
        })
        .collect()
}

pub fn r_hat_warnings(r_hat: &BTreeMap<String, f64>) -> Vec<ConvergenceWarning> {
    r_hat
        .iter()
        .filter(|(_, r)| **r > R_HAT_WARN)
        .map(|(parameter, r)| ConvergenceWarning::HighRHat {
            parameter: parameter.clone(),
            r_hat: *r,
        })
        .collect()
}
