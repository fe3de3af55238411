//! Shared domain types.
//!
//! These types are kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting and scoring
//! - exported to JSON/CSV
//! - reloaded later to score new tables

use std::collections::BTreeMap;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::params::ParamValues;

/// Which inference mode the fit engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Maximum a posteriori point estimate (L-BFGS).
    #[default]
    Map,
    /// Adaptive random-walk Metropolis, several chains in parallel.
    Mcmc,
    /// Gaussian approximation around the posterior mode.
    Variational,
}

impl FitMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            FitMode::Map => "MAP",
            FitMode::Mcmc => "MCMC",
            FitMode::Variational => "variational",
        }
    }
}

/// Where fitting starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InitStrategy {
    /// Configured parameter defaults.
    #[default]
    Defaults,
    /// One draw from each prior; flat priors fall back to the default.
    Priors,
}

/// Fit engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitConfig {
    pub mode: FitMode,
    pub init: InitStrategy,
    pub seed: u64,

    // MAP / mode finding.
    pub max_iters: u64,
    pub tolerance: f64,
    pub lbfgs_memory: usize,

    // Sampling.
    pub chains: usize,
    pub warmup: usize,
    pub draws: usize,
    pub target_acceptance: f64,

    /// Relative distance to a domain boundary that triggers an `AtBoundary` warning.
    pub boundary_tolerance: f64,

    /// Central credible interval reported by membership summaries.
    pub credible_level: f64,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            mode: FitMode::Map,
            init: InitStrategy::Defaults,
            seed: 42,
            max_iters: 1000,
            tolerance: 1e-6,
            lbfgs_memory: 10,
            chains: 4,
            warmup: 1000,
            draws: 1000,
            target_acceptance: 0.234,
            boundary_tolerance: 1e-6,
            credible_level: 0.68,
        }
    }
}

/// Non-fatal problems detected during a fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvergenceWarning {
    NotConverged { message: String },
    AtBoundary { parameter: String },
    HighRHat { parameter: String, r_hat: f64 },
    AcceptanceRate { chain: usize, rate: f64 },
}

impl std::fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvergenceWarning::NotConverged { message } => {
                write!(f, "optimizer did not converge: {message}")
            }
            ConvergenceWarning::AtBoundary { parameter } => {
                write!(f, "parameter '{parameter}' is at its domain boundary")
            }
            ConvergenceWarning::HighRHat { parameter, r_hat } => {
                write!(f, "R-hat for '{parameter}' is {r_hat:.3}")
            }
            ConvergenceWarning::AcceptanceRate { chain, rate } => {
                write!(f, "chain {chain} acceptance rate {rate:.3} is outside [0.05, 0.9]")
            }
        }
    }
}

/// Posterior draws: for every parameter, one value vector per draw.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PosteriorDraws {
    pub n_draws: usize,
    pub values: BTreeMap<String, Vec<Vec<f64>>>,
}

impl PosteriorDraws {
    pub fn from_draws(draws: &[ParamValues]) -> Self {
        let mut values: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
        for draw in draws {
            for (name, v) in draw.iter() {
                values.entry(name.clone()).or_default().push(v.clone());
            }
        }
        Self {
            n_draws: draws.len(),
            values,
        }
    }

    pub fn get(&self, name: &str) -> Option<&[Vec<f64>]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// Assignment for draw `i`.
    pub fn draw(&self, i: usize) -> ParamValues {
        self.values
            .iter()
            .filter_map(|(name, draws)| draws.get(i).map(|v| (name.clone(), v.clone())))
            .collect()
    }

    /// Element-wise posterior mean.
    pub fn mean(&self) -> ParamValues {
        self.values
            .iter()
            .map(|(name, draws)| {
                let len = draws.first().map_or(0, Vec::len);
                let mut mean = vec![0.0; len];
                for d in draws {
                    for (m, v) in mean.iter_mut().zip(d) {
                        *m += v;
                    }
                }
                let n = draws.len().max(1) as f64;
                (name.clone(), mean.into_iter().map(|m| m / n).collect())
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FitEstimate {
    Point { values: ParamValues },
    Draws { draws: PosteriorDraws },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub n_stars: usize,
    pub n_free: usize,
    /// Log-likelihood at the point estimate (posterior mean for draws).
    pub log_likelihood: f64,
    pub log_posterior: f64,
    /// Only for point estimates.
    pub bic: Option<f64>,
    pub iterations: u64,
    pub evaluations: usize,
    pub converged: bool,
    pub acceptance_rates: Vec<f64>,
    pub r_hat: BTreeMap<String, f64>,
    pub warnings: Vec<ConvergenceWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub mode: FitMode,
    pub estimate: FitEstimate,
    pub diagnostics: FitDiagnostics,
}

impl FitResult {
    /// Point values, or the posterior mean for draws.
    pub fn point_values(&self) -> ParamValues {
        match &self.estimate {
            FitEstimate::Point { values } => values.clone(),
            FitEstimate::Draws { draws } => draws.mean(),
        }
    }
}

/// Per-star responsibilities for one parameter assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipTable {
    pub populations: Vec<String>,
    pub ids: Vec<String>,
    /// `responsibilities[i][k]`: probability that star `i` belongs to population `k`.
    pub responsibilities: Vec<Vec<f64>>,
    /// Rows whose responsibilities are NaN because every population gave zero density.
    pub degenerate: Vec<usize>,
}

impl MembershipTable {
    pub fn n_stars(&self) -> usize {
        self.responsibilities.len()
    }

    pub fn population_index(&self, name: &str) -> Option<usize> {
        self.populations.iter().position(|p| p == name)
    }

    /// Column of responsibilities for one population.
    pub fn population(&self, name: &str) -> Option<Vec<f64>> {
        let k = self.population_index(name)?;
        Some(self.responsibilities.iter().map(|row| row[k]).collect())
    }

    /// Hard assignment for star `i`; exact ties go to the lowest population index.
    pub fn most_probable(&self, i: usize) -> Option<usize> {
        let row = self.responsibilities.get(i)?;
        let mut best: Option<usize> = None;
        for (k, &r) in row.iter().enumerate() {
            if r.is_nan() {
                return None;
            }
            match best {
                Some(b) if row[b] >= r => {}
                _ => best = Some(k),
            }
        }
        best
    }
}

/// Per-star posterior summary of responsibilities across draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MembershipSummary {
    pub populations: Vec<String>,
    pub ids: Vec<String>,
    pub credible_level: f64,
    /// `mean[i][k]`, ignoring degenerate draws for star `i`.
    pub mean: Vec<Vec<f64>>,
    pub lower: Vec<Vec<f64>>,
    pub upper: Vec<Vec<f64>>,
    /// Number of draws in which star `i` was degenerate.
    pub degenerate_draws: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipResult {
    Point {
        table: MembershipTable,
    },
    Posterior {
        draws: Vec<MembershipTable>,
        summary: MembershipSummary,
    },
}
