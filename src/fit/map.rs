//! Maximum a posteriori estimation with L-BFGS.
//!
//! The optimizer works on the negative log-density in unconstrained space,
//! using `argmin`'s L-BFGS with a More–Thuente line search.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;

use crate::error::{Error, Result};
use crate::fit::GradientProvider;

/// Cost used in place of a non-finite negative log-density, so line searches
/// can back off instead of aborting.
const PENALTY_COST: f64 = 1e150;

#[derive(Debug, Clone)]
pub struct MapConfig {
    pub max_iters: u64,
    /// Gradient-norm tolerance.
    pub tolerance: f64,
    /// L-BFGS history size.
    pub memory: usize,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            max_iters: 1000,
            tolerance: 1e-6,
            memory: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    /// Best unconstrained point.
    pub z: Vec<f64>,
    /// Log-density at `z`.
    pub log_density: f64,
    pub iterations: u64,
    pub cost_evaluations: usize,
    pub gradient_evaluations: usize,
    pub converged: bool,
    pub message: String,
}

impl fmt::Display for OptimizationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "log_density={:.6}, iterations={}, evaluations={}, converged={}",
            self.log_density, self.iterations, self.cost_evaluations, self.converged
        )
    }
}

#[derive(Default)]
struct Counts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

struct NegLogDensity<'a> {
    target: &'a dyn GradientProvider,
    counts: Arc<Counts>,
}

impl CostFunction for NegLogDensity<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, z: &Self::Param) -> std::result::Result<Self::Output, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let lp = self
            .target
            .log_density(z)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        Ok(if lp.is_finite() { -lp } else { PENALTY_COST })
    }
}

impl Gradient for NegLogDensity<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, z: &Self::Param) -> std::result::Result<Self::Gradient, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let g = self
            .target
            .gradient(z)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        Ok(g.into_iter().map(|v| if v.is_finite() { -v } else { 0.0 }).collect())
    }
}

/// Find the mode of `target` starting from `init`.
pub fn maximize(target: &dyn GradientProvider, init: &[f64], config: &MapConfig) -> Result<OptimizationOutcome> {
    let init_lp = target.log_density(init)?;
    if !init_lp.is_finite() {
        return Err(Error::Computation(format!(
            "objective is not finite at the initial point (got {init_lp})"
        )));
    }
    if init.is_empty() {
        return Ok(OptimizationOutcome {
            z: Vec::new(),
            log_density: init_lp,
            iterations: 0,
            cost_evaluations: 1,
            gradient_evaluations: 0,
            converged: true,
            message: "no free parameters".to_string(),
        });
    }

    let counts = Arc::new(Counts::default());
    let problem = NegLogDensity {
        target,
        counts: counts.clone(),
    };

    let linesearch = MoreThuenteLineSearch::new();
    let tol_cost = if config.tolerance == 0.0 { 0.0 } else { (0.1 * config.tolerance).max(1e-12) };
    let solver = LBFGS::new(linesearch, config.memory)
        .with_tolerance_grad(config.tolerance)
        .map_err(|e| Error::Config(format!("invalid optimizer tolerance: {e}")))?
        .with_tolerance_cost(tol_cost)
        .map_err(|e| Error::Config(format!("invalid optimizer cost tolerance: {e}")))?;

    let res = Executor::new(problem, solver)
        .configure(|state| state.param(init.to_vec()).max_iters(config.max_iters))
        .run()
        .map_err(|e| Error::Computation(format!("optimization failed: {e}")))?;

    let state = res.state();
    let z = state
        .get_best_param()
        .ok_or_else(|| Error::Computation("optimizer returned no parameters".to_string()))?
        .clone();
    let termination = state.get_termination_status();
    let converged = matches!(
        termination,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    );

    Ok(OptimizationOutcome {
        log_density: -state.get_best_cost(),
        z,
        iterations: state.get_iter(),
        cost_evaluations: counts.cost.load(Ordering::Relaxed) + 1,
        gradient_evaluations: counts.grad.load(Ordering::Relaxed),
        converged,
        message: termination.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::LogDensity;
    use approx::assert_relative_eq;

    struct Bowl;

    impl LogDensity for Bowl {
        fn dim(&self) -> usize {
            2
        }

        fn log_density(&self, z: &[f64]) -> Result<f64> {
            Ok(-(z[0] - 2.0).powi(2) - 0.5 * (z[1] + 1.0).powi(2))
        }
    }

    impl GradientProvider for Bowl {}

    struct Nowhere;

    impl LogDensity for Nowhere {
        fn dim(&self) -> usize {
            1
        }

        fn log_density(&self, _z: &[f64]) -> Result<f64> {
            Ok(f64::NEG_INFINITY)
        }
    }

    impl GradientProvider for Nowhere {}

    #[test]
    fn finds_quadratic_mode() {
        let out = maximize(&Bowl, &[0.0, 0.0], &MapConfig::default()).unwrap();
        assert!(out.converged, "{}", out.message);
        assert_relative_eq!(out.z[0], 2.0, epsilon = 1e-4);
        assert_relative_eq!(out.z[1], -1.0, epsilon = 1e-4);
        assert!(out.log_density > -1e-8);
    }

    #[test]
    fn iteration_limit_reports_not_converged() {
        let config = MapConfig {
            max_iters: 1,
            tolerance: 1e-14,
            memory: 5,
        };
        let out = maximize(&Bowl, &[40.0, -30.0], &config).unwrap();
        assert!(!out.converged);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn non_finite_start_is_computation_error() {
        let err = maximize(&Nowhere, &[0.0], &MapConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Computation(_)));
    }
}
