//! Fit orchestration.
//!
//! [`FitEngine::fit`] validates the table, picks a starting point, runs the
//! configured mode and attaches diagnostics:
//!
//! - `Map`: L-BFGS on the posterior read through the transforms (no Jacobian)
//! - `Mcmc`: parallel random-walk Metropolis chains on the unconstrained density
//! - `Variational`: mode of the unconstrained density plus a Gaussian
//!   approximation around it, sampled and mapped back

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::FeatureTable;
use crate::domain::{
    ConvergenceWarning, FitConfig, FitDiagnostics, FitEstimate, FitMode, FitResult, InitStrategy,
    PosteriorDraws,
};
use crate::error::{Error, Result};
use crate::fit::{
    GaussianApproximation, LogDensity, MapConfig, Posterior, SamplerConfig, acceptance_warnings, bic,
    boundary_warnings, maximize, r_hat_by_element, r_hat_warnings, sample_chains,
};
use crate::models::MixtureModel;
use crate::params::ParamValues;

#[derive(Debug, Clone, Default)]
pub struct FitEngine {
    config: FitConfig,
}

impl FitEngine {
    pub fn new(config: FitConfig) -> Result<Self> {
        validate_config(&config)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &FitConfig {
        &self.config
    }

    /// Fit starting from the configured init strategy.
    pub fn fit(&self, model: &MixtureModel, table: &FeatureTable) -> Result<FitResult> {
        let init = self.initial_values(model);
        self.fit_from(model, table, &init)
    }

    /// Fit starting from explicit values; parameters not named keep their defaults.
    pub fn fit_from(&self, model: &MixtureModel, table: &FeatureTable, init: &ParamValues) -> Result<FitResult> {
        model.check_table(table)?;
        if table.is_empty() {
            return Err(Error::Shape("cannot fit an empty feature table".into()));
        }
        let start = merge_init(model, init)?;

        tracing::info!(
            mode = self.config.mode.display_name(),
            stars = table.n_rows(),
            populations = model.populations().len(),
            "fitting mixture model"
        );

        let result = match self.config.mode {
            FitMode::Map => self.fit_map(model, table, &start)?,
            FitMode::Mcmc => self.fit_mcmc(model, table, &start)?,
            FitMode::Variational => self.fit_variational(model, table, &start)?,
        };

        for w in &result.diagnostics.warnings {
            tracing::warn!("{w}");
        }
        tracing::info!(
            log_posterior = result.diagnostics.log_posterior,
            converged = result.diagnostics.converged,
            evaluations = result.diagnostics.evaluations,
            "fit finished"
        );
        Ok(result)
    }

    /// Starting values for every parameter under the configured strategy.
    ///
    /// With `Priors`, each free parameter takes one draw from its prior; flat
    /// priors and draws outside the domain keep the default.
    pub fn initial_values(&self, model: &MixtureModel) -> ParamValues {
        let mut values = model.default_values();
        if self.config.init == InitStrategy::Defaults {
            return values;
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        for (name, param) in model.parameters() {
            if param.fixed || param.prior.is_flat() {
                continue;
            }
            match param.prior.sample(param.len(), &mut rng) {
                Some(draw) if param.domain.contains(&draw) => values.insert(name, draw),
                _ => tracing::debug!(parameter = name, "prior draw unusable; keeping default"),
            }
        }
        values
    }

    fn map_config(&self) -> MapConfig {
        MapConfig {
            max_iters: self.config.max_iters,
            tolerance: self.config.tolerance,
            memory: self.config.lbfgs_memory,
        }
    }

    fn fit_map(&self, model: &MixtureModel, table: &FeatureTable, start: &ParamValues) -> Result<FitResult> {
        let posterior = Posterior::new(model, table, false);
        let z0 = posterior.layout().to_unconstrained(start)?;
        let outcome = maximize(&posterior, &z0, &self.map_config())?;
        tracing::debug!("optimizer: {outcome}");
        let values = posterior.layout().to_values(&outcome.z);

        let mut diagnostics = self.point_diagnostics(model, table, &values, &posterior)?;
        diagnostics.iterations = outcome.iterations;
        diagnostics.converged = outcome.converged;
        diagnostics.bic = Some(bic(table.n_rows(), diagnostics.n_free, diagnostics.log_likelihood));
        if !outcome.converged {
            diagnostics.warnings.insert(
                0,
                ConvergenceWarning::NotConverged {
                    message: outcome.message,
                },
            );
        }
        Ok(FitResult {
            mode: FitMode::Map,
            estimate: FitEstimate::Point { values },
            diagnostics,
        })
    }

    fn fit_mcmc(&self, model: &MixtureModel, table: &FeatureTable, start: &ParamValues) -> Result<FitResult> {
        let posterior = Posterior::new(model, table, true);
        let layout = posterior.layout();
        let z0 = layout.to_unconstrained(start)?;
        let sampler = SamplerConfig {
            chains: self.config.chains,
            warmup: self.config.warmup,
            draws: self.config.draws,
            seed: self.config.seed,
            target_acceptance: self.config.target_acceptance,
        };
        let chains = sample_chains(&posterior, &z0, &sampler)?;

        let chain_values: Vec<Vec<ParamValues>> = chains
            .iter()
            .map(|c| c.draws.iter().map(|z| layout.to_values(z)).collect())
            .collect();
        let r_hat = r_hat_by_element(&chain_values);
        let flat: Vec<ParamValues> = chain_values.into_iter().flatten().collect();
        let draws = PosteriorDraws::from_draws(&flat);

        let mean = draws.mean();
        let mut diagnostics = self.point_diagnostics(model, table, &mean, &posterior)?;
        diagnostics.iterations = (self.config.warmup + self.config.draws) as u64;
        diagnostics.acceptance_rates = chains.iter().map(|c| c.acceptance_rate).collect();

        let mut warnings = acceptance_warnings(&chains);
        warnings.extend(r_hat_warnings(&r_hat));
        diagnostics.converged = warnings.is_empty();
        warnings.append(&mut diagnostics.warnings);
        diagnostics.warnings = warnings;
        diagnostics.r_hat = r_hat;

        Ok(FitResult {
            mode: FitMode::Mcmc,
            estimate: FitEstimate::Draws { draws },
            diagnostics,
        })
    }

    fn fit_variational(&self, model: &MixtureModel, table: &FeatureTable, start: &ParamValues) -> Result<FitResult> {
        if self.config.draws == 0 {
            return Err(Error::Config("variational fits need draws > 0".into()));
        }
        let posterior = Posterior::new(model, table, true);
        let layout = posterior.layout();
        let z0 = layout.to_unconstrained(start)?;
        let outcome = maximize(&posterior, &z0, &self.map_config())?;

        let approx = GaussianApproximation::at_mode(&posterior, &outcome.z)?;
        if approx.jitter > 0.0 {
            tracing::debug!(jitter = approx.jitter, "regularized Laplace precision");
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let samples = approx.sample(self.config.draws, &mut rng)?;
        let flat: Vec<ParamValues> = samples.iter().map(|z| layout.to_values(z)).collect();
        let draws = PosteriorDraws::from_draws(&flat);

        let mean = draws.mean();
        let mut diagnostics = self.point_diagnostics(model, table, &mean, &posterior)?;
        diagnostics.iterations = outcome.iterations;
        diagnostics.converged = outcome.converged;
        if !outcome.converged {
            diagnostics.warnings.insert(
                0,
                ConvergenceWarning::NotConverged {
                    message: outcome.message,
                },
            );
        }
        Ok(FitResult {
            mode: FitMode::Variational,
            estimate: FitEstimate::Draws { draws },
            diagnostics,
        })
    }

    fn point_diagnostics(
        &self,
        model: &MixtureModel,
        table: &FeatureTable,
        values: &ParamValues,
        posterior: &Posterior<'_>,
    ) -> Result<FitDiagnostics> {
        Ok(FitDiagnostics {
            n_stars: table.n_rows(),
            n_free: posterior.dim(),
            log_likelihood: model.log_likelihood(values, table)?,
            log_posterior: model.log_posterior(values, table)?,
            evaluations: posterior.evaluations(),
            warnings: boundary_warnings(posterior.layout(), values, self.config.boundary_tolerance),
            ..FitDiagnostics::default()
        })
    }
}

fn validate_config(config: &FitConfig) -> Result<()> {
    let check = |ok: bool, msg: String| if ok { Ok(()) } else { Err(Error::Config(msg)) };
    check(
        config.tolerance.is_finite() && config.tolerance >= 0.0,
        format!("tolerance must be finite and >= 0 (got {})", config.tolerance),
    )?;
    check(config.lbfgs_memory > 0, "lbfgs memory must be > 0".into())?;
    check(
        config.target_acceptance > 0.0 && config.target_acceptance < 1.0,
        format!("target acceptance must be in (0, 1) (got {})", config.target_acceptance),
    )?;
    check(
        config.boundary_tolerance.is_finite() && config.boundary_tolerance >= 0.0,
        format!("boundary tolerance must be finite and >= 0 (got {})", config.boundary_tolerance),
    )?;
    check(
        config.credible_level > 0.0 && config.credible_level < 1.0,
        format!("credible level must be in (0, 1) (got {})", config.credible_level),
    )?;
    if config.mode == FitMode::Mcmc {
        check(config.chains > 0, "MCMC needs at least one chain".into())?;
    }
    if config.mode != FitMode::Map {
        check(config.draws > 0, format!("{} fits need draws > 0", config.mode.display_name()))?;
    }
    Ok(())
}

/// Defaults overridden by `init`; names the model does not know are rejected.
fn merge_init(model: &MixtureModel, init: &ParamValues) -> Result<ParamValues> {
    let mut values = model.default_values();
    for (name, v) in init.iter() {
        if values.get(name).is_none() {
            return Err(Error::Config(format!("unknown parameter '{name}' in initial values")));
        }
        values.insert(name.clone(), v.clone());
    }
    Ok(values)
}
