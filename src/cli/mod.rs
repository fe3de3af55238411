//! Command-line parsing for the stream membership tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling and inference code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{FitConfig, FitMode, InitStrategy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "smm", version, about = "Stellar stream membership modeling")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value_t = tracing::Level::INFO)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a mixture model to a feature table and write a fit JSON.
    Fit(FitArgs),
    /// Compute membership probabilities from a saved fit.
    Score(ScoreArgs),
    /// Draw a synthetic catalog from a model (and optionally fitted values).
    Simulate(SimulateArgs),
}

/// Inputs shared by commands that read a feature table.
#[derive(Debug, Args, Clone)]
pub struct TableArgs {
    /// Feature table CSV.
    #[arg(long, value_name = "CSV")]
    pub data: PathBuf,

    /// Column holding star identifiers (defaults to `id` when present).
    #[arg(long)]
    pub id_column: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub table: TableArgs,

    /// Model configuration JSON.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Where to write the fit JSON.
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = FitMode::Map)]
    pub mode: FitMode,

    /// Starting point: configured defaults or one draw from the priors.
    #[arg(long, value_enum, default_value_t = InitStrategy::Defaults)]
    pub init: InitStrategy,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Optimizer iteration limit.
    #[arg(long, default_value_t = 1000)]
    pub max_iters: u64,

    /// Optimizer gradient tolerance.
    #[arg(long, default_value_t = 1e-6)]
    pub tolerance: f64,

    /// L-BFGS history size.
    #[arg(long, default_value_t = 10)]
    pub lbfgs_memory: usize,

    /// MCMC chains (run in parallel).
    #[arg(long, default_value_t = 4)]
    pub chains: usize,

    /// MCMC warmup iterations per chain.
    #[arg(long, default_value_t = 1000)]
    pub warmup: usize,

    /// Posterior draws (per chain for MCMC).
    #[arg(long, default_value_t = 1000)]
    pub draws: usize,

    /// Acceptance rate the MCMC step size adapts toward.
    #[arg(long, default_value_t = 0.234)]
    pub target_acceptance: f64,

    /// Relative distance to a domain boundary that triggers a warning.
    #[arg(long, default_value_t = 1e-6)]
    pub boundary_tolerance: f64,
}

#[derive(Debug, Args, Clone)]
pub struct ScoreArgs {
    #[command(flatten)]
    pub table: TableArgs,

    /// Fit JSON written by `smm fit`.
    #[arg(long, value_name = "JSON")]
    pub fit: PathBuf,

    /// Model configuration JSON used for the fit.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Membership CSV output.
    #[arg(long, value_name = "CSV")]
    pub out: Option<PathBuf>,

    /// Central credible interval for posterior fits (overrides the fit file).
    #[arg(long)]
    pub credible_level: Option<f64>,

    /// Population to rank members of (defaults to the first one).
    #[arg(long)]
    pub population: Option<String>,

    /// Show the top-N most probable members.
    #[arg(long, default_value_t = 20)]
    pub top: usize,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Model configuration JSON.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// Fit JSON whose estimate replaces the configured defaults.
    #[arg(long, value_name = "JSON")]
    pub fit: Option<PathBuf>,

    /// Number of stars to draw.
    #[arg(short = 'n', long, default_value_t = 1000)]
    pub count: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Output CSV.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        mode: args.mode,
        init: args.init,
        seed: args.seed,
        max_iters: args.max_iters,
        tolerance: args.tolerance,
        lbfgs_memory: args.lbfgs_memory,
        chains: args.chains,
        warmup: args.warmup,
        draws: args.draws,
        target_acceptance: args.target_acceptance,
        boundary_tolerance: args.boundary_tolerance,
        ..FitConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_flags_map_onto_config() {
        let cli = Cli::parse_from([
            "smm", "fit", "--data", "stars.csv", "--model", "model.json", "--mode", "mcmc", "--chains", "2",
            "--seed", "7", "--init", "priors",
        ]);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert_eq!(config.mode, FitMode::Mcmc);
        assert_eq!(config.init, InitStrategy::Priors);
        assert_eq!(config.chains, 2);
        assert_eq!(config.seed, 7);
        assert_eq!(config.draws, FitConfig::default().draws);
        assert_eq!(args.table.data, PathBuf::from("stars.csv"));
        assert_eq!(cli.log_level, tracing::Level::INFO);
    }

    #[test]
    fn global_log_level_after_subcommand() {
        let cli = Cli::parse_from([
            "smm", "simulate", "--model", "m.json", "--out", "s.csv", "-n", "10", "--log-level", "debug",
        ]);
        assert_eq!(cli.log_level, tracing::Level::DEBUG);
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.count, 10);
        assert!(args.fit.is_none());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
