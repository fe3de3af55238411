//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - runs the fit, score or simulate pipeline
//! - prints summaries and writes output files

use clap::Parser;

use crate::cli::{Cli, Command, FitArgs, ScoreArgs, SimulateArgs, fit_config_from_args};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `smm` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Score(args) => handle_score(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&args.model, &args.table, &config)?;

    println!("{}", crate::report::format_fit_summary(&run.ingest, &run.fit.result));

    if let Some(path) = &args.out {
        crate::io::write_fit_json(path, &run.fit)?;
        tracing::info!(path = %path.display(), "wrote fit");
    }
    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let run = pipeline::run_score(&args.model, &args.fit, &args.table, args.credible_level)?;

    println!("{}", crate::report::format_membership_summary(&run.membership));

    let population = match &args.population {
        Some(p) => p.clone(),
        None => run.populations.first().cloned().unwrap_or_default(),
    };
    let rows = crate::report::rank_members(&run.membership, &population, args.top)
        .ok_or_else(|| AppError::new(2, format!("Unknown population `{population}`.")))?;
    println!("{}", crate::report::format_top_members(&rows, &population));

    if let Some(path) = &args.out {
        crate::io::write_membership_csv(path, &run.membership)?;
        tracing::info!(path = %path.display(), "wrote membership table");
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let run = pipeline::run_simulate(&args.model, args.fit.as_deref(), args.count, args.seed)?;
    crate::io::write_synthetic_csv(&args.out, &run.sample, &run.populations)?;

    println!("Wrote {} stars to {}", run.sample.labels.len(), args.out.display());
    for (k, name) in run.populations.iter().enumerate() {
        println!("- {name:<16} {:>8}", run.sample.count(k));
    }
    Ok(())
}
