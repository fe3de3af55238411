//! Shared pipelines behind the CLI commands.
//!
//! Each pipeline reads its inputs, runs the library and returns everything the
//! front end prints or writes:
//!
//! - fit: model JSON + feature CSV -> fit file
//! - score: model JSON + fit JSON + feature CSV -> membership result
//! - simulate: model JSON (+ fit JSON) -> synthetic catalog

use std::path::Path;

use crate::cli::TableArgs;
use crate::data::{FeatureTable, SyntheticSample, simulate, uncertainty_column};
use crate::domain::{FitConfig, MembershipResult};
use crate::error::AppError;
use crate::fit::FitEngine;
use crate::io::{FitFile, IngestedTable, TableSpec, read_feature_table, read_fit_json, read_model_config};
use crate::membership::MembershipEvaluator;
use crate::models::MixtureModel;

#[derive(Debug, Clone)]
pub struct FitRun {
    pub ingest: IngestedTable,
    pub fit: FitFile,
}

#[derive(Debug, Clone)]
pub struct ScoreRun {
    pub ingest: IngestedTable,
    pub populations: Vec<String>,
    pub membership: MembershipResult,
}

#[derive(Debug, Clone)]
pub struct SimulateRun {
    pub populations: Vec<String>,
    pub sample: SyntheticSample,
}

pub fn load_model(path: &Path) -> Result<MixtureModel, AppError> {
    Ok(read_model_config(path)?.build()?)
}

pub fn run_fit(model_path: &Path, table: &TableArgs, config: &FitConfig) -> Result<FitRun, AppError> {
    let model = load_model(model_path)?;
    let ingest = read_feature_table(&table.data, &table_spec(&model, table))?;
    log_row_errors(&ingest);
    let fit = fit_table(&model, &ingest.table, config)?;
    Ok(FitRun { ingest, fit })
}

/// Fit an already loaded table.
pub fn fit_table(model: &MixtureModel, table: &FeatureTable, config: &FitConfig) -> Result<FitFile, AppError> {
    let engine = FitEngine::new(config.clone())?;
    let result = engine.fit(model, table)?;
    Ok(FitFile::new(model.population_names(), config.clone(), result))
}

pub fn run_score(
    model_path: &Path,
    fit_path: &Path,
    table: &TableArgs,
    credible_level: Option<f64>,
) -> Result<ScoreRun, AppError> {
    let model = load_model(model_path)?;
    let fit = read_fit_json(fit_path)?;
    let ingest = read_feature_table(&table.data, &table_spec(&model, table))?;
    log_row_errors(&ingest);
    let membership = score_table(&model, &fit, &ingest.table, credible_level)?;
    Ok(ScoreRun {
        ingest,
        populations: model.population_names(),
        membership,
    })
}

pub fn score_table(
    model: &MixtureModel,
    fit: &FitFile,
    table: &FeatureTable,
    credible_level: Option<f64>,
) -> Result<MembershipResult, AppError> {
    if fit.populations != model.population_names() {
        return Err(AppError::new(
            2,
            format!(
                "Fit populations [{}] do not match the model [{}].",
                fit.populations.join(", "),
                model.population_names().join(", ")
            ),
        ));
    }
    let evaluator = MembershipEvaluator::new(credible_level.unwrap_or(fit.config.credible_level))?;
    Ok(evaluator.evaluate(model, &fit.result, table)?)
}

pub fn run_simulate(model_path: &Path, fit_path: Option<&Path>, n: usize, seed: u64) -> Result<SimulateRun, AppError> {
    let model = load_model(model_path)?;
    let values = match fit_path {
        Some(path) => read_fit_json(path)?.result.point_values(),
        None => model.default_values(),
    };
    let sample = simulate(&model, &values, n, seed)?;
    tracing::info!(stars = n, seed, "simulated catalog");
    Ok(SimulateRun {
        populations: model.population_names(),
        sample,
    })
}

/// Read every feature the model scores, plus uncertainty columns where present.
fn table_spec(model: &MixtureModel, table: &TableArgs) -> TableSpec {
    let mut columns: Vec<String> = Vec::new();
    for population in model.populations() {
        for feature in population.features() {
            for name in [feature.to_string(), uncertainty_column(feature)] {
                if !columns.contains(&name) {
                    columns.push(name);
                }
            }
        }
    }
    TableSpec {
        id_column: table.id_column.clone(),
        columns,
    }
}

fn log_row_errors(ingest: &IngestedTable) {
    for e in ingest.row_errors.iter().take(10) {
        tracing::warn!(line = e.line, id = e.id.as_deref().unwrap_or(""), "skipped row: {}", e.message);
    }
    if ingest.row_errors.len() > 10 {
        tracing::warn!("{} more rows skipped", ingest.row_errors.len() - 10);
    }
}
