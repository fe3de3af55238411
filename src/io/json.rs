//! JSON files: model configurations in, fit files out (and back in).
//!
//! A fit file is the portable record of a fit:
//! - the tool name and population order
//! - the fit configuration that produced it
//! - the estimate and its diagnostics
//!
//! Scoring reloads it together with the model configuration.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{FitConfig, FitResult};
use crate::error::AppError;
use crate::models::ModelConfig;

pub const TOOL_NAME: &str = "smm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFile {
    pub tool: String,
    pub populations: Vec<String>,
    pub config: FitConfig,
    pub result: FitResult,
}

impl FitFile {
    pub fn new(populations: Vec<String>, config: FitConfig, result: FitResult) -> Self {
        Self {
            tool: TOOL_NAME.to_string(),
            populations,
            config,
            result,
        }
    }
}

pub fn read_model_config(path: &Path) -> Result<ModelConfig, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    parse_model_config(BufReader::new(file))
}

pub fn parse_model_config<R: Read>(reader: R) -> Result<ModelConfig, AppError> {
    serde_json::from_reader(reader).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))
}

pub fn write_fit_json(path: &Path, fit: &FitFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create fit JSON '{}': {e}", path.display())))?;
    let mut writer = BufWriter::new(file);
    write_fit(&mut writer, fit)?;
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))
}

pub fn write_fit<W: Write>(writer: W, fit: &FitFile) -> Result<(), AppError> {
    serde_json::to_writer_pretty(writer, fit).map_err(|e| AppError::new(2, format!("Failed to write fit JSON: {e}")))
}

pub fn read_fit_json(path: &Path) -> Result<FitFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open fit JSON '{}': {e}", path.display())))?;
    parse_fit(BufReader::new(file))
}

pub fn parse_fit<R: Read>(reader: R) -> Result<FitFile, AppError> {
    serde_json::from_reader(reader).map_err(|e| AppError::new(2, format!("Invalid fit JSON: {e}")))
}
