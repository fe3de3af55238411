//! CSV ingest for feature tables.
//!
//! Design goals:
//! - **Header-driven**: columns are found by name (trimmed, BOM stripped)
//! - **Row-level validation**: rows with unparsable or non-finite values are
//!   skipped and reported, not fatal
//! - **No model knowledge**: missing feature columns are left for the model to
//!   report when it checks the table

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::data::FeatureTable;
use crate::error::AppError;

/// Column used for star identifiers when none is named and it exists.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct IngestedTable {
    pub table: FeatureTable,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

impl IngestedTable {
    pub fn rows_used(&self) -> usize {
        self.table.n_rows()
    }
}

/// Which columns to read.
#[derive(Debug, Clone, Default)]
pub struct TableSpec {
    /// Identifier column; `None` uses `id` if present.
    pub id_column: Option<String>,
    /// Numeric columns to keep; empty keeps every non-id column.
    pub columns: Vec<String>,
}

pub fn read_feature_table(path: &Path, spec: &TableSpec) -> Result<IngestedTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    parse_feature_table(file, spec)
}

pub fn parse_feature_table<R: Read>(reader: R, spec: &TableSpec) -> Result<IngestedTable, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let id_idx = match &spec.id_column {
        Some(name) => Some(
            *header_map
                .get(name.as_str())
                .ok_or_else(|| AppError::new(2, format!("Missing id column: `{name}`")))?,
        ),
        None => header_map.get(DEFAULT_ID_COLUMN).copied(),
    };

    let mut selected: Vec<(String, usize)> = if spec.columns.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(idx, _)| Some(*idx) != id_idx)
            .map(|(idx, name)| (normalize_header_name(name), idx))
            .collect()
    } else {
        spec.columns
            .iter()
            .filter_map(|name| header_map.get(name.as_str()).map(|&idx| (name.clone(), idx)))
            .collect()
    };
    selected.dedup_by(|a, b| a.0 == b.0);
    if selected.is_empty() {
        return Err(match spec.columns.first() {
            Some(name) => crate::error::Error::Shape(format!("missing required column '{name}'")).into(),
            None => AppError::new(2, "The CSV has no feature columns."),
        });
    }

    let mut ids = Vec::new();
    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); selected.len()];
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = match id_idx {
            Some(i) => record.get(i).map(str::to_string),
            None => None,
        };
        match parse_row(&record, &selected) {
            Ok(values) => {
                for (column, v) in columns.iter_mut().zip(values) {
                    column.push(v);
                }
                ids.push(id.unwrap_or_else(|| (line - 2).to_string()));
            }
            Err(message) => row_errors.push(RowError { line, id, message }),
        }
    }

    if ids.is_empty() {
        return Err(AppError::new(2, "No valid rows in the feature table."));
    }

    let names = selected.into_iter().map(|(name, _)| name);
    let mut table = FeatureTable::new(names.zip(columns))?;
    if id_idx.is_some() {
        table = table.with_ids(ids)?;
    }
    Ok(IngestedTable {
        table,
        row_errors,
        rows_read,
    })
}

fn parse_row(record: &StringRecord, selected: &[(String, usize)]) -> Result<Vec<f64>, String> {
    selected
        .iter()
        .map(|(name, idx)| {
            let raw = record
                .get(*idx)
                .ok_or_else(|| format!("missing value for `{name}`"))?;
            let v = raw
                .parse::<f64>()
                .map_err(|_| format!("invalid number '{raw}' in `{name}`"))?;
            if v.is_finite() {
                Ok(v)
            } else {
                Err(format!("non-finite value in `{name}`"))
            }
        })
        .collect()
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a UTF-8 BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}
