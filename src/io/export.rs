//! CSV exports.
//!
//! - membership tables: one row per star, one probability column per population
//! - posterior summaries: mean and credible bounds per population
//! - synthetic catalogs: feature columns plus the true population label

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::data::SyntheticSample;
use crate::domain::{MembershipResult, MembershipSummary, MembershipTable};
use crate::error::AppError;

pub fn write_membership_csv(path: &Path, result: &MembershipResult) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create membership CSV '{}': {e}", path.display())))?;
    write_membership(file, result)
}

pub fn write_membership<W: Write>(writer: W, result: &MembershipResult) -> Result<(), AppError> {
    match result {
        MembershipResult::Point { table } => write_point_table(writer, table),
        MembershipResult::Posterior { summary, .. } => write_summary(writer, summary),
    }
}

fn write_point_table<W: Write>(writer: W, table: &MembershipTable) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string()];
    header.extend(table.populations.iter().map(|p| format!("p_{p}")));
    header.push("most_probable".into());
    header.push("degenerate".into());
    out.write_record(&header).map_err(csv_error)?;

    for (i, row) in table.responsibilities.iter().enumerate() {
        let mut record = vec![table.ids[i].clone()];
        record.extend(row.iter().map(|r| fmt_prob(*r)));
        record.push(
            table
                .most_probable(i)
                .map(|k| table.populations[k].clone())
                .unwrap_or_default(),
        );
        record.push(table.degenerate.contains(&i).to_string());
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write membership CSV: {e}")))
}

fn write_summary<W: Write>(writer: W, summary: &MembershipSummary) -> Result<(), AppError> {
    let mut out = csv::Writer::from_writer(writer);
    let mut header = vec!["id".to_string()];
    for p in &summary.populations {
        header.push(format!("p_{p}_mean"));
        header.push(format!("p_{p}_lower"));
        header.push(format!("p_{p}_upper"));
    }
    header.push("degenerate_draws".into());
    out.write_record(&header).map_err(csv_error)?;

    for i in 0..summary.ids.len() {
        let mut record = vec![summary.ids[i].clone()];
        for k in 0..summary.populations.len() {
            record.push(fmt_prob(summary.mean[i][k]));
            record.push(fmt_prob(summary.lower[i][k]));
            record.push(fmt_prob(summary.upper[i][k]));
        }
        record.push(summary.degenerate_draws[i].to_string());
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write membership CSV: {e}")))
}

pub fn write_synthetic_csv(path: &Path, sample: &SyntheticSample, populations: &[String]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create synthetic CSV '{}': {e}", path.display())))?;
    write_synthetic(file, sample, populations)
}

pub fn write_synthetic<W: Write>(writer: W, sample: &SyntheticSample, populations: &[String]) -> Result<(), AppError> {
    let table = &sample.table;
    let names: Vec<&String> = table.column_names().collect();
    let mut out = csv::Writer::from_writer(writer);

    let mut header = vec!["id".to_string()];
    header.extend(names.iter().map(|n| n.to_string()));
    header.push("population".into());
    out.write_record(&header).map_err(csv_error)?;

    for (i, &label) in sample.labels.iter().enumerate() {
        let mut record = vec![table.row_id(i)];
        for name in &names {
            let column = table.column(name)?;
            record.push(format!("{:.10}", column[i]));
        }
        record.push(populations.get(label).cloned().unwrap_or_else(|| label.to_string()));
        out.write_record(&record).map_err(csv_error)?;
    }
    out.flush()
        .map_err(|e| AppError::new(2, format!("Failed to write synthetic CSV: {e}")))
}

fn fmt_prob(v: f64) -> String {
    if v.is_nan() { String::new() } else { format!("{v:.8}") }
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::new(2, format!("Failed to write CSV row: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FeatureTable;
    use crate::io::{TableSpec, parse_feature_table};

    fn point_result() -> MembershipResult {
        MembershipResult::Point {
            table: MembershipTable {
                populations: vec!["stream".into(), "background".into()],
                ids: vec!["a".into(), "b".into()],
                responsibilities: vec![vec![0.75, 0.25], vec![f64::NAN, f64::NAN]],
                degenerate: vec![1],
            },
        }
    }

    #[test]
    fn point_membership_csv_layout() {
        let mut buf = Vec::new();
        write_membership(&mut buf, &point_result()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "id,p_stream,p_background,most_probable,degenerate");
        assert_eq!(lines[1], "a,0.75000000,0.25000000,stream,false");
        assert_eq!(lines[2], "b,,,,true");
    }

    #[test]
    fn summary_csv_has_bounds_per_population() {
        let summary = MembershipSummary {
            populations: vec!["stream".into(), "background".into()],
            ids: vec!["a".into()],
            credible_level: 0.68,
            mean: vec![vec![0.5, 0.5]],
            lower: vec![vec![0.25, 0.25]],
            upper: vec![vec![0.75, 0.75]],
            degenerate_draws: vec![2],
        };
        let result = MembershipResult::Posterior {
            draws: Vec::new(),
            summary,
        };
        let mut buf = Vec::new();
        write_membership(&mut buf, &result).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "id,p_stream_mean,p_stream_lower,p_stream_upper,\
             p_background_mean,p_background_lower,p_background_upper,degenerate_draws"
        );
        assert!(lines.next().unwrap().ends_with(",2"));
    }

    #[test]
    fn synthetic_csv_reads_back_as_feature_table() {
        let table = FeatureTable::new([("phi1", vec![0.5, -1.25]), ("pm1", vec![2.0, 3.0])])
            .unwrap()
            .with_ids(vec!["s0".into(), "s1".into()])
            .unwrap();
        let sample = SyntheticSample {
            table,
            labels: vec![1, 0],
        };
        let mut buf = Vec::new();
        write_synthetic(&mut buf, &sample, &["stream".into(), "background".into()]).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("id,phi1,pm1,population\n"));
        assert!(text.contains("s0,0.5000000000,2.0000000000,background"));

        let spec = TableSpec {
            id_column: None,
            columns: vec!["phi1".into(), "pm1".into()],
        };
        let back = parse_feature_table(text.as_bytes(), &spec).unwrap();
        assert_eq!(back.table.column("phi1").unwrap(), &[0.5, -1.25]);
        assert_eq!(back.table.ids().unwrap(), &["s0".to_string(), "s1".into()]);
    }
}
