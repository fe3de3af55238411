//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the fitting code stays free of presentation concerns
//! - output changes are localized

use crate::domain::{FitEstimate, FitResult, MembershipResult};
use crate::io::IngestedTable;
use crate::report::{MemberRow, expected_counts};

/// Fit summary: data, diagnostics, warnings and parameter estimates.
pub fn format_fit_summary(ingest: &IngestedTable, fit: &FitResult) -> String {
    let d = &fit.diagnostics;
    let mut out = String::new();

    out.push_str("=== smm - stream membership fit ===\n");
    out.push_str(&format!("Mode: {}\n", fit.mode.display_name()));
    out.push_str(&format!(
        "Stars: n={} (read {}, skipped {})\n",
        d.n_stars,
        ingest.rows_read,
        ingest.row_errors.len()
    ));
    out.push_str(&format!("Free parameters: {}\n", d.n_free));

    out.push_str("\nDiagnostics:\n");
    out.push_str(&format!("- log-likelihood: {:.4}\n", d.log_likelihood));
    out.push_str(&format!("- log-posterior : {:.4}\n", d.log_posterior));
    if let Some(bic) = d.bic {
        out.push_str(&format!("- BIC           : {bic:.4}\n"));
    }
    out.push_str(&format!(
        "- iterations={} evaluations={} converged={}\n",
        d.iterations, d.evaluations, d.converged
    ));
    if !d.acceptance_rates.is_empty() {
        out.push_str(&format!("- acceptance: {}\n", fmt_vec(&d.acceptance_rates, 3)));
    }
    if let Some((name, r)) = d.r_hat.iter().max_by(|a, b| a.1.total_cmp(b.1)) {
        out.push_str(&format!("- max R-hat: {r:.3} ({name})\n"));
    }

    if !d.warnings.is_empty() {
        out.push_str("\nWarnings:\n");
        for w in &d.warnings {
            out.push_str(&format!("! {w}\n"));
        }
    }

    let label = match fit.estimate {
        FitEstimate::Point { .. } => "Estimates:",
        FitEstimate::Draws { .. } => "Posterior means:",
    };
    out.push_str(&format!("\n{label}\n"));
    for (name, v) in fit.point_values().iter() {
        out.push_str(&format!("- {name:<32} {}\n", fmt_vec(v, 6)));
    }
    out
}

/// Expected member counts and degenerate stars.
pub fn format_membership_summary(result: &MembershipResult) -> String {
    let mut out = String::new();
    let (n, degenerate) = match result {
        MembershipResult::Point { table } => (table.n_stars(), table.degenerate.len()),
        MembershipResult::Posterior { summary, .. } => (
            summary.ids.len(),
            summary.degenerate_draws.iter().filter(|&&c| c > 0).count(),
        ),
    };

    out.push_str("=== smm - membership ===\n");
    match result {
        MembershipResult::Point { .. } => out.push_str(&format!("Stars: {n} (point estimate)\n")),
        MembershipResult::Posterior { draws, summary } => out.push_str(&format!(
            "Stars: {n} ({} draws, {:.0}% intervals)\n",
            draws.len(),
            100.0 * summary.credible_level
        )),
    }
    for (name, count) in expected_counts(result) {
        out.push_str(&format!("- {name:<16} expected members {count:>10.2}\n"));
    }
    if degenerate > 0 {
        out.push_str(&format!("! {degenerate} stars have zero density under every population\n"));
    }
    out
}

/// Table of the most probable members of one population.
pub fn format_top_members(rows: &[MemberRow], population: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("Top {population} members:\n"));
    out.push_str(format!("{:<24} {:>10} {:>21}\n", "id", "p", "interval").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<24} {:-<10} {:-<21}\n", "", "", "").trim_end());
    out.push('\n');
    for r in rows {
        let interval = r
            .interval
            .map(|(lo, hi)| format!("[{lo:.4}, {hi:.4}]"))
            .unwrap_or_default();
        out.push_str(format!("{:<24} {:>10.6} {:>21}\n", truncate(&r.id, 24), r.probability, interval).trim_end());
        out.push('\n');
    }
    out
}

fn fmt_vec(v: &[f64], precision: usize) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.precision$}")).collect();
    format!("[{}]", parts.join(", "))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
