//! Reporting utilities: member rankings and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::MembershipResult;

/// One star in a membership ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRow {
    pub id: String,
    pub probability: f64,
    /// Credible bounds, for posterior results only.
    pub interval: Option<(f64, f64)>,
}

/// Stars ranked by membership probability in `population`, highest first.
///
/// Degenerate stars are left out. Returns `None` for an unknown population.
pub fn rank_members(result: &MembershipResult, population: &str, top_n: usize) -> Option<Vec<MemberRow>> {
    let mut rows: Vec<MemberRow> = match result {
        MembershipResult::Point { table } => {
            let k = table.population_index(population)?;
            table
                .responsibilities
                .iter()
                .zip(&table.ids)
                .map(|(row, id)| MemberRow {
                    id: id.clone(),
                    probability: row[k],
                    interval: None,
                })
                .collect()
        }
        MembershipResult::Posterior { summary, .. } => {
            let k = summary.populations.iter().position(|p| p == population)?;
            (0..summary.ids.len())
                .map(|i| MemberRow {
                    id: summary.ids[i].clone(),
                    probability: summary.mean[i][k],
                    interval: Some((summary.lower[i][k], summary.upper[i][k])),
                })
                .collect()
        }
    };
    rows.retain(|r| !r.probability.is_nan());
    rows.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    rows.truncate(top_n);
    Some(rows)
}

/// Expected number of members per population (sum of probabilities).
pub fn expected_counts(result: &MembershipResult) -> Vec<(String, f64)> {
    let (populations, rows) = match result {
        MembershipResult::Point { table } => (&table.populations, &table.responsibilities),
        MembershipResult::Posterior { summary, .. } => (&summary.populations, &summary.mean),
    };
    populations
        .iter()
        .enumerate()
        .map(|(k, name)| {
            let total = rows.iter().map(|r| r[k]).filter(|v| !v.is_nan()).sum::<f64>();
            (name.clone(), total)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MembershipTable;

    fn result() -> MembershipResult {
        MembershipResult::Point {
            table: MembershipTable {
                populations: vec!["stream".into(), "background".into()],
                ids: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                responsibilities: vec![
                    vec![0.2, 0.8],
                    vec![0.9, 0.1],
                    vec![f64::NAN, f64::NAN],
                    vec![0.6, 0.4],
                ],
                degenerate: vec![2],
            },
        }
    }

    #[test]
    fn ranks_by_probability_and_skips_degenerate() {
        let rows = rank_members(&result(), "stream", 10).unwrap();
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "a"]);
        let top = rank_members(&result(), "stream", 1).unwrap();
        assert_eq!(top.len(), 1);
        assert!(rank_members(&result(), "halo", 3).is_none());
    }

    #[test]
    fn expected_counts_sum_probabilities() {
        let counts = expected_counts(&result());
        assert_eq!(counts[0].0, "stream");
        assert!((counts[0].1 - 1.7).abs() < 1e-12);
        assert!((counts[1].1 - 1.3).abs() < 1e-12);
    }
}
