//! Membership evaluation.
//!
//! A point fit gives one responsibility table. A fit with draws gives one table
//! per draw (computed in parallel) plus a per-star summary: the mean and a
//! central credible interval for every population, skipping the draws in
//! which that star was degenerate.

use rayon::prelude::*;

use crate::data::FeatureTable;
use crate::domain::{FitEstimate, FitResult, MembershipResult, MembershipSummary, MembershipTable};
use crate::error::{Error, Result};
use crate::math::quantile_sorted;
use crate::models::MixtureModel;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MembershipEvaluator {
    credible_level: f64,
}

impl Default for MembershipEvaluator {
    fn default() -> Self {
        Self { credible_level: 0.68 }
    }
}

impl MembershipEvaluator {
    pub fn new(credible_level: f64) -> Result<Self> {
        if !(credible_level > 0.0 && credible_level < 1.0) {
            return Err(Error::Config(format!(
                "credible level must be in (0, 1) (got {credible_level})"
            )));
        }
        Ok(Self { credible_level })
    }

    pub fn credible_level(&self) -> f64 {
        self.credible_level
    }

    pub fn evaluate(&self, model: &MixtureModel, fit: &FitResult, table: &FeatureTable) -> Result<MembershipResult> {
        model.check_table(table)?;
        match &fit.estimate {
            FitEstimate::Point { values } => {
                let table = model.responsibilities(values, table)?;
                if !table.degenerate.is_empty() {
                    tracing::warn!(stars = table.degenerate.len(), "stars with zero density in every population");
                }
                Ok(MembershipResult::Point { table })
            }
            FitEstimate::Draws { draws } => {
                if draws.n_draws == 0 {
                    return Err(Error::Config("fit result holds no posterior draws".into()));
                }
                let tables = (0..draws.n_draws)
                    .into_par_iter()
                    .map(|i| model.responsibilities(&draws.draw(i), table))
                    .collect::<Result<Vec<_>>>()?;
                let summary = self.summarize(&tables)?;
                Ok(MembershipResult::Posterior { draws: tables, summary })
            }
        }
    }

    /// Per-star mean and central credible interval across draw tables.
    pub fn summarize(&self, tables: &[MembershipTable]) -> Result<MembershipSummary> {
        let first = tables
            .first()
            .ok_or_else(|| Error::Config("no membership tables to summarize".into()))?;
        let n = first.n_stars();
        let k = first.populations.len();
        if let Some(t) = tables.iter().find(|t| t.n_stars() != n) {
            return Err(Error::Shape(format!(
                "membership tables disagree on star count ({} vs {n})",
                t.n_stars()
            )));
        }

        let tail = 0.5 * (1.0 - self.credible_level);
        let mut mean = Vec::with_capacity(n);
        let mut lower = Vec::with_capacity(n);
        let mut upper = Vec::with_capacity(n);
        let mut degenerate_draws = vec![0usize; n];
        for i in 0..n {
            degenerate_draws[i] = tables.iter().filter(|t| t.degenerate.contains(&i)).count();
            let mut row_mean = Vec::with_capacity(k);
            let mut row_lower = Vec::with_capacity(k);
            let mut row_upper = Vec::with_capacity(k);
            for j in 0..k {
                let mut vals: Vec<f64> = tables
                    .iter()
                    .map(|t| t.responsibilities[i][j])
                    .filter(|v| !v.is_nan())
                    .collect();
                vals.sort_by(f64::total_cmp);
                let m = if vals.is_empty() {
                    f64::NAN
                } else {
                    vals.iter().sum::<f64>() / vals.len() as f64
                };
                row_mean.push(m);
                row_lower.push(quantile_sorted(&vals, tail));
                row_upper.push(quantile_sorted(&vals, 1.0 - tail));
            }
            mean.push(row_mean);
            lower.push(row_lower);
            upper.push(row_upper);
        }

        Ok(MembershipSummary {
            populations: first.populations.clone(),
            ids: first.ids.clone(),
            credible_level: self.credible_level,
            mean,
            lower,
            upper,
            degenerate_draws,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{NormalDensity, TruncatedNormalDensity};
    use crate::domain::{FitDiagnostics, FitMode, PosteriorDraws};
    use crate::models::{IndependentFeatureModel, WEIGHTS_NAME};
    use crate::params::{ParamSpec, ParamValues, Prior};
    use approx::assert_relative_eq;

    fn model() -> MixtureModel {
        let pop = |name: &str, loc: f64| {
            let c = NormalDensity::new("x", "x", &ParamSpec::new(loc, Prior::Flat), &ParamSpec::new(1.0, Prior::Flat))
                .unwrap();
            IndependentFeatureModel::new(name, vec![c.into()]).unwrap()
        };
        MixtureModel::new(vec![pop("stream", 0.0), pop("background", 5.0)], &ParamSpec::new(vec![0.5, 0.5], Prior::Flat))
            .unwrap()
    }

    fn point_fit(model: &MixtureModel) -> FitResult {
        FitResult {
            mode: FitMode::Map,
            estimate: FitEstimate::Point {
                values: model.default_values(),
            },
            diagnostics: FitDiagnostics::default(),
        }
    }

    #[test]
    fn point_fit_gives_single_table_with_ids() {
        let model = model();
        let table = FeatureTable::new([("x", vec![0.0, 2.5, 5.0])])
            .unwrap()
            .with_ids(vec!["a".into(), "b".into(), "c".into()])
            .unwrap();
        let result = MembershipEvaluator::default().evaluate(&model, &point_fit(&model), &table).unwrap();
        let MembershipResult::Point { table: t } = result else {
            panic!("expected a point result");
        };
        assert_eq!(t.ids, vec!["a", "b", "c"]);
        assert_relative_eq!(t.responsibilities[1][0], 0.5, epsilon = 1e-12);
        assert!(t.responsibilities[0][0] > 0.99);
        assert_eq!(t.most_probable(1), Some(0));
        assert_eq!(t.most_probable(2), Some(1));
    }

    #[test]
    fn draws_give_per_draw_tables_and_intervals() {
        let model = model();
        let table = FeatureTable::new([("x", vec![1.0, 4.0])]).unwrap();
        let draws: Vec<ParamValues> = [0.2, 0.4, 0.6, 0.8]
            .iter()
            .map(|&w| {
                let mut v = model.default_values();
                v.insert(WEIGHTS_NAME, vec![w, 1.0 - w]);
                v
            })
            .collect();
        let fit = FitResult {
            mode: FitMode::Mcmc,
            estimate: FitEstimate::Draws {
                draws: PosteriorDraws::from_draws(&draws),
            },
            diagnostics: FitDiagnostics::default(),
        };
        let result = MembershipEvaluator::new(0.5).unwrap().evaluate(&model, &fit, &table).unwrap();
        let MembershipResult::Posterior { draws, summary } = result else {
            panic!("expected a posterior result");
        };
        assert_eq!(draws.len(), 4);
        assert_eq!(summary.credible_level, 0.5);
        for i in 0..2 {
            assert!(summary.lower[i][0] <= summary.mean[i][0]);
            assert!(summary.mean[i][0] <= summary.upper[i][0]);
            assert_relative_eq!(summary.mean[i][0] + summary.mean[i][1], 1.0, epsilon = 1e-12);
        }
        // Larger stream weight in later draws raises stream membership.
        assert!(draws[3].responsibilities[0][0] > draws[0].responsibilities[0][0]);
        assert_eq!(summary.degenerate_draws, vec![0, 0]);
    }

    #[test]
    fn stars_outside_every_support_are_flagged() {
        let pop = |name: &str, low: f64, high: f64| {
            let c = TruncatedNormalDensity::new(
                "x",
                "x",
                &ParamSpec::new(0.5 * (low + high), Prior::Flat),
                &ParamSpec::new(1.0, Prior::Flat),
                low,
                high,
            )
            .unwrap();
            IndependentFeatureModel::new(name, vec![c.into()]).unwrap()
        };
        let model = MixtureModel::new(
            vec![pop("stream", 0.0, 1.0), pop("background", 0.0, 2.0)],
            &ParamSpec::new(vec![0.5, 0.5], Prior::Flat),
        )
        .unwrap();
        let table = FeatureTable::new([("x", vec![0.5, 1.5, 7.0])]).unwrap();
        let result = MembershipEvaluator::default().evaluate(&model, &point_fit(&model), &table).unwrap();
        let MembershipResult::Point { table: t } = result else {
            panic!("expected a point result");
        };
        assert_eq!(t.degenerate, vec![2]);
        assert!(t.responsibilities[2].iter().all(|r| r.is_nan()));
        assert_relative_eq!(t.responsibilities[1][1], 1.0, epsilon = 1e-12);
        assert_eq!(t.most_probable(2), None);
    }

    #[test]
    fn credible_level_must_be_a_probability() {
        assert!(MembershipEvaluator::new(0.0).is_err());
        assert!(MembershipEvaluator::new(1.0).is_err());
        assert!(MembershipEvaluator::new(0.95).is_ok());
    }
}
