//! Mixture Model: populations combined with simplex mixing weights.
//!
//! Per star:
//!
//! ```text
//! total = logsumexp_k( ln w_k + log p_k(x) )
//! r_k   = exp( ln w_k + log p_k(x) - total )
//! ```
//!
//! The weights are a single simplex parameter named `"mixture-probs"`; they are
//! never renormalized here.

use crate::data::FeatureTable;
use crate::domain::MembershipTable;
use crate::error::{Error, Result};
use crate::math::logsumexp;
use crate::models::IndependentFeatureModel;
use crate::params::{Domain, ParamSpec, ParamValues, Parameter};

pub const WEIGHTS_NAME: &str = "mixture-probs";

#[derive(Debug, Clone, PartialEq)]
pub struct MixtureModel {
    populations: Vec<IndependentFeatureModel>,
    weights: Parameter,
}

impl MixtureModel {
    pub fn new(populations: Vec<IndependentFeatureModel>, weights: &ParamSpec) -> Result<Self> {
        if populations.len() < 2 {
            return Err(Error::Config(format!(
                "a mixture needs at least 2 populations (got {})",
                populations.len()
            )));
        }
        for (i, p) in populations.iter().enumerate() {
            if populations[..i].iter().any(|q| q.name() == p.name()) {
                return Err(Error::Config(format!("duplicate population name '{}'", p.name())));
            }
        }

        let mut reference = populations[0].features();
        reference.sort_unstable();
        for p in &populations[1..] {
            let mut features = p.features();
            features.sort_unstable();
            if features != reference {
                return Err(Error::Config(format!(
                    "population '{}' scores [{}] but '{}' scores [{}]; every population must \
                     score the same features",
                    p.name(),
                    features.join(", "),
                    populations[0].name(),
                    reference.join(", ")
                )));
            }
        }

        let weights = Parameter::new("mixture", WEIGHTS_NAME, Domain::Simplex, populations.len(), weights)?;
        Ok(Self { populations, weights })
    }

    pub fn populations(&self) -> &[IndependentFeatureModel] {
        &self.populations
    }

    pub fn population_names(&self) -> Vec<String> {
        self.populations.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn weights(&self) -> &Parameter {
        &self.weights
    }

    /// All parameters with their global names, mixture weights first.
    pub fn parameters(&self) -> Vec<(&str, &Parameter)> {
        let mut out = vec![(WEIGHTS_NAME, &self.weights)];
        for p in &self.populations {
            out.extend(p.parameters());
        }
        out
    }

    /// The configured initial values of every parameter.
    pub fn default_values(&self) -> ParamValues {
        self.parameters()
            .into_iter()
            .map(|(name, p)| (name.to_string(), p.value.clone()))
            .collect()
    }

    pub fn check_table(&self, table: &FeatureTable) -> Result<()> {
        self.populations.iter().try_for_each(|p| p.check_table(table))
    }

    /// Mixing weights from `values` (or the fixed value).
    pub fn weight_values<'a>(&'a self, values: &'a ParamValues) -> Result<&'a [f64]> {
        let w = match values.get(WEIGHTS_NAME) {
            Some(w) => w,
            None if self.weights.fixed => self.weights.value.as_slice(),
            None => return Err(Error::Config(format!("no value given for parameter '{WEIGHTS_NAME}'"))),
        };
        if w.len() != self.populations.len() {
            return Err(Error::Config(format!(
                "'{WEIGHTS_NAME}' has {} values for {} populations",
                w.len(),
                self.populations.len()
            )));
        }
        Ok(w)
    }

    fn log_weights(&self, values: &ParamValues) -> Result<Vec<f64>> {
        Ok(self.weight_values(values)?.iter().map(|v| v.ln()).collect())
    }

    /// `log p_k(x_i)` for every population `k` (outer) and star `i` (inner).
    pub fn population_log_probs(&self, values: &ParamValues, table: &FeatureTable) -> Result<Vec<Vec<f64>>> {
        let per_pop = self
            .populations
            .iter()
            .map(|p| p.log_prob(values, table))
            .collect::<Result<Vec<_>>>()?;
        let n = table.n_rows();
        if let Some((k, lp)) = per_pop.iter().enumerate().find(|(_, lp)| lp.len() != n) {
            return Err(Error::Shape(format!(
                "population '{}' returned {} log-densities for {n} stars",
                self.populations[k].name(),
                lp.len()
            )));
        }
        Ok(per_pop)
    }

    /// Per-star mixture log-density.
    pub fn total_log_prob(&self, values: &ParamValues, table: &FeatureTable) -> Result<Vec<f64>> {
        let log_w = self.log_weights(values)?;
        let per_pop = self.population_log_probs(values, table)?;
        let mut terms = vec![0.0; log_w.len()];
        Ok((0..table.n_rows())
            .map(|i| {
                for (k, t) in terms.iter_mut().enumerate() {
                    *t = log_w[k] + per_pop[k][i];
                }
                logsumexp(&terms)
            })
            .collect())
    }

    pub fn log_likelihood(&self, values: &ParamValues, table: &FeatureTable) -> Result<f64> {
        Ok(self.total_log_prob(values, table)?.iter().sum())
    }

    pub fn log_prior(&self, values: &ParamValues) -> Result<f64> {
        let mut total = 0.0;
        if !self.weights.fixed {
            let w = values
                .get(WEIGHTS_NAME)
                .ok_or_else(|| Error::Config(format!("no value given for parameter '{WEIGHTS_NAME}'")))?;
            total += self.weights.log_prior(w);
        }
        for p in &self.populations {
            total += p.log_prior(values)?;
        }
        Ok(total)
    }

    /// Log-likelihood plus log-prior.
    pub fn log_posterior(&self, values: &ParamValues, table: &FeatureTable) -> Result<f64> {
        Ok(self.log_likelihood(values, table)? + self.log_prior(values)?)
    }

    /// Posterior membership probabilities per star and population.
    pub fn responsibilities(&self, values: &ParamValues, table: &FeatureTable) -> Result<MembershipTable> {
        let log_w = self.log_weights(values)?;
        let per_pop = self.population_log_probs(values, table)?;
        let k = log_w.len();

        let mut responsibilities = Vec::with_capacity(table.n_rows());
        let mut degenerate = Vec::new();
        let mut terms = vec![0.0; k];
        for i in 0..table.n_rows() {
            for (j, t) in terms.iter_mut().enumerate() {
                *t = log_w[j] + per_pop[j][i];
            }
            let total = logsumexp(&terms);
            if total.is_finite() {
                responsibilities.push(terms.iter().map(|t| (t - total).exp()).collect());
            } else {
                degenerate.push(i);
                responsibilities.push(vec![f64::NAN; k]);
            }
        }

        Ok(MembershipTable {
            populations: self.population_names(),
            ids: table.row_ids(),
            responsibilities,
            degenerate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::NormalDensity;
    use crate::params::Prior;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn population(name: &str, loc: f64, scale: f64) -> IndependentFeatureModel {
        let c = NormalDensity::new(
            "pm",
            "pm1",
            &ParamSpec::new(loc, Prior::Flat),
            &ParamSpec::new(scale, Prior::Flat),
        )
        .unwrap();
        IndependentFeatureModel::new(name, vec![c.into()]).unwrap()
    }

    fn two_population_model(w: f64) -> MixtureModel {
        MixtureModel::new(
            vec![population("stream", 0.0, 1.0), population("background", 0.0, 10.0)],
            &ParamSpec::new(vec![w, 1.0 - w], Prior::Flat),
        )
        .unwrap()
    }

    #[test]
    fn narrow_stream_dominates_at_its_centre() {
        let model = two_population_model(0.1);
        let table = FeatureTable::new([("pm1", vec![0.0])]).unwrap();
        let r = model.responsibilities(&model.default_values(), &table).unwrap();
        assert_relative_eq!(r.responsibilities[0][0], 0.5263, epsilon = 1e-3);
        assert_relative_eq!(r.responsibilities[0][1], 0.4737, epsilon = 1e-3);
        assert!(r.degenerate.is_empty());
    }

    #[test]
    fn star_far_from_stream_belongs_to_background() {
        let model = two_population_model(0.5);
        let table = FeatureTable::new([("pm1", vec![5.0])]).unwrap();
        let r = model.responsibilities(&model.default_values(), &table).unwrap();
        assert!(r.responsibilities[0][0] < 1e-3);
        assert_eq!(r.most_probable(0), Some(1));
    }

    #[test]
    fn rows_with_no_support_are_flagged() {
        use crate::components::UniformDensity;
        let box_pop = |name: &str, low: f64, high: f64| {
            let c = UniformDensity::new("box", vec!["pm1".into()], vec![low], vec![high]).unwrap();
            IndependentFeatureModel::new(name, vec![c.into()]).unwrap()
        };
        let model = MixtureModel::new(
            vec![box_pop("stream", 0.0, 1.0), box_pop("background", 0.0, 2.0)],
            &ParamSpec::new(vec![0.5, 0.5], Prior::Flat),
        )
        .unwrap();
        let table = FeatureTable::new([("pm1", vec![0.5, 3.0])]).unwrap();
        let r = model.responsibilities(&model.default_values(), &table).unwrap();
        assert_eq!(r.degenerate, vec![1]);
        assert!(r.responsibilities[1][0].is_nan());
        assert_relative_eq!(r.responsibilities[0][0], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn weights_must_match_population_count() {
        let err = MixtureModel::new(
            vec![population("stream", 0.0, 1.0), population("background", 0.0, 10.0)],
            &ParamSpec::new(vec![0.2, 0.3, 0.5], Prior::Flat),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Domain { .. }));
    }

    #[test]
    fn populations_must_share_features() {
        let other = {
            let c = NormalDensity::new(
                "pm",
                "pm2",
                &ParamSpec::new(0.0, Prior::Flat),
                &ParamSpec::new(1.0, Prior::Flat),
            )
            .unwrap();
            IndependentFeatureModel::new("background", vec![c.into()]).unwrap()
        };
        let err = MixtureModel::new(
            vec![population("stream", 0.0, 1.0), other],
            &ParamSpec::new(vec![0.5, 0.5], Prior::Flat),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn log_likelihood_is_sum_of_totals() {
        let model = two_population_model(0.3);
        let table = FeatureTable::new([("pm1", vec![0.1, -2.0, 7.0])]).unwrap();
        let values = model.default_values();
        let totals = model.total_log_prob(&values, &table).unwrap();
        assert_relative_eq!(
            model.log_likelihood(&values, &table).unwrap(),
            totals.iter().sum::<f64>(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn separated_normals_assign_star_at_first_mean() {
        let model = MixtureModel::new(
            vec![population("pop0", 0.0, 1.0), population("pop1", 5.0, 1.0)],
            &ParamSpec::new(vec![0.5, 0.5], Prior::Flat),
        )
        .unwrap();
        let table = FeatureTable::new([("pm1", vec![0.0])]).unwrap();
        let r = model.responsibilities(&model.default_values(), &table).unwrap();
        let expected_pop1 = 1.0 / (1.0 + 12.5f64.exp());
        assert!(r.responsibilities[0][0] >= 0.993);
        assert_relative_eq!(r.responsibilities[0][1], expected_pop1, max_relative = 1e-9);
        assert_relative_eq!(r.responsibilities[0][0], 1.0 - expected_pop1, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn responsibilities_sum_to_one(
            xs in proptest::collection::vec(-30.0f64..30.0, 1..40),
            w in 0.01f64..0.99,
        ) {
            let model = two_population_model(w);
            let table = FeatureTable::new([("pm1", xs)]).unwrap();
            let r = model.responsibilities(&model.default_values(), &table).unwrap();
            for row in &r.responsibilities {
                let s: f64 = row.iter().sum();
                prop_assert!((s - 1.0).abs() < 1e-9);
            }
        }

        #[test]
        fn responsibilities_follow_star_permutation(
            xs in proptest::collection::vec(-20.0f64..20.0, 2..30),
            shift in 1usize..29,
        ) {
            let model = two_population_model(0.3);
            let n = xs.len();
            let order: Vec<usize> = (0..n).map(|i| (i + shift) % n).collect();
            let table = FeatureTable::new([("pm1", xs)]).unwrap();
            let permuted = table.permuted(&order).unwrap();
            let values = model.default_values();
            let r = model.responsibilities(&values, &table).unwrap();
            let rp = model.responsibilities(&values, &permuted).unwrap();
            for (new_i, &old_i) in order.iter().enumerate() {
                for k in 0..2 {
                    prop_assert_eq!(rp.responsibilities[new_i][k], r.responsibilities[old_i][k]);
                }
            }
        }

        #[test]
        fn total_unchanged_when_populations_swap(
            xs in proptest::collection::vec(-30.0f64..30.0, 1..40),
            w in 0.01f64..0.99,
            loc in -5.0f64..5.0,
            scale in 0.1f64..5.0,
        ) {
            let stream = || population("stream", loc, scale);
            let background = || population("background", 0.0, 10.0);
            let forward = MixtureModel::new(
                vec![stream(), background()],
                &ParamSpec::new(vec![w, 1.0 - w], Prior::Flat),
            )
            .unwrap();
            let swapped = MixtureModel::new(
                vec![background(), stream()],
                &ParamSpec::new(vec![1.0 - w, w], Prior::Flat),
            )
            .unwrap();
            let table = FeatureTable::new([("pm1", xs)]).unwrap();
            let a = forward.total_log_prob(&forward.default_values(), &table).unwrap();
            let b = swapped.total_log_prob(&swapped.default_values(), &table).unwrap();
            for (x, y) in a.iter().zip(&b) {
                prop_assert!((x - y).abs() <= 1e-12 * x.abs().max(1.0), "{x} vs {y}");
            }
            let ra = forward.responsibilities(&forward.default_values(), &table).unwrap();
            let rb = swapped.responsibilities(&swapped.default_values(), &table).unwrap();
            for (row_a, row_b) in ra.responsibilities.iter().zip(&rb.responsibilities) {
                prop_assert!((row_a[0] - row_b[1]).abs() < 1e-12);
            }
        }
    }
}
