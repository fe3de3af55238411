//! Synthetic star catalogs drawn from a mixture model.
//!
//! Labels are drawn from the mixing weights first; each population then draws
//! its stars by ancestral sampling (control features before the splines that
//! condition on them). Rows keep the label order, so `labels[i]` is the true
//! population of row `i`.

use rand::SeedableRng;
use rand::distributions::WeightedIndex;
use rand::rngs::StdRng;
use rand_distr::Distribution;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::models::MixtureModel;
use crate::params::ParamValues;

#[derive(Debug, Clone)]
pub struct SyntheticSample {
    pub table: FeatureTable,
    pub labels: Vec<usize>,
}

impl SyntheticSample {
    /// Number of stars drawn from population `k`.
    pub fn count(&self, k: usize) -> usize {
        self.labels.iter().filter(|&&l| l == k).count()
    }
}

pub fn simulate(model: &MixtureModel, values: &ParamValues, n: usize, seed: u64) -> Result<SyntheticSample> {
    if n == 0 {
        return Err(Error::Config("sample count must be > 0".into()));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let weights = model.weight_values(values)?;
    let picker = WeightedIndex::new(weights)
        .map_err(|e| Error::Computation(format!("cannot draw population labels: {e}")))?;
    let labels: Vec<usize> = (0..n).map(|_| picker.sample(&mut rng)).collect();

    let populations = model.populations();
    let mut drawn = Vec::with_capacity(populations.len());
    for (k, population) in populations.iter().enumerate() {
        let count = labels.iter().filter(|&&l| l == k).count();
        drawn.push(population.sample(values, count, &mut rng)?);
    }

    // Every population scores the same features, so any one names the columns.
    let names: Vec<String> = drawn[0].column_names().cloned().collect();
    let mut columns: Vec<(String, Vec<f64>)> =
        names.into_iter().map(|name| (name, Vec::with_capacity(n))).collect();
    let mut cursor = vec![0usize; populations.len()];
    for &label in &labels {
        let row = cursor[label];
        cursor[label] += 1;
        for (name, column) in columns.iter_mut() {
            column.push(drawn[label].column(name)?[row]);
        }
    }

    let ids = (0..n).map(|i| format!("star-{i:06}")).collect();
    let table = FeatureTable::new(columns)?.with_ids(ids)?;
    Ok(SyntheticSample { table, labels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{NormalDensity, SplineDensity, SplineOptions, UniformDensity};
    use crate::math::KnotGrid;
    use crate::models::IndependentFeatureModel;
    use crate::params::{ParamSpec, Prior};

    fn stream_model() -> MixtureModel {
        let phi1 = NormalDensity::new(
            "phi1",
            "phi1",
            &ParamSpec::new(0.0, Prior::Flat),
            &ParamSpec::new(3.0, Prior::Flat),
        )
        .unwrap();
        let track = SplineDensity::new(
            "track",
            "phi2",
            "phi1",
            KnotGrid::new(vec![-10.0, 10.0]).unwrap(),
            &ParamSpec::new(vec![-2.0, 2.0], Prior::Flat),
            &ParamSpec::new(0.1, Prior::Flat),
            SplineOptions::default(),
        )
        .unwrap();
        let stream = IndependentFeatureModel::new("stream", vec![phi1.into(), track.into()]).unwrap();
        let sky = UniformDensity::new(
            "sky",
            vec!["phi1".into(), "phi2".into()],
            vec![-10.0, -5.0],
            vec![10.0, 5.0],
        )
        .unwrap();
        let background = IndependentFeatureModel::new("background", vec![sky.into()]).unwrap();
        MixtureModel::new(vec![stream, background], &ParamSpec::new(vec![0.3, 0.7], Prior::Flat)).unwrap()
    }

    #[test]
    fn labels_follow_weights_and_rows_match_labels() {
        let model = stream_model();
        let sample = simulate(&model, &model.default_values(), 4000, 17).unwrap();
        assert_eq!(sample.table.n_rows(), 4000);
        let frac = sample.count(0) as f64 / 4000.0;
        assert!((frac - 0.3).abs() < 0.03, "stream fraction {frac}");

        // Stream stars follow the track phi2 = phi1 / 5 closely.
        let phi1 = sample.table.column("phi1").unwrap();
        let phi2 = sample.table.column("phi2").unwrap();
        for (i, &label) in sample.labels.iter().enumerate() {
            if label == 0 {
                let expected = (phi1[i].clamp(-10.0, 10.0)) / 5.0;
                assert!((phi2[i] - expected).abs() < 1.0);
            } else {
                assert!((-5.0..5.0).contains(&phi2[i]));
            }
        }
    }

    #[test]
    fn same_seed_same_catalog() {
        let model = stream_model();
        let a = simulate(&model, &model.default_values(), 100, 3).unwrap();
        let b = simulate(&model, &model.default_values(), 100, 3).unwrap();
        assert_eq!(a.labels, b.labels);
        assert_eq!(a.table, b.table);
    }
}
