//! Truncated Gaussian mixture with fixed grid centres.
//!
//! K Gaussians over D features with fixed locations `locs[k][d]` and diagonal
//! scales, truncated to a box `[low_d, high_d]`. Each Gaussian is renormalized
//! by its own in-box mass, then the K are mixed with simplex `weights`:
//!
//! ```text
//! log p(x) = logsumexp_k( ln w_k + sum_d [ log N(x_d | loc_kd, s_kd) - ln M_kd ] )
//! ```
//!
//! Free parameters: `weights` (simplex, length K) and `scales` (positive,
//! length K*D, row-major by component).

use rand::Rng;
use rand::distributions::WeightedIndex;
use rand_distr::Distribution;

use super::truncated_normal::{check_interval, sample_truncated_normal};
use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::math::{log_normal_mass, logsumexp, normal_logpdf};
use crate::params::{Domain, LocalValues, ParamSpec, Parameter, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub struct TruncatedGridGmm {
    name: String,
    features: Vec<String>,
    locs: Vec<Vec<f64>>,
    low: Vec<f64>,
    high: Vec<f64>,
    params: ParameterSet,
}

impl TruncatedGridGmm {
    pub fn new(
        name: &str,
        features: Vec<String>,
        locs: Vec<Vec<f64>>,
        low: Option<Vec<f64>>,
        high: Option<Vec<f64>>,
        weights: &ParamSpec,
        scales: &ParamSpec,
    ) -> Result<Self> {
        let d = features.len();
        if d == 0 {
            return Err(Error::Config(format!("component '{name}' scores no features")));
        }
        if locs.len() < 2 {
            return Err(Error::Config(format!(
                "component '{name}' needs at least 2 grid locations (got {})",
                locs.len()
            )));
        }
        if let Some(row) = locs.iter().find(|row| row.len() != d) {
            return Err(Error::Config(format!(
                "component '{name}': grid location has {} coordinates for {d} features",
                row.len()
            )));
        }
        let low = low.unwrap_or_else(|| vec![f64::NEG_INFINITY; d]);
        let high = high.unwrap_or_else(|| vec![f64::INFINITY; d]);
        if low.len() != d || high.len() != d {
            return Err(Error::Config(format!(
                "component '{name}': truncation bounds need one value per feature ({d})"
            )));
        }
        for (l, h) in low.iter().zip(&high) {
            check_interval(name, *l, *h)?;
        }

        let k = locs.len();
        let mut params = ParameterSet::new();
        params.push(Parameter::new(name, "weights", Domain::Simplex, k, weights)?)?;
        params.push(Parameter::new(name, "scales", Domain::Positive, k * d, scales)?)?;
        Ok(Self {
            name: name.to_string(),
            features,
            locs,
            low,
            high,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    pub fn n_centres(&self) -> usize {
        self.locs.len()
    }

    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let k = self.locs.len();
        let d = self.features.len();
        let weights = values.get_len("weights", k)?;
        let scales = values.get_len("scales", k * d)?;
        let columns = self
            .features
            .iter()
            .map(|f| table.column(f))
            .collect::<Result<Vec<_>>>()?;

        // Per-centre constant: ln w_k minus the log in-box mass of that Gaussian.
        let offsets: Vec<f64> = (0..k)
            .map(|c| {
                let mass: f64 = (0..d)
                    .map(|j| {
                        let s = scales[c * d + j];
                        let m = self.locs[c][j];
                        log_normal_mass((self.low[j] - m) / s, (self.high[j] - m) / s)
                    })
                    .sum();
                weights[c].ln() - mass
            })
            .collect();

        let mut terms = vec![0.0; k];
        Ok((0..table.n_rows())
            .map(|i| {
                let inside = (0..d).all(|j| columns[j][i] >= self.low[j] && columns[j][i] <= self.high[j]);
                if !inside {
                    return f64::NEG_INFINITY;
                }
                for (c, term) in terms.iter_mut().enumerate() {
                    *term = offsets[c]
                        + (0..d)
                            .map(|j| normal_logpdf(columns[j][i], self.locs[c][j], scales[c * d + j]))
                            .sum::<f64>();
                }
                logsumexp(&terms)
            })
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let k = self.locs.len();
        let d = self.features.len();
        let weights = values.get_len("weights", k)?;
        let scales = values.get_len("scales", k * d)?;
        let picker = WeightedIndex::new(weights)
            .map_err(|e| Error::Computation(format!("component '{}': {e}", self.name)))?;

        let mut columns = vec![Vec::with_capacity(n); d];
        for _ in 0..n {
            let c = picker.sample(rng);
            for (j, column) in columns.iter_mut().enumerate() {
                column.push(sample_truncated_normal(
                    self.locs[c][j],
                    scales[c * d + j],
                    self.low[j],
                    self.high[j],
                    rng,
                ));
            }
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Prior;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn gmm() -> TruncatedGridGmm {
        TruncatedGridGmm::new(
            "bg",
            vec!["phi2".into()],
            vec![vec![-1.0], vec![0.0], vec![1.0]],
            Some(vec![-2.0]),
            Some(vec![2.0]),
            &ParamSpec::new(vec![0.2, 0.5, 0.3], Prior::Flat),
            &ParamSpec::new(0.6, Prior::Flat),
        )
        .unwrap()
    }

    #[test]
    fn integrates_to_one_in_box() {
        let d = gmm();
        let n = 40_000;
        let h = 4.0 / n as f64;
        let xs: Vec<f64> = (0..n).map(|i| -2.0 + (i as f64 + 0.5) * h).collect();
        let table = FeatureTable::new([("phi2", xs)]).unwrap();
        let weights = [0.2, 0.5, 0.3];
        let scales = [0.6, 0.6, 0.6];
        let values = LocalValues::new("bg").with("weights", &weights).with("scales", &scales);
        let integral: f64 = d.log_prob(&values, &table).unwrap().iter().map(|v| v.exp() * h).sum();
        assert!((integral - 1.0).abs() < 1e-6, "integral = {integral}");
    }

    #[test]
    fn outside_box_is_neg_infinity() {
        let d = gmm();
        let table = FeatureTable::new([("phi2", vec![2.5])]).unwrap();
        let weights = [0.2, 0.5, 0.3];
        let scales = [0.6, 0.6, 0.6];
        let values = LocalValues::new("bg").with("weights", &weights).with("scales", &scales);
        assert_eq!(d.log_prob(&values, &table).unwrap()[0], f64::NEG_INFINITY);
    }

    #[test]
    fn rejects_ragged_locations() {
        let err = TruncatedGridGmm::new(
            "bg",
            vec!["a".into(), "b".into()],
            vec![vec![0.0, 0.0], vec![1.0]],
            None,
            None,
            &ParamSpec::new(vec![0.5, 0.5], Prior::Flat),
            &ParamSpec::new(1.0, Prior::Flat),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn samples_stay_in_box() {
        let d = gmm();
        let weights = [0.2, 0.5, 0.3];
        let scales = [0.6, 0.6, 0.6];
        let values = LocalValues::new("bg").with("weights", &weights).with("scales", &scales);
        let mut rng = StdRng::seed_from_u64(5);
        let cols = d.sample(&values, 500, &mut rng).unwrap();
        assert!(cols[0].iter().all(|&x| (-2.0..=2.0).contains(&x)));
    }
}
