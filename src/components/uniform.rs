//! Uniform density over a fixed 1-D interval or multi-D box. No free parameters.

use rand::Rng;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::params::{LocalValues, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub struct UniformDensity {
    name: String,
    features: Vec<String>,
    low: Vec<f64>,
    high: Vec<f64>,
    params: ParameterSet,
}

impl UniformDensity {
    pub fn new(name: &str, features: Vec<String>, low: Vec<f64>, high: Vec<f64>) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::Config(format!("component '{name}' scores no features")));
        }
        if low.len() != features.len() || high.len() != features.len() {
            return Err(Error::Config(format!(
                "component '{name}': box bounds need one low/high per feature ({} features)",
                features.len()
            )));
        }
        for (l, h) in low.iter().zip(&high) {
            if !(l.is_finite() && h.is_finite()) {
                return Err(Error::Config(format!("component '{name}': box bounds must be finite")));
            }
            super::truncated_normal::check_interval(name, *l, *h)?;
        }
        Ok(Self {
            name: name.to_string(),
            features,
            low,
            high,
            params: ParameterSet::new(),
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

    pub fn log_prob(&self, _values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let columns = self
            .features
            .iter()
            .map(|f| table.column(f))
            .collect::<Result<Vec<_>>>()?;
        let log_volume: f64 = self.low.iter().zip(&self.high).map(|(l, h)| (h - l).ln()).sum();
        Ok((0..table.n_rows())
            .map(|i| {
                let inside = columns
                    .iter()
                    .enumerate()
                    .all(|(d, col)| col[i] >= self.low[d] && col[i] <= self.high[d]);
                if inside { -log_volume } else { f64::NEG_INFINITY }
            })
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<Vec<f64>> {
        self.low
            .iter()
            .zip(&self.high)
            .map(|(&l, &h)| (0..n).map(|_| rng.gen_range(l..h)).collect())
            .collect()
    }
}
