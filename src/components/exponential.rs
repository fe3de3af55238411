//! Exponential density over `x - low`, optionally truncated at `high`.

use rand::Rng;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::params::{Domain, LocalValues, ParamSpec, Parameter, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialDensity {
    name: String,
    features: Vec<String>,
    low: f64,
    high: Option<f64>,
    params: ParameterSet,
}

impl ExponentialDensity {
    pub fn new(name: &str, feature: &str, rate: &ParamSpec, low: f64, high: Option<f64>) -> Result<Self> {
        if !low.is_finite() {
            return Err(Error::Config(format!("component '{name}': low must be finite")));
        }
        if let Some(h) = high {
            super::truncated_normal::check_interval(name, low, h)?;
        }
        let mut params = ParameterSet::new();
        params.push(Parameter::new(name, "rate", Domain::Positive, 1, rate)?)?;
        Ok(Self {
            name: name.to_string(),
            features: vec![feature.to_string()],
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

    /// `ln(1 - exp(-rate * (high - low)))`, or 0 without an upper bound.
    fn log_mass(&self, rate: f64) -> f64 {
        match self.high {
            Some(h) => (-(-rate * (h - self.low)).exp_m1()).ln(),
            None => 0.0,
        }
    }

    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let rate = values.scalar("rate")?;
        let x = table.column(&self.features[0])?;
        let log_norm = rate.ln() - self.log_mass(rate);
        let high = self.high.unwrap_or(f64::INFINITY);
        Ok(x
            .iter()
            .map(|&xi| {
                if xi < self.low || xi > high {
                    f64::NEG_INFINITY
                } else {
                    log_norm - rate * (xi - self.low)
                }
            })
            .collect())
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let rate = values.scalar("rate")?;
        let mass = match self.high {
            Some(h) => -(-rate * (h - self.low)).exp_m1(),
            None => 1.0,
        };
        let high = self.high.unwrap_or(f64::INFINITY);
        Ok(vec![
            (0..n)
                .map(|_| {
                    let u: f64 = rng.r#gen();
                    let x = self.low - (-u * mass).ln_1p() / rate;
                    x.min(high)
                })
                .collect(),
        ])
    }
}
