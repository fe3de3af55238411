//! One-dimensional Gaussian density.
//!
//! If the table carries a `"{feature}_err"` column, the Gaussian is convolved
//! with the per-star measurement error: `scale_eff = sqrt(scale^2 + err^2)`.

use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::math::normal_logpdf;
use crate::params::{Domain, LocalValues, ParamSpec, Parameter, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub struct NormalDensity {
    name: String,
    features: Vec<String>,
    params: ParameterSet,
}

impl NormalDensity {
    pub fn new(name: &str, feature: &str, loc: &ParamSpec, scale: &ParamSpec) -> Result<Self> {
        let mut params = ParameterSet::new();
        params.push(Parameter::new(name, "loc", Domain::Real, 1, loc)?)?;
        params.push(Parameter::new(name, "scale", Domain::Positive, 1, scale)?)?;
        Ok(Self {
            name: name.to_string(),
            features: vec![feature.to_string()],
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

    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let loc = values.scalar("loc")?;
        let scale = values.scalar("scale")?;
        let feature = &self.features[0];
        let x = table.column(feature)?;
        let out = match table.uncertainty(feature) {
            Some(err) => x
                .iter()
                .zip(err)
                .map(|(&xi, &ei)| normal_logpdf(xi, loc, scale.hypot(ei)))
                .collect(),
            None => x.iter().map(|&xi| normal_logpdf(xi, loc, scale)).collect(),
        };
        Ok(out)
    }

    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let loc = values.scalar("loc")?;
        let scale = values.scalar("scale")?;
        let dist = Normal::new(loc, scale)
            .map_err(|e| Error::Computation(format!("component '{}': {e}", self.name)))?;
        Ok(vec![(0..n).map(|_| dist.sample(rng)).collect()])
    }
}
