//! Declarative model configuration.
//!
//! A model is described in JSON and built into a [`MixtureModel`]:
//!
//! ```json
//! {
//!   "populations": [
//!     { "name": "stream", "components": [
//!         { "kind": "normal", "name": "pm", "feature": "pm1",
//!           "loc": { "init": -3.0, "prior": { "dist": "normal", "loc": 0.0, "scale": 10.0 } },
//!           "scale": { "init": 0.5 } } ] },
//!     ...
//!   ],
//!   "weights": { "init": [0.1, 0.9], "prior": { "dist": "dirichlet", "concentration": [1.0, 1.0] } }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::components::{
    Component, ExponentialDensity, NormalDensity, SplineBase, SplineDensity, SplineOptions,
    TruncatedGridGmm, TruncatedNormalDensity, UniformDensity,
};
use crate::error::Result;
use crate::math::{Extrapolation, Interpolation, KnotGrid};
use crate::models::{IndependentFeatureModel, MixtureModel};
use crate::params::ParamSpec;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub populations: Vec<PopulationConfig>,
    pub weights: ParamSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopulationConfig {
    pub name: String,
    pub components: Vec<ComponentConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentConfig {
    Normal {
        name: String,
        feature: String,
        loc: ParamSpec,
        scale: ParamSpec,
    },
    TruncatedNormal {
        name: String,
        feature: String,
        loc: ParamSpec,
        scale: ParamSpec,
        low: f64,
        high: f64,
    },
    Exponential {
        name: String,
        feature: String,
        rate: ParamSpec,
        #[serde(default)]
        low: f64,
        #[serde(default)]
        high: Option<f64>,
    },
    Uniform {
        name: String,
        features: Vec<String>,
        low: Vec<f64>,
        high: Vec<f64>,
    },
    TruncatedGridGmm {
        name: String,
        features: Vec<String>,
        locs: Vec<Vec<f64>>,
        #[serde(default)]
        low: Option<Vec<f64>>,
        #[serde(default)]
        high: Option<Vec<f64>>,
        weights: ParamSpec,
        scales: ParamSpec,
    },
    Spline {
        name: String,
        #[serde(alias = "features")]
        feature: ScoredFeatures,
        control: String,
        knots: Vec<f64>,
        loc: ParamSpec,
        scale: ParamSpec,
        #[serde(default)]
        base: SplineBase,
        #[serde(default)]
        interpolation: Interpolation,
        #[serde(default)]
        extrapolation: Extrapolation,
        #[serde(default)]
        monotone_loc: bool,
    },
}

/// One feature name, or a list of jointly scored features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoredFeatures {
    One(String),
    Many(Vec<String>),
}

impl ScoredFeatures {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ScoredFeatures::One(name) => vec![name.as_str()],
            ScoredFeatures::Many(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl ComponentConfig {
    pub fn build(&self) -> Result<Component> {
        let component = match self {
            ComponentConfig::Normal { name, feature, loc, scale } => {
                NormalDensity::new(name, feature, loc, scale)?.into()
            }
            ComponentConfig::TruncatedNormal { name, feature, loc, scale, low, high } => {
                TruncatedNormalDensity::new(name, feature, loc, scale, *low, *high)?.into()
            }
            ComponentConfig::Exponential { name, feature, rate, low, high } => {
                ExponentialDensity::new(name, feature, rate, *low, *high)?.into()
            }
            ComponentConfig::Uniform { name, features, low, high } => {
                UniformDensity::new(name, features.clone(), low.clone(), high.clone())?.into()
            }
            ComponentConfig::TruncatedGridGmm { name, features, locs, low, high, weights, scales } => {
                TruncatedGridGmm::new(
                    name,
                    features.clone(),
                    locs.clone(),
                    low.clone(),
                    high.clone(),
                    weights,
                    scales,
                )?
                .into()
            }
            ComponentConfig::Spline {
                name,
                feature,
                control,
                knots,
                loc,
                scale,
                base,
                interpolation,
                extrapolation,
                monotone_loc,
            } => {
                let grid = KnotGrid::new(knots.clone())?;
                let options = SplineOptions {
                    base: *base,
                    interpolation: *interpolation,
                    extrapolation: *extrapolation,
                    monotone_loc: *monotone_loc,
                };
                SplineDensity::joint(name, &feature.names(), control, grid, loc, scale, options)?.into()
            }
        };
        Ok(component)
    }
}

impl PopulationConfig {
    pub fn build(&self) -> Result<IndependentFeatureModel> {
        let components = self
            .components
            .iter()
            .map(ComponentConfig::build)
            .collect::<Result<Vec<_>>>()?;
        IndependentFeatureModel::new(&self.name, components)
    }
}

impl ModelConfig {
    pub fn build(&self) -> Result<MixtureModel> {
        let populations = self
            .populations
            .iter()
            .map(PopulationConfig::build)
            .collect::<Result<Vec<_>>>()?;
        MixtureModel::new(populations, &self.weights)
    }
}
