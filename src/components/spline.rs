//! Density whose shape parameters vary along a control coordinate.
//!
//! `loc` and `scale` are given at the knots of a fixed [`KnotGrid`] over the
//! control feature (e.g. stream longitude). At control value `c` both are
//! interpolated, then the base density (normal or truncated normal) is
//! evaluated on the scored feature.
//!
//! One or two features can be scored. With two (e.g. both proper motions
//! along the track) the base is a diagonal 2-D density: `loc` and `scale`
//! hold one block of `K` knot values per feature, `[f0 knots.., f1 knots..]`,
//! and each block is interpolated on its own.
//!
//! With `monotone_loc` the knot locations use the `Ordered` domain, so the
//! track is strictly increasing and no optimizer or sampler step can fold it.

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

use super::truncated_normal::{check_interval, sample_truncated_normal, truncated_logpdf};
use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::math::{Extrapolation, Interpolation, Interpolator, KnotGrid, log_normal_mass, normal_logpdf};
use crate::params::{Domain, LocalValues, ParamSpec, Parameter, ParameterSet};

/// Most features a spline component can score jointly.
pub const MAX_SPLINE_DIMS: usize = 2;

/// Base density evaluated with the interpolated shape.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SplineBase {
    #[default]
    Normal,
    /// Truncated to `[low, high]` in every scored dimension.
    TruncatedNormal { low: f64, high: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SplineOptions {
    #[serde(default)]
    pub base: SplineBase,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub extrapolation: Extrapolation,
    #[serde(default)]
    pub monotone_loc: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplineDensity {
    name: String,
    features: Vec<String>,
    control: String,
    grid: KnotGrid,
    options: SplineOptions,
    params: ParameterSet,
}

/// Interpolators for one scored dimension.
struct KnotShape<'a> {
    loc: Interpolator<'a>,
    scale: Interpolator<'a>,
}

impl SplineDensity {
    /// 1-D spline density over `feature`.
    pub fn new(
        name: &str,
        feature: &str,
        control: &str,
        grid: KnotGrid,
        loc: &ParamSpec,
        scale: &ParamSpec,
        options: SplineOptions,
    ) -> Result<Self> {
        Self::joint(name, &[feature], control, grid, loc, scale, options)
    }

    /// Spline density over one or two jointly scored features.
    pub fn joint(
        name: &str,
        features: &[&str],
        control: &str,
        grid: KnotGrid,
        loc: &ParamSpec,
        scale: &ParamSpec,
        options: SplineOptions,
    ) -> Result<Self> {
        if features.is_empty() || features.len() > MAX_SPLINE_DIMS {
            return Err(Error::Config(format!(
                "component '{name}': a spline scores 1 to {MAX_SPLINE_DIMS} features (got {})",
                features.len()
            )));
        }
        if features.len() == 2 && features[0] == features[1] {
            return Err(Error::Config(format!(
                "component '{name}': feature '{}' listed twice",
                features[0]
            )));
        }
        if features.contains(&control) {
            return Err(Error::Config(format!(
                "component '{name}': control feature '{control}' is also a scored feature"
            )));
        }
        if options.monotone_loc && features.len() > 1 {
            return Err(Error::Config(format!(
                "component '{name}': monotone_loc needs a single scored feature"
            )));
        }
        if let SplineBase::TruncatedNormal { low, high } = options.base {
            check_interval(name, low, high)?;
        }
        let len = grid.len() * features.len();
        let loc_domain = if options.monotone_loc { Domain::Ordered } else { Domain::Real };
        let mut params = ParameterSet::new();
        params.push(Parameter::new(name, "loc", loc_domain, len, loc)?)?;
        params.push(Parameter::new(name, "scale", Domain::Positive, len, scale)?)?;
        Ok(Self {
            name: name.to_string(),
            features: features.iter().map(|f| f.to_string()).collect(),
            control: control.to_string(),
            grid,
            options,
            params,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn dims(&self) -> usize {
        self.features.len()
    }

    pub fn control(&self) -> &str {
        &self.control
    }

    pub fn grid(&self) -> &KnotGrid {
        &self.grid
    }

    pub fn options(&self) -> &SplineOptions {
        &self.options
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.params
    }

    fn shapes<'a>(&'a self, values: &LocalValues<'a>) -> Result<Vec<KnotShape<'a>>> {
        let k = self.grid.len();
        let loc = values.get_len("loc", k * self.dims())?;
        let scale = values.get_len("scale", k * self.dims())?;
        loc.chunks(k)
            .zip(scale.chunks(k))
            .map(|(l, s)| {
                Ok(KnotShape {
                    loc: self.grid.interpolator(l, self.options.interpolation)?,
                    scale: self.grid.interpolator(s, self.options.interpolation)?,
                })
            })
            .collect()
    }

    fn out_of_range(&self, c: f64) -> Error {
        Error::Shape(format!(
            "spline component '{}': control value {c} outside knot range [{}, {}]",
            self.name,
            self.grid.low(),
            self.grid.high()
        ))
    }

    fn eval_shape(&self, shape: &KnotShape<'_>, c: f64) -> Result<(f64, f64)> {
        let policy = self.options.extrapolation;
        match (shape.loc.eval(c, policy), shape.scale.eval(c, policy)) {
            (Some(l), Some(s)) => Ok((l, s)),
            _ => Err(self.out_of_range(c)),
        }
    }

    /// Interpolated `(loc, scale)` per scored feature at one control value.
    pub fn shape_at(&self, values: &LocalValues<'_>, c: f64) -> Result<Vec<(f64, f64)>> {
        self.shapes(values)?
            .iter()
            .map(|shape| self.eval_shape(shape, c))
            .collect()
    }

    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        let control = table.column(&self.control)?;
        let shapes = self.shapes(values)?;
        let mut out = vec![0.0; control.len()];
        for (feature, shape) in self.features.iter().zip(&shapes) {
            let x = table.column(feature)?;
            let err = match self.options.base {
                SplineBase::Normal => table.uncertainty(feature),
                SplineBase::TruncatedNormal { .. } => None,
            };
            for (i, (&xi, &ci)) in x.iter().zip(control).enumerate() {
                let (loc, scale) = self.eval_shape(shape, ci)?;
                out[i] += match self.options.base {
                    SplineBase::Normal => {
                        let s = match err {
                            Some(e) => scale.hypot(e[i]),
                            None => scale,
                        };
                        normal_logpdf(xi, loc, s)
                    }
                    SplineBase::TruncatedNormal { low, high } => {
                        let log_z = log_normal_mass((low - loc) / scale, (high - loc) / scale);
                        truncated_logpdf(xi, loc, scale, low, high, log_z)
                    }
                };
            }
        }
        Ok(out)
    }

    /// Draw one row per control value, one column per scored feature.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        control: &[f64],
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let shapes = self.shapes(values)?;
        let mut out = vec![Vec::with_capacity(control.len()); self.dims()];
        for &ci in control {
            for (column, shape) in out.iter_mut().zip(&shapes) {
                let (loc, scale) = self.eval_shape(shape, ci)?;
                let x = match self.options.base {
                    SplineBase::Normal => {
                        let z: f64 = StandardNormal.sample(rng);
                        loc + scale * z
                    }
                    SplineBase::TruncatedNormal { low, high } => {
                        sample_truncated_normal(loc, scale, low, high, rng)
                    }
                };
                column.push(x);
            }
        }
        Ok(out)
    }
}
