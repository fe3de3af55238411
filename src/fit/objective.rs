//! The fit objective in unconstrained space.
//!
//! Every free parameter is mapped through its domain transform, so the
//! optimizer and samplers move over plain `R^d`:
//!
//! - [`ParameterLayout`] packs free parameters into one flat vector and back
//! - [`Posterior`] evaluates `log-likelihood + log-prior` (plus `log|J|` for
//!   sampling) at a flat unconstrained point
//! - [`GradientProvider`] supplies gradients; the default is central finite
//!   differences, computed in parallel over coordinates

use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::models::MixtureModel;
use crate::params::{Domain, ParamValues};

/// A log-density over an unconstrained vector.
pub trait LogDensity: Send + Sync {
    fn dim(&self) -> usize;

    fn log_density(&self, z: &[f64]) -> Result<f64>;
}

/// Gradient of a [`LogDensity`] (numerical if not overridden).
pub trait GradientProvider: LogDensity {
    fn gradient(&self, z: &[f64]) -> Result<Vec<f64>> {
        (0..z.len())
            .into_par_iter()
            .map(|i| {
                let h = 1e-5 * z[i].abs().max(1.0);
                let mut plus = z.to_vec();
                plus[i] += h;
                let mut minus = z.to_vec();
                minus[i] -= h;
                let f_plus = self.log_density(&plus)?;
                let f_minus = self.log_density(&minus)?;
                Ok((f_plus - f_minus) / (2.0 * h))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutEntry {
    pub name: String,
    pub domain: Domain,
    /// Constrained length.
    pub len: usize,
    /// Start in the flat unconstrained vector.
    pub offset: usize,
    /// Unconstrained length.
    pub dim: usize,
}

/// Placement of every free parameter in the flat unconstrained vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterLayout {
    entries: Vec<LayoutEntry>,
    fixed: ParamValues,
    dim: usize,
}

impl ParameterLayout {
    pub fn from_model(model: &MixtureModel) -> Self {
        let mut entries = Vec::new();
        let mut fixed = ParamValues::new();
        let mut offset = 0;
        for (name, param) in model.parameters() {
            if param.fixed {
                fixed.insert(name, param.value.clone());
                continue;
            }
            let dim = param.domain.unconstrained_len(param.len());
            entries.push(LayoutEntry {
                name: name.to_string(),
                domain: param.domain,
                len: param.len(),
                offset,
                dim,
            });
            offset += dim;
        }
        Self {
            entries,
            fixed,
            dim: offset,
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn entries(&self) -> &[LayoutEntry] {
        &self.entries
    }

    /// Constrained values (fixed parameters included) for unconstrained `z`.
    pub fn to_values(&self, z: &[f64]) -> ParamValues {
        let mut values = self.fixed.clone();
        for e in &self.entries {
            values.insert(e.name.clone(), e.domain.forward(&z[e.offset..e.offset + e.dim]));
        }
        values
    }

    /// Flat unconstrained vector for `values`, which must cover every free parameter.
    pub fn to_unconstrained(&self, values: &ParamValues) -> Result<Vec<f64>> {
        let mut z = Vec::with_capacity(self.dim);
        for e in &self.entries {
            let v = values
                .get(&e.name)
                .ok_or_else(|| Error::Config(format!("no value given for parameter '{}'", e.name)))?;
            if v.len() != e.len {
                return Err(Error::Config(format!(
                    "parameter '{}' has {} values, expected {}",
                    e.name,
                    v.len(),
                    e.len
                )));
            }
            e.domain
                .check(v)
                .map_err(|constraint| Error::domain("fit", &e.name, constraint))?;
            z.extend(e.domain.inverse(v));
        }
        Ok(z)
    }

    pub fn log_abs_det_jacobian(&self, z: &[f64]) -> f64 {
        self.entries
            .iter()
            .map(|e| e.domain.log_abs_det_jacobian(&z[e.offset..e.offset + e.dim]))
            .sum()
    }
}

/// Log posterior of a mixture model over a feature table, in unconstrained space.
pub struct Posterior<'a> {
    model: &'a MixtureModel,
    table: &'a FeatureTable,
    layout: ParameterLayout,
    jacobian: bool,
    evaluations: AtomicUsize,
}

impl<'a> Posterior<'a> {
    /// With `jacobian`, the density is over `z` (sampling); without, it is the
    /// constrained-space posterior read through the transform (mode finding).
    pub fn new(model: &'a MixtureModel, table: &'a FeatureTable, jacobian: bool) -> Self {
        Self {
            model,
            table,
            layout: ParameterLayout::from_model(model),
            jacobian,
            evaluations: AtomicUsize::new(0),
        }
    }

    pub fn layout(&self) -> &ParameterLayout {
        &self.layout
    }

    pub fn model(&self) -> &MixtureModel {
        self.model
    }

    pub fn table(&self) -> &FeatureTable {
        self.table
    }

    pub fn evaluations(&self) -> usize {
        self.evaluations.load(Ordering::Relaxed)
    }
}

impl LogDensity for Posterior<'_> {
    fn dim(&self) -> usize {
        self.layout.dim()
    }

    fn log_density(&self, z: &[f64]) -> Result<f64> {
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        let values = self.layout.to_values(z);
        let mut lp = self.model.log_posterior(&values, self.table)?;
        if self.jacobian {
            lp += self.layout.log_abs_det_jacobian(z);
        }
        Ok(if lp.is_nan() { f64::NEG_INFINITY } else { lp })
    }
}

impl GradientProvider for Posterior<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::NormalDensity;
    use crate::models::IndependentFeatureModel;
    use crate::params::{ParamSpec, Prior};
    use approx::assert_relative_eq;

    struct Quadratic;

    impl LogDensity for Quadratic {
        fn dim(&self) -> usize {
            2
        }

        fn log_density(&self, z: &[f64]) -> Result<f64> {
            Ok(-(z[0] - 1.0).powi(2) - 3.0 * (z[1] + 2.0).powi(2))
        }
    }

    impl GradientProvider for Quadratic {}

    fn model(fixed_scale: bool) -> MixtureModel {
        let pop = |name: &str, loc: f64| {
            let scale = if fixed_scale {
                ParamSpec::fixed(1.0)
            } else {
                ParamSpec::new(1.0, Prior::HalfNormal { scale: 2.0 })
            };
            let c = NormalDensity::new("pm", "pm1", &ParamSpec::new(loc, Prior::Flat), &scale).unwrap();
            IndependentFeatureModel::new(name, vec![c.into()]).unwrap()
        };
        MixtureModel::new(
            vec![pop("stream", 0.0), pop("background", 3.0)],
            &ParamSpec::new(vec![0.4, 0.6], Prior::Dirichlet { concentration: vec![1.0, 1.0] }),
        )
        .unwrap()
    }

    #[test]
    fn finite_difference_gradient_of_quadratic() {
        let g = Quadratic.gradient(&[0.0, 0.0]).unwrap();
        assert_relative_eq!(g[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(g[1], -12.0, epsilon = 1e-6);
    }

    #[test]
    fn layout_skips_fixed_parameters_and_round_trips() {
        let model = model(true);
        let layout = ParameterLayout::from_model(&model);
        // Simplex of 2 -> 1 coordinate, plus two locs.
        assert_eq!(layout.dim(), 3);
        let defaults = model.default_values();
        let z = layout.to_unconstrained(&defaults).unwrap();
        let back = layout.to_values(&z);
        for (name, v) in defaults.iter() {
            let b = back.get(name).unwrap();
            for (x, y) in v.iter().zip(b) {
                assert_relative_eq!(*x, *y, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn jacobian_only_changes_sampling_density() {
        let model = model(false);
        let table = FeatureTable::new([("pm1", vec![0.1, 2.9, 1.4])]).unwrap();
        let plain = Posterior::new(&model, &table, false);
        let sampling = Posterior::new(&model, &table, true);
        let z = plain.layout().to_unconstrained(&model.default_values()).unwrap();
        let direct = model.log_posterior(&model.default_values(), &table).unwrap();
        assert_relative_eq!(plain.log_density(&z).unwrap(), direct, epsilon = 1e-9);
        let jac = sampling.layout().log_abs_det_jacobian(&z);
        assert_relative_eq!(sampling.log_density(&z).unwrap(), direct + jac, epsilon = 1e-9);
        assert_eq!(plain.evaluations(), 1);
    }
}
