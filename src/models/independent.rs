//! Independent Feature Model: one population's joint density.
//!
//! Components score disjoint feature sets and are treated as conditionally
//! independent, so the per-star log-density is the sum of component
//! log-densities. A spline component may condition on a feature scored by
//! another component of the same model (e.g. `phi2 | phi1`), which gives a
//! dependency graph that must be acyclic; its topological order is the
//! order used for ancestral sampling.

use std::collections::BTreeMap;

use rand::Rng;

use crate::components::Component;
use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::params::{LocalValues, ParamValues, Parameter, check_name};

#[derive(Debug, Clone, PartialEq)]
pub struct IndependentFeatureModel {
    name: String,
    components: Vec<Component>,
    /// Global parameter names, per component, aligned with each component's parameter set.
    global_names: Vec<Vec<String>>,
    sample_order: Vec<usize>,
}

impl IndependentFeatureModel {
    pub fn new(name: &str, components: Vec<Component>) -> Result<Self> {
        check_name(name)?;
        if components.is_empty() {
            return Err(Error::Config(format!("population '{name}' has no components")));
        }

        let mut owner_of: BTreeMap<&str, usize> = BTreeMap::new();
        for (idx, component) in components.iter().enumerate() {
            check_name(component.name())?;
            if components[..idx].iter().any(|c| c.name() == component.name()) {
                return Err(Error::Config(format!(
                    "population '{name}' has two components named '{}'",
                    component.name()
                )));
            }
            for feature in component.features() {
                if let Some(&other) = owner_of.get(feature.as_str()) {
                    return Err(Error::Config(format!(
                        "population '{name}': feature '{feature}' is scored by both '{}' and '{}'",
                        components[other].name(),
                        component.name()
                    )));
                }
                owner_of.insert(feature, idx);
            }
        }

        let mut depends_on: Vec<Option<usize>> = Vec::with_capacity(components.len());
        for component in &components {
            let dep = match component.control() {
                Some(control) => match owner_of.get(control) {
                    Some(&idx) => Some(idx),
                    None => {
                        return Err(Error::Config(format!(
                            "population '{name}': component '{}' conditions on '{control}', \
                             which no component of this population scores",
                            component.name()
                        )));
                    }
                },
                None => None,
            };
            depends_on.push(dep);
        }
        let sample_order = topological_order(name, &components, &depends_on)?;

        let global_names = components
            .iter()
            .map(|c| {
                c.parameters()
                    .iter()
                    .map(|p| global_name(name, c.name(), &p.name))
                    .collect()
            })
            .collect();

        Ok(Self {
            name: name.to_string(),
            components,
            global_names,
            sample_order,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Component indices in an order where every control feature is produced before it is used.
    pub fn sample_order(&self) -> &[usize] {
        &self.sample_order
    }

    /// Scored features, in component order.
    pub fn features(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|c| c.features().iter().map(String::as_str))
            .collect()
    }

    /// All parameters with their global names.
    pub fn parameters(&self) -> Vec<(&str, &Parameter)> {
        self.components
            .iter()
            .zip(&self.global_names)
            .flat_map(|(c, names)| names.iter().map(String::as_str).zip(c.parameters().iter()))
            .collect()
    }

    /// Fail with a shape error naming the first feature column the table lacks.
    pub fn check_table(&self, table: &FeatureTable) -> Result<()> {
        for component in &self.components {
            for feature in component.features() {
                table.column(feature)?;
            }
            if let Some(control) = component.control() {
                table.column(control)?;
            }
        }
        Ok(())
    }

    fn local_values<'a>(&'a self, idx: usize, values: &'a ParamValues) -> Result<LocalValues<'a>> {
        let component = &self.components[idx];
        let mut local = LocalValues::new(component.name());
        for (param, global) in component.parameters().iter().zip(&self.global_names[idx]) {
            let value = match values.get(global) {
                Some(v) => v,
                None if param.fixed => param.value.as_slice(),
                None => {
                    return Err(Error::Config(format!("no value given for parameter '{global}'")));
                }
            };
            local.push(&param.name, value);
        }
        Ok(local)
    }

    /// Per-star log-density: sum of component log-densities.
    pub fn log_prob(&self, values: &ParamValues, table: &FeatureTable) -> Result<Vec<f64>> {
        self.check_table(table)?;
        let mut total = vec![0.0; table.n_rows()];
        for idx in 0..self.components.len() {
            let local = self.local_values(idx, values)?;
            let lp = self.components[idx].log_prob(&local, table)?;
            for (t, v) in total.iter_mut().zip(lp) {
                *t += v;
            }
        }
        Ok(total)
    }

    /// Sum of parameter log-priors at `values` (fixed parameters contribute nothing).
    pub fn log_prior(&self, values: &ParamValues) -> Result<f64> {
        let mut total = 0.0;
        for (global, param) in self.parameters() {
            if param.fixed {
                continue;
            }
            let value = values
                .get(global)
                .ok_or_else(|| Error::Config(format!("no value given for parameter '{global}'")))?;
            total += param.log_prior(value);
        }
        Ok(total)
    }

    /// Ancestral sampling of `n` stars from this population.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &ParamValues,
        n: usize,
        rng: &mut R,
    ) -> Result<FeatureTable> {
        let mut columns: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for &idx in &self.sample_order {
            let component = &self.components[idx];
            let local = self.local_values(idx, values)?;
            let control = component
                .control()
                .and_then(|c| columns.get(c))
                .map(Vec::as_slice);
            let drawn = component.sample(&local, control, n, rng)?;
            for (feature, column) in component.features().iter().zip(drawn) {
                columns.insert(feature.clone(), column);
            }
        }
        FeatureTable::new(columns)
    }
}

pub fn global_name(population: &str, component: &str, param: &str) -> String {
    format!("{population}:{component}:{param}")
}

/// Repeatedly place a component whose dependency (the owner of its control
/// feature) is already placed; fails when none can be placed.
fn topological_order(
    population: &str,
    components: &[Component],
    depends_on: &[Option<usize>],
) -> Result<Vec<usize>> {
    let n = components.len();
    let mut order = Vec::with_capacity(n);
    let mut placed = vec![false; n];
    while order.len() < n {
        let next = (0..n).find(|&i| !placed[i] && depends_on[i].is_none_or(|d| placed[d]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let stuck: Vec<&str> = (0..n)
                    .filter(|&i| !placed[i])
                    .map(|i| components[i].name())
                    .collect();
                return Err(Error::Config(format!(
                    "population '{population}': circular control dependency among {}",
                    stuck.join(", ")
                )));
            }
        }
    }
    Ok(order)
}
