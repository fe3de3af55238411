//! Named parameters, their configuration and value maps.
//!
//! - [`Parameter`]: one named, typed parameter owned by a component or by the mixture
//! - [`ParamSpec`]: how a parameter is configured (initial value, prior, fixed flag)
//! - [`ParamValues`]: a full assignment keyed by global name
//!   (`"{population}:{component}:{param}"`, or `"mixture-probs"` for the weights)
//! - [`LocalValues`]: the slice of an assignment one component sees, keyed by local name

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::params::{Domain, Prior};

/// Initial value given either as a scalar (broadcast) or as a full vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InitValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl InitValue {
    /// Expand to exactly `len` values.
    pub fn expand(&self, len: usize) -> std::result::Result<Vec<f64>, String> {
        match self {
            InitValue::Scalar(v) => Ok(vec![*v; len]),
            InitValue::Vector(v) if v.len() == len => Ok(v.clone()),
            InitValue::Vector(v) => Err(format!("expected {len} values, got {}", v.len())),
        }
    }
}

impl From<f64> for InitValue {
    fn from(v: f64) -> Self {
        InitValue::Scalar(v)
    }
}

impl From<Vec<f64>> for InitValue {
    fn from(v: Vec<f64>) -> Self {
        InitValue::Vector(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub init: InitValue,
    #[serde(default)]
    pub prior: Prior,
    /// Fixed parameters keep their initial value and are never fit.
    #[serde(default)]
    pub fixed: bool,
}

impl ParamSpec {
    pub fn new(init: impl Into<InitValue>, prior: Prior) -> Self {
        Self {
            init: init.into(),
            prior,
            fixed: false,
        }
    }

    pub fn fixed(init: impl Into<InitValue>) -> Self {
        Self {
            init: init.into(),
            prior: Prior::Flat,
            fixed: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub domain: Domain,
    pub prior: Prior,
    pub value: Vec<f64>,
    pub fixed: bool,
}

impl Parameter {
    /// Build a parameter of length `len` owned by `owner`, checking the
    /// initial value against `domain` and the prior's hyperparameters.
    pub fn new(owner: &str, name: &str, domain: Domain, len: usize, spec: &ParamSpec) -> Result<Self> {
        check_name(name)?;
        let value = spec
            .init
            .expand(len)
            .map_err(|msg| Error::domain(owner, name, msg))?;
        domain
            .check(&value)
            .map_err(|constraint| Error::domain(owner, name, constraint))?;
        spec.prior
            .validate(len)
            .map_err(|msg| Error::Config(format!("parameter '{name}' of '{owner}': {msg}")))?;
        Ok(Self {
            name: name.to_string(),
            domain,
            prior: spec.prior.clone(),
            value,
            fixed: spec.fixed,
        })
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn log_prior(&self, value: &[f64]) -> f64 {
        if self.fixed { 0.0 } else { self.prior.log_prob(value) }
    }
}

/// Names become parts of `a:b:c` global names, so they may not contain `:`.
pub fn check_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains(':') {
        return Err(Error::Config(format!(
            "invalid name '{name}': names must be non-empty and may not contain ':'"
        )));
    }
    Ok(())
}

/// Ordered set of parameters with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    params: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, param: Parameter) -> Result<()> {
        if self.get(&param.name).is_some() {
            return Err(Error::Config(format!("duplicate parameter name '{}'", param.name)));
        }
        self.params.push(param);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// A complete parameter assignment keyed by global name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamValues {
    values: BTreeMap<String, Vec<f64>>,
}

impl ParamValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Vec<f64>) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.values.get(name).map(Vec::as_slice)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|v| v.first().copied())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<f64>)> {
        self.values.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Vec<f64>)> for ParamValues {
    fn from_iter<T: IntoIterator<Item = (String, Vec<f64>)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Values for one component, keyed by the component's local parameter names.
#[derive(Debug, Clone, Default)]
pub struct LocalValues<'a> {
    owner: &'a str,
    entries: Vec<(&'a str, &'a [f64])>,
}

impl<'a> LocalValues<'a> {
    pub fn new(owner: &'a str) -> Self {
        Self {
            owner,
            entries: Vec::new(),
        }
    }

    pub fn with(mut self, name: &'a str, value: &'a [f64]) -> Self {
        self.entries.push((name, value));
        self
    }

    pub fn push(&mut self, name: &'a str, value: &'a [f64]) {
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Result<&'a [f64]> {
        self.entries
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
            .ok_or_else(|| Error::Config(format!("no value for parameter '{name}' of '{}'", self.owner)))
    }

    pub fn scalar(&self, name: &str) -> Result<f64> {
        let v = self.get(name)?;
        v.first()
            .copied()
            .ok_or_else(|| Error::Config(format!("parameter '{name}' of '{}' is empty", self.owner)))
    }

    /// `get`, additionally checking the length.
    pub fn get_len(&self, name: &str, len: usize) -> Result<&'a [f64]> {
        let v = self.get(name)?;
        if v.len() != len {
            return Err(Error::Config(format!(
                "parameter '{name}' of '{}' has {} values, expected {len}",
                self.owner,
                v.len()
            )));
        }
        Ok(v)
    }
}
