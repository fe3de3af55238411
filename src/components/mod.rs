//! Density components.
//!
//! A component scores one or more feature columns with a parameterized
//! log-density. The set of kinds is closed:
//!
//! - `Normal`, `TruncatedNormal`, `Exponential`, `Uniform` (simple 1-D/box densities)
//! - `TruncatedGridGmm` (fixed-centre Gaussian mixture over several features)
//! - `Spline` (shape parameters interpolated along a control feature)
//!
//! Every component owns its parameters exclusively and evaluates purely from
//! the values passed in; nothing is cached between calls.

pub mod exponential;
pub mod grid_gmm;
pub mod normal;
pub mod spline;
pub mod truncated_normal;
pub mod uniform;

pub use exponential::*;
pub use grid_gmm::*;
pub use normal::*;
pub use spline::*;
pub use truncated_normal::*;
pub use uniform::*;

use rand::Rng;

use crate::data::FeatureTable;
use crate::error::{Error, Result};
use crate::params::{LocalValues, ParameterSet};

#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    Normal(NormalDensity),
    TruncatedNormal(TruncatedNormalDensity),
    Exponential(ExponentialDensity),
    Uniform(UniformDensity),
    TruncatedGridGmm(TruncatedGridGmm),
    Spline(SplineDensity),
}

impl Component {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Component::Normal(_) => "normal",
            Component::TruncatedNormal(_) => "truncated_normal",
            Component::Exponential(_) => "exponential",
            Component::Uniform(_) => "uniform",
            Component::TruncatedGridGmm(_) => "truncated_grid_gmm",
            Component::Spline(_) => "spline",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Component::Normal(c) => c.name(),
            Component::TruncatedNormal(c) => c.name(),
            Component::Exponential(c) => c.name(),
            Component::Uniform(c) => c.name(),
            Component::TruncatedGridGmm(c) => c.name(),
            Component::Spline(c) => c.name(),
        }
    }

    /// Features this component scores, in order.
    pub fn features(&self) -> &[String] {
        match self {
            Component::Normal(c) => c.features(),
            Component::TruncatedNormal(c) => c.features(),
            Component::Exponential(c) => c.features(),
            Component::Uniform(c) => c.features(),
            Component::TruncatedGridGmm(c) => c.features(),
            Component::Spline(c) => c.features(),
        }
    }

    /// Feature this component conditions on, if any.
    pub fn control(&self) -> Option<&str> {
        match self {
            Component::Spline(c) => Some(c.control()),
            _ => None,
        }
    }

    pub fn parameters(&self) -> &ParameterSet {
        match self {
            Component::Normal(c) => c.parameters(),
            Component::TruncatedNormal(c) => c.parameters(),
            Component::Exponential(c) => c.parameters(),
            Component::Uniform(c) => c.parameters(),
            Component::TruncatedGridGmm(c) => c.parameters(),
            Component::Spline(c) => c.parameters(),
        }
    }

    /// Per-star log-density, length `table.n_rows()`.
    pub fn log_prob(&self, values: &LocalValues<'_>, table: &FeatureTable) -> Result<Vec<f64>> {
        match self {
            Component::Normal(c) => c.log_prob(values, table),
            Component::TruncatedNormal(c) => c.log_prob(values, table),
            Component::Exponential(c) => c.log_prob(values, table),
            Component::Uniform(c) => c.log_prob(values, table),
            Component::TruncatedGridGmm(c) => c.log_prob(values, table),
            Component::Spline(c) => c.log_prob(values, table),
        }
    }

    /// Draw `n` rows, one column per scored feature.
    ///
    /// Spline components need the already-drawn control column.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        values: &LocalValues<'_>,
        control: Option<&[f64]>,
        n: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        match self {
            Component::Normal(c) => c.sample(values, n, rng),
            Component::TruncatedNormal(c) => c.sample(values, n, rng),
            Component::Exponential(c) => c.sample(values, n, rng),
            Component::Uniform(c) => Ok(c.sample(n, rng)),
            Component::TruncatedGridGmm(c) => c.sample(values, n, rng),
            Component::Spline(c) => {
                let control = control.ok_or_else(|| {
                    Error::Config(format!(
                        "component '{}' needs its control column '{}' to sample",
                        c.name(),
                        c.control()
                    ))
                })?;
                c.sample(values, control, rng)
            }
        }
    }
}

impl From<NormalDensity> for Component {
    fn from(c: NormalDensity) -> Self {
        Component::Normal(c)
    }
}

impl From<TruncatedNormalDensity> for Component {
    fn from(c: TruncatedNormalDensity) -> Self {
        Component::TruncatedNormal(c)
    }
}

impl From<ExponentialDensity> for Component {
    fn from(c: ExponentialDensity) -> Self {
        Component::Exponential(c)
    }
}

impl From<UniformDensity> for Component {
    fn from(c: UniformDensity) -> Self {
        Component::Uniform(c)
    }
}

impl From<TruncatedGridGmm> for Component {
    fn from(c: TruncatedGridGmm) -> Self {
        Component::TruncatedGridGmm(c)
    }
}

impl From<SplineDensity> for Component {
    fn from(c: SplineDensity) -> Self {
        Component::Spline(c)
    }
}
