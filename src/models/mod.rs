//! Population and mixture models.
//!
//! - `IndependentFeatureModel`: one population, a sum of component log-densities
//! - `MixtureModel`: populations weighted by a simplex, with responsibilities
//! - `ModelConfig`: the JSON description both are built from

pub mod config;
pub mod independent;
pub mod mixture;

pub use config::*;
pub use independent::*;
pub use mixture::*;
