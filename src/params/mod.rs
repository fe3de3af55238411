//! Parameter specification: domains, priors and named parameters.

pub mod domain;
pub mod parameter;
pub mod prior;

pub use domain::*;
pub use parameter::*;
pub use prior::*;
