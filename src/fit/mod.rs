//! Fitting mixture models to feature tables.
//!
//! Responsibilities:
//!
//! - express the posterior over a flat unconstrained vector
//! - find its mode (L-BFGS), sample it (random-walk Metropolis) or approximate
//!   it (Laplace)
//! - report diagnostics and convergence warnings alongside the estimate

pub mod diagnostics;
pub mod engine;
pub mod laplace;
pub mod map;
pub mod mcmc;
pub mod objective;

pub use diagnostics::*;
pub use engine::*;
pub use laplace::*;
pub use map::*;
pub use mcmc::*;
pub use objective::*;
