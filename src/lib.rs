//! `stream-membership` library crate.
//!
//! Probabilistic membership modeling for stellar streams: a star is a draw
//! from a mixture of populations (stream, background, ...), each a product of
//! per-feature density components. The binary (`smm`) is a thin wrapper so
//! that:
//!
//! - core logic is testable without spawning processes
//! - models, fits and membership evaluation are reusable from other tools

pub mod app;
pub mod cli;
pub mod components;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod membership;
pub mod models;
pub mod params;
pub mod report;
