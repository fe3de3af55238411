//! Turning fitted parameters into per-star membership probabilities.

pub mod evaluator;

pub use evaluator::*;
