//! Mathematical utilities: special functions, knot interpolation, dense linear algebra.

pub mod linalg;
pub mod special;
pub mod spline;

pub use linalg::*;
pub use special::*;
pub use spline::*;
