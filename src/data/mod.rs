//! Feature tables and synthetic catalogs.

pub mod sample;
pub mod table;

pub use sample::*;
pub use table::*;
