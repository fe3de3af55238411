//! Input/output helpers.
//!
//! - feature table CSV ingest (`table`)
//! - model configuration and fit file JSON (`json`)
//! - membership and synthetic catalog CSV exports (`export`)

pub mod export;
pub mod json;
pub mod table;

pub use export::*;
pub use json::*;
pub use table::*;
