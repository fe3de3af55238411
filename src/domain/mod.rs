//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - fit configuration (`FitConfig`, `FitMode`, `InitStrategy`)
//! - fit outputs (`FitResult`, `FitEstimate`, `PosteriorDraws`, `FitDiagnostics`)
//! - membership outputs (`MembershipTable`, `MembershipSummary`, `MembershipResult`)

pub mod types;

pub use types::*;
