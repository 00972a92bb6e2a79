//! # DRA Common Library
//!
//! Shared code for the dynamic risk assessment crates:
//! - Error taxonomy used by every pipeline stage
//! - Typed configuration (TOML) and path-root resolution
//! - Timestamp helpers for ledger and score records

pub mod config;
pub mod error;
pub mod time;

pub use config::{PathRoots, PipelineConfig, ResolvedPaths};
pub use error::{Error, Result};
