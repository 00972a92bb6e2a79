//! HTTP API handlers for dra-api

pub mod diagnostics;
pub mod health;
pub mod prediction;
pub mod scoring;
pub mod stats;

pub use diagnostics::diagnostics;
pub use health::health_routes;
pub use prediction::prediction;
pub use scoring::scoring;
pub use stats::summary_stats;
