//! citeset Common Library
//!
//! Shared code for the citeset crates including:
//! - Paper identifiers, records and seed sets
//! - The in-memory citation store and its persisted dataset format
//! - Error types and handling
//! - Configuration management
//! - Logging and metrics

pub mod config;
pub mod dataset;
pub mod errors;
pub mod metrics;
pub mod models;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use dataset::{Dataset, FailureKind, FetchFailure, QueryInfo};
pub use errors::{AppError, Result};
pub use models::{CitationEdge, ExternalIds, PaperId, PaperMetadata, PaperRecord, RecordOrigin, SeedSet};
pub use store::CitationStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default minimum number of seed papers that must cite a reference
pub const DEFAULT_K_CITED: usize = 2;

/// Default minimum number of seed papers a citing paper must cite
pub const DEFAULT_K_CITING: usize = 2;
