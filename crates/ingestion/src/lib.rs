//! citeset ingestion
//!
//! Fetches seed papers, their references and the works citing them from
//! bibliographic APIs, and assembles the citation store the analysis runs
//! on.
//!
//! - [`source`]: the [`CitationSource`] trait, a mock and the source factory
//! - [`openalex`] and [`semantic_scholar`]: HTTP clients for the two APIs
//! - [`merge`]: union of the work lists reported by several sources
//! - [`fetcher`]: per-seed fetching with bounded concurrency
//! - [`resilience`]: rate limiting and retry

pub mod fetcher;
mod http;
pub mod merge;
pub mod openalex;
pub mod resilience;
pub mod semantic_scholar;
pub mod source;

pub use fetcher::{FetchOutcome, FetchedPaper, Fetcher};
pub use merge::{merge_works, MergedWork};
pub use source::{create_sources, CitationSource, MockSource, SourcePaper, WorkSummary};
