//! citeset analysis
//!
//! Restricted citation counts over a seed set, plus everything derived
//! from them: summary statistics, the restricted graph and list exports.
//! Nothing in this crate performs I/O beyond producing strings.

pub mod aggregate;
pub mod export;
pub mod graph;
pub mod stats;

pub use aggregate::{aggregate, AggregateEntry, AggregationParams, AnalysisReport, RestrictedCounts, SeedDiagnostics};
pub use export::{ExportFormat, ExportedPaper, ListDocument, ListExport, ListKind};
pub use graph::{CitationGraphExport, GraphEdge, GraphFormat, GraphNode, NodeRole};
pub use stats::SummaryStats;
