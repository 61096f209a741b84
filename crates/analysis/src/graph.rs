//! Restricted citation graph export
//!
//! Nodes are the seeds plus both result lists; edges are the restricted
//! edges between those nodes. Rendered as JSON (`nodes`/`edges`) or as a
//! Graphviz DOT document.

use crate::aggregate::AnalysisReport;
use citeset_common::errors::Result;
use citeset_common::models::{PaperId, SeedSet};
use citeset_common::CitationStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Maximum label length before truncation
const LABEL_CHARS: usize = 30;

/// Why a node is in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRole {
    Seed,
    Cited,
    Citing,
    /// A non-seed in both lists
    Both,
}

impl NodeRole {
    fn dot_style(self) -> (&'static str, &'static str) {
        match self {
            NodeRole::Seed => ("box", "#4CAF50"),
            NodeRole::Cited => ("ellipse", "#2196F3"),
            NodeRole::Citing => ("triangle", "#FF9800"),
            NodeRole::Both => ("diamond", "#9C27B0"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: PaperId,
    pub label: String,
    pub role: NodeRole,
    pub year: Option<i32>,
    /// `c_in` if the paper was selected as frequently cited, else 0
    pub c_in: usize,
    /// `c_out` if the paper was selected as frequently citing, else 0
    pub c_out: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Citing paper
    pub source: PaperId,
    /// Cited paper
    pub target: PaperId,
}

/// Output format for a graph file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Json,
    Dot,
}

impl GraphFormat {
    /// `.dot` and `.gv` files get DOT, everything else JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref() {
            Some("dot") | Some("gv") => GraphFormat::Dot,
            _ => GraphFormat::Json,
        }
    }
}

/// Nodes and edges of the restricted graph, ready to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationGraphExport {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl CitationGraphExport {
    pub fn build(report: &AnalysisReport, store: &CitationStore, seeds: &SeedSet) -> Self {
        let mut c_in: BTreeMap<&PaperId, usize> = BTreeMap::new();
        let mut c_out: BTreeMap<&PaperId, usize> = BTreeMap::new();
        for entry in &report.cited {
            c_in.insert(&entry.id, entry.count);
        }
        for entry in &report.citing {
            c_out.insert(&entry.id, entry.count);
        }

        let ids: Vec<&PaperId> = {
            let mut all: Vec<&PaperId> = seeds.iter().chain(c_in.keys().copied()).chain(c_out.keys().copied()).collect();
            all.sort();
            all.dedup();
            all
        };

        let nodes: Vec<GraphNode> = ids
            .iter()
            .map(|id| {
                let role = if seeds.contains(id) {
                    NodeRole::Seed
                } else {
                    match (c_in.contains_key(id), c_out.contains_key(id)) {
                        (true, true) => NodeRole::Both,
                        (true, false) => NodeRole::Cited,
                        _ => NodeRole::Citing,
                    }
                };
                let metadata = store.lookup(id).map(|r| &r.metadata);
                GraphNode {
                    id: (*id).clone(),
                    label: metadata
                        .and_then(|m| m.short_title(LABEL_CHARS))
                        .unwrap_or_else(|| id.to_string()),
                    role,
                    year: metadata.and_then(|m| m.year),
                    c_in: c_in.get(id).copied().unwrap_or(0),
                    c_out: c_out.get(id).copied().unwrap_or(0),
                }
            })
            .collect();

        // report.edges is already sorted and unique
        let edges = report
            .edges
            .iter()
            .filter(|e| ids.binary_search(&&e.citing).is_ok() && ids.binary_search(&&e.cited).is_ok())
            .map(|e| GraphEdge {
                source: e.citing.clone(),
                target: e.cited.clone(),
            })
            .collect();

        Self { nodes, edges }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Render as a Graphviz digraph
    pub fn to_dot(&self) -> String {
        let mut dot = String::from("digraph citations {\n");
        dot.push_str("    rankdir=LR;\n");
        dot.push_str("    node [style=filled, fontname=\"Helvetica\", fontsize=10];\n\n");

        for node in &self.nodes {
            let (shape, color) = node.role.dot_style();
            let mut label = node.label.clone();
            if let Some(year) = node.year {
                let _ = write!(label, " ({year})");
            }
            let _ = writeln!(
                dot,
                "    \"{}\" [label=\"{}\", shape={}, fillcolor=\"{}\"];",
                escape_dot(node.id.as_str()),
                escape_dot(&label),
                shape,
                color
            );
        }

        if !self.edges.is_empty() {
            dot.push('\n');
        }
        for edge in &self.edges {
            let _ = writeln!(
                dot,
                "    \"{}\" -> \"{}\";",
                escape_dot(edge.source.as_str()),
                escape_dot(edge.target.as_str())
            );
        }

        dot.push_str("}\n");
        dot
    }

    /// Render in the given format
    pub fn render(&self, format: GraphFormat) -> Result<String> {
        match format {
            GraphFormat::Json => self.to_json(),
            GraphFormat::Dot => Ok(self.to_dot()),
        }
    }
}

fn escape_dot(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
