//! Result list export: JSON, CSV and BibTeX

use crate::aggregate::{AggregateEntry, AnalysisReport};
use citeset_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Output format for a result list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Bibtex,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Bibtex => "bib",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "bibtex" | "bib" => Ok(ExportFormat::Bibtex),
            other => Err(AppError::malformed(format!(
                "unknown export format '{}' (expected json, csv or bibtex)",
                other
            ))),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Bibtex => "bibtex",
        };
        f.write_str(name)
    }
}

/// Which of the two lists is exported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    /// R: papers cited by the seeds
    Cited,
    /// Q: papers citing the seeds
    Citing,
}

impl ListKind {
    fn description(self, threshold: usize) -> String {
        match self {
            ListKind::Cited => format!("Papers cited by at least {} papers from the seed set", threshold),
            ListKind::Citing => format!("Papers citing at least {} papers from the seed set", threshold),
        }
    }

    fn note(self, count: usize) -> String {
        let papers = if count == 1 { "paper" } else { "papers" };
        match self {
            ListKind::Cited => format!("Cited by {} seed {}", count, papers),
            ListKind::Citing => format!("Cites {} seed {}", count, papers),
        }
    }
}

/// One exported paper
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPaper {
    pub identifier: String,
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub year: Option<i32>,
    pub venue: Option<String>,
    pub count: usize,
    pub contributing_identifiers: Vec<String>,
    pub is_seed: bool,
}

impl From<&AggregateEntry> for ExportedPaper {
    fn from(entry: &AggregateEntry) -> Self {
        Self {
            identifier: entry.id.to_string(),
            title: entry.metadata.title.clone(),
            authors: entry.metadata.authors.clone(),
            year: entry.metadata.year,
            venue: entry.metadata.venue.clone(),
            count: entry.count,
            contributing_identifiers: entry.contributing.iter().map(|p| p.to_string()).collect(),
            is_seed: entry.is_seed,
        }
    }
}

/// JSON document for one list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDocument {
    pub description: String,
    pub threshold: usize,
    pub seed_fingerprint: String,
    pub count: usize,
    pub papers: Vec<ExportedPaper>,
}

/// Flat CSV row; list fields are joined with "; "
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    identifier: &'a str,
    title: &'a str,
    authors: String,
    year: Option<i32>,
    venue: &'a str,
    count: usize,
    contributing_identifiers: String,
}

/// One result list with the context needed to export it
#[derive(Debug, Clone, Copy)]
pub struct ListExport<'a> {
    pub kind: ListKind,
    pub threshold: usize,
    pub seed_fingerprint: &'a str,
    pub entries: &'a [AggregateEntry],
}

impl<'a> ListExport<'a> {
    /// The frequently cited list of a report
    pub fn cited(report: &'a AnalysisReport) -> Self {
        Self {
            kind: ListKind::Cited,
            threshold: report.params.k_cited,
            seed_fingerprint: &report.seed_fingerprint,
            entries: &report.cited,
        }
    }

    /// The frequently citing list of a report
    pub fn citing(report: &'a AnalysisReport) -> Self {
        Self {
            kind: ListKind::Citing,
            threshold: report.params.k_citing,
            seed_fingerprint: &report.seed_fingerprint,
            entries: &report.citing,
        }
    }

    pub fn document(&self) -> ListDocument {
        ListDocument {
            description: self.kind.description(self.threshold),
            threshold: self.threshold,
            seed_fingerprint: self.seed_fingerprint.to_string(),
            count: self.entries.len(),
            papers: self.entries.iter().map(ExportedPaper::from).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.document())?)
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        for entry in self.entries {
            let contributing: Vec<&str> = entry.contributing.iter().map(|p| p.as_str()).collect();
            writer.serialize(CsvRow {
                identifier: entry.id.as_str(),
                title: entry.metadata.title.as_deref().unwrap_or(""),
                authors: entry.metadata.authors.join("; "),
                year: entry.metadata.year,
                venue: entry.metadata.venue.as_deref().unwrap_or(""),
                count: entry.count,
                contributing_identifiers: contributing.join("; "),
            })?;
        }

        // serialize() only writes the header with the first row
        if self.entries.is_empty() {
            writer.write_record([
                "identifier",
                "title",
                "authors",
                "year",
                "venue",
                "count",
                "contributing_identifiers",
            ])?;
        }

        let bytes = writer.into_inner().map_err(|e| AppError::Internal {
            message: format!("failed to flush CSV output: {}", e),
        })?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal {
            message: format!("CSV output is not UTF-8: {}", e),
        })
    }

    pub fn to_bibtex(&self) -> String {
        let mut used = BTreeSet::new();
        let mut bib = String::new();

        for (i, entry) in self.entries.iter().enumerate() {
            let key = unique_key(citation_key(entry, i + 1), &mut used);
            if !bib.is_empty() {
                bib.push('\n');
            }
            bib.push_str(&self.bibtex_entry(&key, entry));
        }
        bib
    }

    fn bibtex_entry(&self, key: &str, entry: &AggregateEntry) -> String {
        let metadata = &entry.metadata;
        let title = metadata.title.as_deref().unwrap_or(entry.id.as_str());

        let mut bib = format!("@misc{{{},\n", key);
        bib.push_str(&format!("  title = {{{}}},\n", escape_latex(title)));
        if !metadata.authors.is_empty() {
            let authors = metadata.authors.join(" and ");
            bib.push_str(&format!("  author = {{{}}},\n", escape_latex(&authors)));
        }
        if let Some(year) = metadata.year {
            bib.push_str(&format!("  year = {{{year}}},\n"));
        }
        if let Some(venue) = metadata.venue.as_deref().filter(|v| !v.is_empty()) {
            bib.push_str(&format!("  howpublished = {{{}}},\n", escape_latex(venue)));
        }
        if let Some(doi) = entry.id.doi() {
            bib.push_str(&format!("  doi = {{{}}},\n", escape_latex(doi)));
        }
        if let Some(arxiv) = entry.id.arxiv_id() {
            bib.push_str(&format!("  eprint = {{{}}},\n", escape_latex(arxiv)));
            bib.push_str("  archivePrefix = {arXiv},\n");
        }
        bib.push_str(&format!("  note = {{{}}}\n", self.kind.note(entry.count)));
        bib.push_str("}\n");
        bib
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => self.to_csv(),
            ExportFormat::Bibtex => Ok(self.to_bibtex()),
        }
    }
}

/// `<lastname><year><firstword>`, or `paper<N>` when nothing usable exists
fn citation_key(entry: &AggregateEntry, position: usize) -> String {
    let metadata = &entry.metadata;
    let last_name = metadata
        .authors
        .first()
        .and_then(|a| a.split_whitespace().last())
        .map(key_part)
        .unwrap_or_default();
    let first_word = metadata
        .title
        .as_deref()
        .and_then(|t| t.split_whitespace().map(key_part).find(|w| !w.is_empty()))
        .unwrap_or_default();

    if last_name.is_empty() && first_word.is_empty() {
        return format!("paper{}", position);
    }

    let year = metadata.year.map(|y| y.to_string()).unwrap_or_default();
    format!("{}{}{}", last_name, year, first_word)
}

fn key_part(word: &str) -> String {
    word.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Append `a`, `b`, ... until the key is unused
fn unique_key(base: String, used: &mut BTreeSet<String>) -> String {
    if used.insert(base.clone()) {
        return base;
    }
    let mut n = 0usize;
    loop {
        let candidate = format!("{}{}", base, suffix(n));
        if used.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// 0 -> a, 25 -> z, 26 -> aa, ...
fn suffix(mut n: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'a' + (n % 26) as u8);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
