//! citeset command line
//!
//! Two-phase workflow:
//! 1. `citeset fetch` resolves a seed list against OpenAlex and Semantic
//!    Scholar and saves a citation dataset
//! 2. `citeset analyze` / `citeset graph` compute the restricted lists from
//!    that dataset, as often as needed, without refetching

use anyhow::Context;
use chrono::Utc;
use citeset_analysis::{
    AggregateEntry, AggregationParams, AnalysisReport, CitationGraphExport, ExportFormat, GraphFormat, ListExport,
    RestrictedCounts, SeedDiagnostics, SummaryStats,
};
use citeset_common::config::AnalysisConfig;
use citeset_common::errors::AppError;
use citeset_common::{telemetry, AppConfig, Dataset, FetchFailure, PaperId, QueryInfo, SeedSet, VERSION};
use citeset_ingestion::Fetcher;
use clap::{Args, Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Entries printed per list in the summary
const SUMMARY_LIMIT: usize = 20;
/// Title length in the summary
const SUMMARY_TITLE_CHARS: usize = 100;

#[derive(Parser, Debug)]
#[command(name = "citeset", version)]
#[command(about = "Restricted citation analysis over a fixed seed set of papers")]
struct Cli {
    /// Configuration file, layered over config/ and under CITESET__ variables
    #[arg(short, long, global = true, env = "CITESET_CONFIG")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch metadata and citation lists for a seed list
    Fetch(FetchArgs),
    /// Compute the frequently cited and frequently citing lists
    Analyze(AnalyzeArgs),
    /// Export the restricted citation graph
    Graph(GraphArgs),
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Seed list: one identifier per line, `#` comments allowed
    #[arg(short, long)]
    input: PathBuf,

    /// Dataset file to write
    #[arg(short, long, default_value = "citations.json")]
    output: PathBuf,

    /// Maximum references / citing works fetched per paper
    #[arg(long)]
    max_citing: Option<usize>,

    /// Source to query (repeatable): openalex, semantic_scholar
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Seeds fetched concurrently
    #[arg(long)]
    concurrency: Option<usize>,

    /// Contact address for the OpenAlex polite pool
    #[arg(long, env = "CITESET_MAILTO")]
    mailto: Option<String>,
}

#[derive(Args, Debug, Clone)]
struct ThresholdArgs {
    /// Minimum number of seeds citing a paper
    #[arg(long)]
    k_cited: Option<usize>,

    /// Minimum number of seeds a paper must cite
    #[arg(long)]
    k_citing: Option<usize>,

    /// Leave seed papers out of both lists
    #[arg(long)]
    exclude_seeds: bool,
}

impl ThresholdArgs {
    fn params(&self, defaults: &AnalysisConfig) -> AggregationParams {
        AggregationParams {
            k_cited: self.k_cited.unwrap_or(defaults.k_cited),
            k_citing: self.k_citing.unwrap_or(defaults.k_citing),
            exclude_seeds: self.exclude_seeds || defaults.exclude_seeds,
        }
    }
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    /// Dataset written by `citeset fetch` (or a bare citation store)
    #[arg(short, long)]
    input: PathBuf,

    /// Seed list overriding the dataset's seeds
    #[arg(long)]
    seeds: Option<PathBuf>,

    #[command(flatten)]
    thresholds: ThresholdArgs,

    /// Output format: json, csv or bibtex
    #[arg(long, default_value = "json")]
    format: ExportFormat,

    /// Frequently cited list [default: k_cited.<ext>]
    #[arg(long)]
    output_cited: Option<PathBuf>,

    /// Frequently citing list [default: k_citing.<ext>]
    #[arg(long)]
    output_citing: Option<PathBuf>,

    /// Write summary statistics as JSON
    #[arg(long)]
    stats: Option<PathBuf>,

    /// Write the restricted graph (.dot for Graphviz, otherwise JSON)
    #[arg(long)]
    graph: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GraphArgs {
    /// Dataset written by `citeset fetch` (or a bare citation store)
    #[arg(short, long)]
    input: PathBuf,

    /// Seed list overriding the dataset's seeds
    #[arg(long)]
    seeds: Option<PathBuf>,

    #[command(flatten)]
    thresholds: ThresholdArgs,

    /// Graph file (.dot for Graphviz, otherwise JSON)
    #[arg(short, long)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())
        .map_err(AppError::from)
        .context("failed to load configuration")?;

    let level = match cli.verbose {
        0 => None,
        1 => Some("debug"),
        _ => Some("trace"),
    };
    telemetry::init_tracing(&config.observability, level);
    citeset_common::metrics::register_metrics();

    info!("citeset v{}", VERSION);

    let result = match cli.command {
        Command::Fetch(args) => run_fetch(args, &config).await,
        Command::Analyze(args) => run_analyze(args, &config),
        Command::Graph(args) => run_graph(args, &config),
    };

    if let Err(e) = &result {
        if let Some(app) = e.downcast_ref::<AppError>() {
            error!(code = app.code().as_code(), fatal = app.is_fatal(), "{}", app);
        }
    }
    result
}

async fn run_fetch(args: FetchArgs, config: &AppConfig) -> anyhow::Result<()> {
    let seeds = SeedSet::load(&args.input)?;
    if seeds.is_empty() {
        return Err(AppError::malformed(format!("no identifiers found in {}", args.input.display())).into());
    }

    let mut fetch_config = config.fetch.clone();
    if let Some(max_citing) = args.max_citing {
        fetch_config.max_citing = max_citing;
    }
    if !args.sources.is_empty() {
        fetch_config.sources = args.sources;
    }
    if let Some(concurrency) = args.concurrency {
        fetch_config.concurrency = concurrency;
    }
    if args.mailto.is_some() {
        fetch_config.mailto = args.mailto;
    }
    if fetch_config.mailto.is_none() {
        warn!("No mailto configured; OpenAlex requests will not use the polite pool");
    }

    let fetcher = Fetcher::from_config(&fetch_config)?;
    let outcome = fetcher.fetch_all(&seeds).await;

    let total_references: usize = outcome.store.fetched().map(|r| r.references.len()).sum();
    let total_citing: usize = outcome.store.fetched().map(|r| r.cited_by.len()).sum();

    let query_info = QueryInfo {
        input_file: Some(args.input.display().to_string()),
        max_citing_per_paper: Some(fetch_config.max_citing),
        sources: fetcher.source_names(),
        fetched_at: Some(Utc::now()),
        ..Default::default()
    };
    let dataset = outcome.into_dataset(seeds, query_info);
    ensure_parent(&args.output)?;
    dataset.save(&args.output)?;

    let resolved = dataset.papers.fetched().filter(|r| dataset.seeds.contains(&r.id)).count();
    println!("Fetched {} of {} seed papers", resolved, dataset.seeds.len());
    println!("  References collected:   {}", total_references);
    println!("  Citing works collected: {}", total_citing);
    print_failures(&dataset.failures);
    println!("Saved dataset to {}", args.output.display());
    Ok(())
}

fn run_analyze(args: AnalyzeArgs, config: &AppConfig) -> anyhow::Result<()> {
    let (dataset, seeds) = load_inputs(&args.input, args.seeds.as_deref())?;
    let params = args.thresholds.params(&config.analysis);

    info!(
        seeds = seeds.len(),
        k_cited = params.k_cited,
        k_citing = params.k_citing,
        "Computing restricted citation lists"
    );
    let counts = RestrictedCounts::compute(&seeds, &dataset.papers);
    let report = counts.select(&params);

    let ext = args.format.extension();
    let cited_path = args
        .output_cited
        .unwrap_or_else(|| PathBuf::from(format!("k_cited.{ext}")));
    let citing_path = args
        .output_citing
        .unwrap_or_else(|| PathBuf::from(format!("k_citing.{ext}")));

    write_output(&cited_path, &ListExport::cited(&report).render(args.format)?)?;
    println!("Saved cited papers to: {}", cited_path.display());
    write_output(&citing_path, &ListExport::citing(&report).render(args.format)?)?;
    println!("Saved citing papers to: {}", citing_path.display());

    if let Some(path) = &args.stats {
        let stats = SummaryStats::from_counts(&counts, &report);
        write_output(path, &stats.to_json()?)?;
        println!("Saved statistics to: {}", path.display());
    }

    if let Some(path) = &args.graph {
        let graph = CitationGraphExport::build(&report, &dataset.papers, &seeds);
        write_output(path, &graph.render(GraphFormat::from_path(path))?)?;
        println!("Saved graph to: {}", path.display());
    }

    print_summary(&report);
    print_diagnostics(&report.diagnostics, &dataset.failures);
    Ok(())
}

fn run_graph(args: GraphArgs, config: &AppConfig) -> anyhow::Result<()> {
    let (dataset, seeds) = load_inputs(&args.input, args.seeds.as_deref())?;
    let params = args.thresholds.params(&config.analysis);

    let report = RestrictedCounts::compute(&seeds, &dataset.papers).select(&params);
    let graph = CitationGraphExport::build(&report, &dataset.papers, &seeds);
    write_output(&args.output, &graph.render(GraphFormat::from_path(&args.output))?)?;

    println!(
        "Saved graph with {} nodes and {} edges to: {}",
        graph.nodes.len(),
        graph.edges.len(),
        args.output.display()
    );
    print_diagnostics(&report.diagnostics, &dataset.failures);
    Ok(())
}

/// Load the dataset and pick the seed set to analyze
fn load_inputs(input: &Path, seeds_path: Option<&Path>) -> anyhow::Result<(Dataset, SeedSet)> {
    let dataset = Dataset::load(input)?;

    let seeds = match seeds_path {
        Some(path) => {
            let seeds = SeedSet::load(path)?;
            if seeds.fingerprint() != dataset.query_info.seed_fingerprint {
                warn!(
                    dataset = %dataset.query_info.seed_fingerprint,
                    seeds = %seeds.fingerprint(),
                    "Seed list differs from the one the dataset was fetched with"
                );
            }
            seeds
        }
        None => dataset.seeds.clone(),
    };

    Ok((dataset, seeds))
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| AppError::io(parent, e))?;
    }
    Ok(())
}

fn write_output(path: &Path, contents: &str) -> anyhow::Result<()> {
    ensure_parent(path)?;
    std::fs::write(path, contents).map_err(|e| AppError::io(path, e))?;
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let rule = "=".repeat(70);
    println!("\n{rule}");
    println!("ANALYSIS SUMMARY (seed set {})", report.seed_fingerprint);
    println!("{rule}");

    println!(
        "\nPapers CITED by at least {} seed papers (R_k): {}",
        report.params.k_cited,
        report.cited.len()
    );
    print_entries(&report.cited, "c_in");

    println!(
        "\nPapers CITING at least {} seed papers (Q_k'): {}",
        report.params.k_citing,
        report.citing.len()
    );
    print_entries(&report.citing, "c_out");

    println!("\n{rule}");
}

fn print_entries(entries: &[AggregateEntry], count_label: &str) {
    if entries.is_empty() {
        return;
    }
    println!("{}", "-".repeat(70));
    for (i, entry) in entries.iter().take(SUMMARY_LIMIT).enumerate() {
        let title = entry
            .metadata
            .short_title(SUMMARY_TITLE_CHARS)
            .unwrap_or_else(|| entry.id.to_string());
        let seed = if entry.is_seed { " [seed]" } else { "" };
        println!("  {:2}. [{}={}] {}{}", i + 1, count_label, entry.count, title, seed);

        let year = entry
            .metadata
            .year
            .map(|y| y.to_string())
            .unwrap_or_else(|| "n/a".to_string());
        println!("      Year: {} | {}", year, describe_id(&entry.id));
    }
    if entries.len() > SUMMARY_LIMIT {
        println!("  ... and {} more", entries.len() - SUMMARY_LIMIT);
    }
}

fn describe_id(id: &PaperId) -> String {
    if let Some(doi) = id.doi() {
        format!("DOI: {}", doi)
    } else if let Some(arxiv) = id.arxiv_id() {
        format!("arXiv: {}", arxiv)
    } else {
        format!("ID: {}", id)
    }
}

fn print_diagnostics(diagnostics: &SeedDiagnostics, failures: &BTreeMap<PaperId, FetchFailure>) {
    println!(
        "Seeds resolved: {} of {} ({} missing)",
        diagnostics.resolved.len(),
        diagnostics.total(),
        diagnostics.missing.len()
    );
    for id in &diagnostics.missing {
        match failures.get(id) {
            Some(failure) => println!("  missing {}: {}", id, failure.message),
            None => println!("  missing {}: no fetched record", id),
        }
    }
}

fn print_failures(failures: &BTreeMap<PaperId, FetchFailure>) {
    if failures.is_empty() {
        return;
    }
    println!("  Failed seeds:           {}", failures.len());
    for (id, failure) in failures {
        println!("    {} ({:?}): {}", id, failure.kind, failure.message);
    }
}
