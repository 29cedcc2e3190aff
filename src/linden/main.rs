use anyhow::{Context, Result};
use clap::Parser;
use itertools::Itertools;
use refnet::attributes::AttributeKind;
use refnet::config::FusionConfig;
use refnet::diagnostics::DiagnosticLog;
use refnet::network::Network;
use refnet::sources::{read_attribute_rows, read_edge_rows};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Edge table of the reference network.
    #[arg(long, env = "LINDEN_EDGES")]
    edges: PathBuf,

    /// Attribute batch as `kind=path`, applied in the order given.
    /// Example: --attribute speed_limit=speed.csv
    #[arg(long = "attribute", value_parser = parse_attribute_source)]
    attributes: Vec<(AttributeKind, PathBuf)>,

    #[arg(long, env = "LINDEN_OUTPUT_DIR", default_value = "out")]
    output_dir: PathBuf,

    /// JSON file with fusion tolerances. Defaults apply when omitted.
    #[arg(long, env = "LINDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Append diagnostics to this file as well as the log output.
    #[arg(long, env = "LINDEN_LOG_FILE")]
    log_file: Option<PathBuf>,

    #[arg(long)]
    verbose: bool,
}

fn parse_attribute_source(raw: &str) -> Result<(AttributeKind, PathBuf), String> {
    let (kind, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected kind=path, got {raw}"))?;
    let kind: AttributeKind = kind.parse().map_err(|e| format!("{e}"))?;
    Ok((kind, PathBuf::from(path)))
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match &args.config {
        Some(path) => FusionConfig::load(path)?,
        None => FusionConfig::default(),
    };
    let log = match &args.log_file {
        Some(path) => DiagnosticLog::with_mirror(path)
            .with_context(|| format!("opening diagnostic log {}", path.display()))?,
        None => DiagnosticLog::new(),
    };

    info!(
        "Fusing with tolerance {} (ceiling {}) in SRID {}",
        config.tolerance, config.tolerance_max, config.srid
    );

    std::fs::create_dir_all(&args.output_dir)
        .with_context(|| format!("creating {}", args.output_dir.display()))?;

    let start = Instant::now();
    let mut network = Network::new(config, log);

    let edge_rows = read_edge_rows(&args.edges)?;
    network.ingest_edge_rows(edge_rows);

    for (kind, path) in &args.attributes {
        let rows = read_attribute_rows(path)?;
        info!("Applying {} rows of {} from {}", rows.len(), kind, path.display());
        network.add_attribute_rows(*kind, rows);
    }

    let kinds: Vec<AttributeKind> = args
        .attributes
        .iter()
        .map(|(kind, _)| *kind)
        .unique()
        .collect();

    network.write_node_table(&args.output_dir.join("nodes_dirty.csv"));
    network.write_edge_table(&args.output_dir.join("edges_dirty.csv"), &kinds);

    network.clean();

    network.write_node_table(&args.output_dir.join("nodes_clean.csv"));
    network.write_edge_table(&args.output_dir.join("edges_clean.csv"), &kinds);

    network
        .diagnostics_mut()
        .flush()
        .context("flushing diagnostic log")?;

    info!(
        "Done in {:?}: {} fragments, {} nodes, {} diagnostics",
        start.elapsed(),
        network.fragment_count(),
        network.node_count(),
        network.diagnostics().len()
    );
    Ok(())
}
