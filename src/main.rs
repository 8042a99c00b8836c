//! KSPA - Top-K path and arbitrage search over a quote graph
//!
//! Run with: cargo run -- --graph quotes.json arbitrage 1 2 3

use clap::Parser;
use color_eyre::eyre::{self, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kspa::brain::{new_searcher, RankedPath, Searcher, SearcherKind};
use kspa::cartographer::{load_csv, load_json, Entity, MultiGraph, VertexId};
use kspa::config::{Config, SearchReport};
use kspa::limit_orders::LimitOrderService;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Quote edge list (.json array or headerless .csv)
    #[clap(long, short)]
    graph: PathBuf,

    /// Limit orders to add on top of the quotes, same formats
    #[clap(long)]
    limit_orders: Option<PathBuf>,

    /// TOML config file; KSPA_* environment variables otherwise
    #[clap(long, short)]
    config: Option<PathBuf>,

    /// Override the configured searcher (memo, colored, stacked)
    #[clap(long)]
    algorithm: Option<SearcherKind>,

    /// Override the configured number of paths
    #[clap(long, short)]
    k: Option<usize>,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// K best paths from one vertex to another
    Search { source: VertexId, target: VertexId },
    /// K best cycles through each source
    Arbitrage {
        #[clap(required = true)]
        sources: Vec<VertexId>,
    },
    /// K best paths from every source to every target
    OneToMany {
        #[clap(long, required = true, num_args = 1..)]
        sources: Vec<VertexId>,
        #[clap(long, required = true, num_args = 1..)]
        targets: Vec<VertexId>,
    },
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!("{}", style(" KSPA - Top-K Path Search").cyan().bold());
    println!("{}", style("    memo | colored | stacked DFS over merged quotes").cyan());
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_entities(path: &Path) -> Result<Vec<Entity>> {
    let entities = match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv(path)?,
        Some("json") => load_json(path)?,
        other => eyre::bail!("unsupported edge list extension {:?} for {}", other, path.display()),
    };
    Ok(entities)
}

fn print_paths(label: &str, paths: &[RankedPath]) {
    if paths.is_empty() {
        println!("{} {}: no paths", style("✗").red(), label);
        return;
    }

    println!("{} {}: {} paths", style("✓").green(), label, paths.len());
    for (rank, path) in paths.iter().enumerate() {
        let marker = if path.is_arbitrage() {
            style(format!("{:.6}x", path.rate())).green()
        } else {
            style(format!("{:.6}x", path.rate())).dim()
        };
        let lo = if path.has_limit_order() { " [LO]" } else { "" };
        println!(
            "   #{:<3} {} weight {:+.6} | {}{}",
            rank + 1,
            marker,
            path.weight,
            path.chain(),
            lo
        );
    }
}

fn journal(config: &Config, report: SearchReport) {
    if let Some(path) = &config.journal_path {
        if let Err(e) = report.append_to_file(path) {
            warn!("Failed to write journal {}: {}", path, e);
        }
    }
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("kspa=info".parse()?))
        .init();

    let args = Args::parse();
    print_banner();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    if let Some(algorithm) = args.algorithm {
        config.algorithm = algorithm;
    }
    if let Some(k) = args.k {
        config.top_k = k;
    }

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        return Err(e);
    }
    config.print_summary();

    // =============================================
    // PHASE 1: THE CARTOGRAPHER
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 1: THE CARTOGRAPHER ═══").blue().bold());
    println!();

    let start = Instant::now();
    let entities = load_entities(&args.graph)?;
    let graph = MultiGraph::build(&entities)?;
    let mut service = LimitOrderService::new(graph);

    if let Some(path) = &args.limit_orders {
        let orders = load_entities(path)?;
        service.add_limit_orders(&orders)?;
    }

    let graph = service.graph();
    println!(
        "{} Graph built in {:?}: {} vertices, {} merged edges, {} quotes ({} limit orders)",
        style("✓").green(),
        start.elapsed(),
        graph.vertex_count(),
        graph.edge_count(),
        graph.quote_count(),
        service.live_count()
    );

    // =============================================
    // PHASE 2: THE BRAIN
    // =============================================
    println!();
    println!("{}", style("═══ PHASE 2: THE BRAIN ═══").magenta().bold());
    println!();

    let searcher = new_searcher(config.algorithm, config.search_options())?;
    let k = config.top_k;
    let start = Instant::now();

    match &args.cmd {
        Command::Search { source, target } => {
            let paths = searcher.top_k(graph, *source, *target, k)?;
            print_paths(&format!("{} -> {}", source, target), &paths);
            journal(&config, SearchReport::new("top_k", searcher.kind(), *source, *target, &paths));
        }
        Command::Arbitrage { sources } => {
            let results = searcher.arbitrage(graph, sources, k)?;
            for (source, paths) in sources.iter().zip(&results) {
                print_paths(&format!("cycles through {}", source), paths);
                journal(&config, SearchReport::new("arbitrage", searcher.kind(), *source, *source, paths));
            }
        }
        Command::OneToMany { sources, targets } => {
            let results = searcher.top_k_one_to_many(graph, sources, targets, k)?;
            for (source, per_target) in sources.iter().zip(&results) {
                for entry in per_target {
                    print_paths(&format!("{} -> {}", source, entry.target), &entry.paths);
                    journal(
                        &config,
                        SearchReport::new("one_to_many", searcher.kind(), *source, entry.target, &entry.paths),
                    );
                }
            }
        }
    }

    info!("{} search finished in {:?}", searcher.kind(), start.elapsed());
    Ok(())
}
