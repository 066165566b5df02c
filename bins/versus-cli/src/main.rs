//! versus: query discovery surfaces, search and comparison stats over a
//! JSON seed snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info};

use versus_core::spoiler::SpoilerLevel;
use versus_discovery::SurfaceQuery;
use versus_engine::{Engine, MemoryStore, Snapshot};

/// Versus ranking engine.
#[derive(Parser, Debug)]
#[command(name = "versus", version, about = "Book vs. adaptation ranking and discovery")]
struct Cli {
    /// Engine config file (default: <config dir>/versus/engine.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// JSON snapshot of works, diffs, votes and comments to load
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Maximum entries per list
    #[arg(long, default_value_t = 10)]
    limit: usize,

    /// Most revealing spoiler level to include (none, book_only, screen_only, full)
    #[arg(long, default_value = "full")]
    max_spoiler: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trending comparisons.
    Trending {
        /// Activity window in days (default from config)
        #[arg(long)]
        days: Option<u32>,
    },
    /// Comparisons for the curated source works.
    Featured,
    /// Recently updated comparisons.
    Recent,
    /// Comparisons with the most live diffs.
    Documented,
    /// Under-documented, disputed and undiscussed comparisons.
    NeedsHelp,
    /// Every home surface at once.
    Home,
    /// Search works by title, summary and creator.
    Search {
        query: String,
    },
    /// Preference stats for one comparison.
    Stats {
        source_slug: String,
        adaptation_slug: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let config_path = cli.config.clone().or_else(versus_engine::config::default_path);
    let config = versus_engine::config::load(config_path.as_deref()).context("loading engine config")?;

    let store = match &cli.seed {
        Some(path) => load_seed(path)?,
        None => MemoryStore::new(),
    };
    let engine = Engine::new(Arc::new(store), config).context("building engine")?;

    let query = SurfaceQuery::new(cli.limit).with_max_spoiler(SpoilerLevel::parse(&cli.max_spoiler));
    debug!(?query, command = ?cli.command, "cli: running");

    let discovery = engine.discovery();
    match cli.command {
        Command::Trending { days } => {
            let days = days.unwrap_or(engine.config().discovery.trending_lookback_days);
            print_json(&discovery.trending(&query, days)?)
        }
        Command::Featured => print_json(&discovery.featured(&query)?),
        Command::Recent => print_json(&discovery.recently_updated(&query)?),
        Command::Documented => print_json(&discovery.most_documented(&query)?),
        Command::NeedsHelp => print_json(&discovery.needs_help(&query)?),
        Command::Home => print_json(&discovery.home(&query)),
        Command::Search { query } => print_json(&engine.search(&query, cli.limit)),
        Command::Stats {
            source_slug,
            adaptation_slug,
        } => {
            let comparison = engine
                .resolve_comparison(&source_slug, &adaptation_slug)?
                .with_context(|| format!("no comparison {source_slug} vs {adaptation_slug}"))?;
            let stats = engine.comparison_stats(&comparison.key())?;
            print_json(&serde_json::json!({
                "comparison": comparison,
                "stats": stats,
                "book_percent": stats.book_percent(),
                "screen_percent": stats.screen_percent(),
            }))
        }
    }
}

fn load_seed(path: &Path) -> Result<MemoryStore> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading seed {}", path.display()))?;
    let snapshot: Snapshot =
        serde_json::from_str(&raw).with_context(|| format!("parsing seed {}", path.display()))?;
    info!(
        works = snapshot.works.len(),
        items = snapshot.items.len(),
        votes = snapshot.votes.len(),
        "cli: seed loaded"
    );
    Ok(MemoryStore::from_snapshot(snapshot)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so stdout stays parseable JSON.
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
