//! nsinsight - cached usage, age and quota suggestions over a namespace.
//!
//! Usage:
//!   nsinsight refresh PATH          Walk PATH, aggregate and persist a snapshot
//!   nsinsight suggestions [-u U]    Scalar suggestions, optionally for one user
//!   nsinsight quotas -m M [-u U]    Quota ratios
//!   nsinsight ages -m M             Modification-time histogram
//!   nsinsight users [-s NAME]       Users, or one grouped suggestion
//!   nsinsight dirs -m M [-d DIR]    Directory aggregates
//!   nsinsight issues [-n N]         Top offenders per issue
//!   nsinsight logins                Last logins, most recent first
//!   nsinsight watch add|remove|list Manage watched directories
//!   nsinsight summary               Human-readable overview

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use nsinsight_cache::SuggestionsEngine;
use nsinsight_core::{EngineConfig, ScalarMetric, SourceConfig};
use nsinsight_scan::FsSource;

/// Store location used when neither the config file nor `--store` names one.
const DEFAULT_STORE: &str = ".nsinsight/cache.json";

#[derive(Parser)]
#[command(
    name = "nsinsight",
    version,
    about = "Cached usage, age and quota suggestions over large namespaces",
    long_about = "nsinsight aggregates a point-in-time view of a directory tree into \
                  size, age, per-user and per-directory suggestions.\n\n\
                  Run `nsinsight refresh PATH` to build a snapshot, then query it \
                  with the other subcommands."
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Cache store file (overrides the config file)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk a directory, run one aggregation pass and persist the snapshot
    Refresh {
        /// Root of the namespace to aggregate
        path: PathBuf,

        /// Total capacity in bytes to report
        #[arg(long)]
        capacity: Option<u64>,

        /// JSON file mapping users to last login (ms since epoch)
        #[arg(long)]
        logins: Option<PathBuf>,

        /// Glob patterns to skip (repeatable)
        #[arg(short, long)]
        ignore: Vec<String>,

        /// Skip hidden files and directories
        #[arg(long)]
        skip_hidden: bool,

        /// Walker threads (0 = auto)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Append a history record to this JSON lines file
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Show scalar suggestions
    Suggestions {
        /// Narrow to one user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show quota ratios
    Quotas {
        /// nsQuotaRatioUsed or dsQuotaRatioUsed
        #[arg(short, long, default_value = "nsQuotaRatioUsed")]
        metric: String,

        /// Narrow to one user
        #[arg(short, long)]
        user: Option<String>,
    },

    /// Show the modification-time histogram
    Ages {
        /// count or diskspaceConsumed
        #[arg(short, long, default_value = "count")]
        metric: String,
    },

    /// List users, or show one grouped suggestion
    Users {
        /// Grouped suggestion name, e.g. emptyFilesUsers
        #[arg(short, long)]
        suggestion: Option<String>,
    },

    /// Show directory aggregates
    Dirs {
        /// count or diskspaceConsumed
        #[arg(short, long, default_value = "count")]
        metric: String,

        /// Narrow to one directory
        #[arg(short, long)]
        dir: Option<String>,
    },

    /// Show the top offenders for every issue
    Issues {
        /// Entries per issue
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,

        /// Rank from the bottom instead of the top
        #[arg(long)]
        ascending: bool,
    },

    /// Show last logins, most recent first
    Logins,

    /// Manage watched directories
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Human-readable overview of the served snapshot
    Summary,
}

#[derive(Subcommand)]
enum WatchAction {
    /// Start computing exact aggregates for a directory
    Add { path: String },
    /// Stop watching a directory
    Remove { path: String },
    /// List watched directories and their common ancestors
    List,
}

/// Contents of the TOML configuration file.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    engine: Option<EngineConfig>,
    #[serde(default)]
    source: SourceSection,
}

/// Filesystem source settings; the root always comes from the command line.
#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    follow_symlinks: Option<bool>,
    include_hidden: Option<bool>,
    #[serde(default)]
    ignore_patterns: Vec<String>,
    threads: Option<usize>,
    capacity: Option<u64>,
    logins_file: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let file_config = load_config(cli.config.as_deref())?;
    let mut engine_config = file_config.engine.clone().unwrap_or_default();
    engine_config.store_path = cli
        .store
        .clone()
        .or(engine_config.store_path)
        .or_else(|| Some(PathBuf::from(DEFAULT_STORE)));

    match cli.command {
        Command::Refresh {
            path,
            capacity,
            logins,
            ignore,
            skip_hidden,
            threads,
            history,
        } => {
            if history.is_some() {
                engine_config.history_path = history;
            }
            let mut source = SourceConfig::new(&path);
            let section = file_config.source;
            source.follow_symlinks = section.follow_symlinks.unwrap_or(false);
            source.include_hidden = !skip_hidden && section.include_hidden.unwrap_or(true);
            source.ignore_patterns = section.ignore_patterns;
            source.ignore_patterns.extend(ignore);
            source.threads = threads.or(section.threads).unwrap_or(0);
            source.capacity = capacity.or(section.capacity);
            source.logins_file = logins.or(section.logins_file);
            run_refresh(engine_config, source)?;
        }
        Command::Suggestions { user } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().suggestions_for_user(user.as_deref()))?;
        }
        Command::Quotas { metric, user } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().quota_ratios(user.as_deref(), &metric)?)?;
        }
        Command::Ages { metric } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().file_age_histogram(&metric)?)?;
        }
        Command::Users { suggestion } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().users_or_suggestion(suggestion.as_deref())?)?;
        }
        Command::Dirs { metric, dir } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().directory_metrics(dir.as_deref(), &metric)?)?;
        }
        Command::Issues { limit, ascending } => {
            let engine = start(engine_config)?;
            print_json(&engine.query().top_issues(limit, ascending))?;
        }
        Command::Logins => {
            let engine = start(engine_config)?;
            print_json(&engine.query().last_logins())?;
        }
        Command::Watch { action } => run_watch(engine_config, action)?,
        Command::Summary => {
            let engine = start(engine_config)?;
            print_summary(&engine);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read config {}", path.display()))?;
    toml::from_str(&contents).wrap_err_with(|| format!("Invalid config {}", path.display()))
}

fn start(config: EngineConfig) -> Result<SuggestionsEngine> {
    SuggestionsEngine::start(config).wrap_err("Failed to open cache store")
}

/// Walk a directory, aggregate it and persist the snapshot.
fn run_refresh(config: EngineConfig, source: SourceConfig) -> Result<()> {
    let root = source.root.clone();
    let engine = start(config)?;

    eprintln!("Scanning {}...", root.display());
    let source = FsSource::scan(source).wrap_err("Scan failed")?;
    let snapshot = engine.refresh(&source).wrap_err("Refresh failed")?;
    engine.stop().wrap_err("Failed to persist cache store")?;

    info!(
        files = snapshot.scalar(ScalarMetric::NumFiles),
        dirs = snapshot.scalar(ScalarMetric::NumDirs),
        users = snapshot.users.len(),
        "Snapshot published"
    );
    print_summary(&engine);
    Ok(())
}

fn run_watch(config: EngineConfig, action: WatchAction) -> Result<()> {
    let engine = start(config)?;
    match action {
        WatchAction::Add { path } => {
            let dir = engine.add_watch(&path)?;
            println!("Watching {dir}; run `nsinsight refresh` to compute its aggregates");
        }
        WatchAction::Remove { path } => {
            let dir = engine.remove_watch(&path)?;
            println!("Stopped watching {dir}");
        }
        WatchAction::List => {
            #[derive(Serialize)]
            struct Listing {
                watches: Vec<String>,
                ancestors: Vec<String>,
            }
            print_json(&Listing {
                watches: engine.current_watches().into_iter().collect(),
                ancestors: engine.resolve_common_ancestors(),
            })?;
        }
    }
    engine.stop().wrap_err("Failed to persist cache store")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).wrap_err("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn print_summary(engine: &SuggestionsEngine) {
    let Some(snapshot) = engine.snapshot() else {
        println!("No snapshot yet; run `nsinsight refresh PATH` first.");
        return;
    };
    let s = |m: ScalarMetric| snapshot.scalar(m);
    let size = |m: ScalarMetric| format_size(s(m).max(0) as u64);

    println!();
    println!("{}", "─".repeat(60));
    println!(" Snapshot from {}", format_time(snapshot.report_time));
    println!(
        " {} files, {} directories, {} users",
        s(ScalarMetric::NumFiles),
        s(ScalarMetric::NumDirs),
        snapshot.users.len()
    );
    println!(
        " {} consumed of {}",
        size(ScalarMetric::Diskspace),
        match s(ScalarMetric::Capacity) {
            0 => "unknown capacity".to_string(),
            c => format_size(c as u64),
        }
    );
    println!(" Aggregated in {} ms", s(ScalarMetric::TimeTaken));
    println!("{}", "─".repeat(60));
    println!();

    println!(" {:<10} {:>12}", "Bucket", "Files");
    for (name, metric) in [
        ("empty", ScalarMetric::EmptyFiles),
        ("tiny", ScalarMetric::TinyFiles),
        ("small", ScalarMetric::SmallFiles),
        ("medium", ScalarMetric::MediumFiles),
        ("large", ScalarMetric::LargeFiles),
    ] {
        println!(" {:<10} {:>12}", name, s(metric));
    }
    println!();
    println!(
        " Empty directories: {} ({} in the last 24h)",
        s(ScalarMetric::EmptyDirs),
        s(ScalarMetric::EmptyDirs24h)
    );
    println!(
        " Not accessed in 1 year: {} files, {}",
        s(ScalarMetric::OldFiles1yr),
        size(ScalarMetric::OldFiles1yrDs)
    );
    println!(
        " Not accessed in 2 years: {} files, {}",
        s(ScalarMetric::OldFiles2yr),
        size(ScalarMetric::OldFiles2yrDs)
    );
    println!(
        " Quotas over threshold: {} namespace, {} diskspace",
        s(ScalarMetric::NsQuotaThreshCount),
        s(ScalarMetric::DsQuotaThreshCount)
    );

    if !snapshot.watched.is_empty() {
        println!();
        println!(" {:<40} {:>8} {:>12}", "Watched directory", "Files", "Size");
        for (dir, stats) in &snapshot.watched {
            println!(
                " {:<40} {:>8} {:>12}",
                truncate(dir, 40),
                stats.count,
                format_size(stats.diskspace.max(0) as u64)
            );
        }
    }
    println!();
}

/// Format bytes as human-readable size.
fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

fn format_time(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{millis} ms since epoch"))
}

/// Truncate a string to fit within max_len characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
