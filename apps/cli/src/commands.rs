//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pokedex_core::ingest::{IncrementalIngestor, IngestOptions, IngestReport, StopReason};
use pokedex_core::progress::{ProgressReporter, SkipReason};
use pokedex_core::report;
use pokedex_shared::{
    AppConfig, BudgetSection, RecordId, UpsertMode, init_config, load_config, load_config_from,
};
use pokedex_sources::{
    BulbapediaSource, PogoApiSource, PokeApiSource, RecordSource, build_client,
};
use pokedex_storage::{Storage, TableStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pokédex — incremental Pokémon data ingestion.
#[derive(Parser)]
#[command(
    name = "pokedex",
    version,
    about = "Fetch Pokémon data into a local store a batch at a time, then compare stats.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Database file (overrides `[database] path`).
    #[arg(long, global = true, env = "POKEDEX_DB")]
    pub db: Option<PathBuf>,

    /// Config file (defaults to ~/.pokedex/pokedex.toml).
    #[arg(long, global = true, env = "POKEDEX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Add the next batch of records from a source.
    Fetch {
        /// Source to ingest from.
        source: SourceKind,

        /// Maximum new records this run (overrides `[budget] per_run_cap`).
        #[arg(long)]
        per_run_cap: Option<u64>,

        /// Stop once the table holds this many records.
        #[arg(long)]
        total_cap: Option<u64>,

        /// Overwrite a row another writer stored after the existence check.
        /// Ids already stored are skipped either way.
        #[arg(long)]
        replace: bool,
    },

    /// Compute a statistics report and write it as JSON.
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },

    /// Show table sizes and recent ingestion runs.
    Status {
        /// Number of recent runs to show.
        #[arg(long, default_value = "5")]
        runs: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Ingestion sources.
#[derive(Clone, Copy, Debug, ValueEnum)]
pub(crate) enum SourceKind {
    /// PokeAPI base stats, requested id by id.
    Pokeapi,
    /// PoGoAPI Pokémon GO stats, one bulk document.
    Pogo,
    /// Bulbapedia sprite images.
    Images,
}

/// Report subcommands.
#[derive(Subcommand)]
pub(crate) enum ReportKind {
    /// Main-series attack against Pokémon GO base attack.
    Attack {
        /// Output file (defaults to <output_dir>/attack_comparison.json).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Base stats of two Pokémon side by side.
    Compare {
        /// Two comma-separated names (overrides `[reports] compare_names`).
        #[arg(long, value_delimiter = ',')]
        names: Option<Vec<String>>,

        /// Output file (defaults to <output_dir>/stat_comparison.json).
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Stat progression along an evolution line.
    Evolution {
        /// Comma-separated names in stage order (overrides `[reports] evolution_names`).
        #[arg(long, value_delimiter = ',')]
        names: Option<Vec<String>>,

        /// Output file (defaults to <output_dir>/evolution_trend.json).
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "pokedex=info",
        1 => "pokedex=debug",
        _ => "pokedex=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(&cli),
        };
    }

    let config = resolve_config(&cli)?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());

    match cli.command {
        Command::Fetch {
            source,
            per_run_cap,
            total_cap,
            replace,
        } => {
            let options = fetch_options(&config.budget, per_run_cap, total_cap, replace);
            cmd_fetch(&config, &db_path, source, options).await
        }
        Command::Report { kind } => cmd_report(&config, &db_path, kind).await,
        Command::Status { runs } => cmd_status(&db_path, runs).await,
        Command::Config { .. } => Ok(()),
    }
}

/// `[budget]` settings with command-line overrides applied.
fn fetch_options(
    section: &BudgetSection,
    per_run_cap: Option<u64>,
    total_cap: Option<u64>,
    replace: bool,
) -> IngestOptions {
    let mut budget = section.budget();
    if let Some(cap) = per_run_cap {
        budget.per_run_cap = cap;
    }
    if total_cap.is_some() {
        budget.total_cap = total_cap;
    }
    IngestOptions {
        budget,
        mode: if replace {
            UpsertMode::Replace
        } else {
            section.upsert_mode
        },
    }
}

/// Config from `--config`, or the default location.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// fetch
// ---------------------------------------------------------------------------

async fn cmd_fetch(
    config: &AppConfig,
    db_path: &Path,
    source: SourceKind,
    options: IngestOptions,
) -> Result<()> {
    let storage = Storage::open(db_path).await?;
    let client = build_client(&config.http)?;

    info!(
        ?source,
        db = %db_path.display(),
        per_run_cap = options.budget.per_run_cap,
        "fetching"
    );

    let report = match source {
        SourceKind::Pokeapi => {
            let source = PokeApiSource::from_config(client, &config.sources)?;
            ingest(&source, &storage, options).await?
        }
        SourceKind::Pogo => {
            let source = PogoApiSource::from_config(client, &config.sources)?;
            ingest(&source, &storage, options).await?
        }
        SourceKind::Images => {
            let source = BulbapediaSource::from_config(client, &config.sources)?;
            ingest(&source, &storage, options).await?
        }
    };

    let stop = match report.stop_reason {
        StopReason::BudgetExhausted => "budget reached, run again for more",
        StopReason::SourceExhausted => "source exhausted",
    };

    println!();
    println!("  Ingestion run complete ({stop})");
    println!("  Source:           {}", report.source);
    println!("  Table:            {}", report.table);
    println!("  Added:            {}", report.added);
    println!("  Already stored:   {}", report.skipped_existing);
    println!("  Not found:        {}", report.skipped_not_found);
    println!("  Malformed:        {}", report.skipped_malformed);
    println!("  Rows in table:    {}", report.store_count);
    println!("  Time:             {:.1}s", report.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn ingest<S: RecordSource>(
    source: &S,
    storage: &Storage,
    options: IngestOptions,
) -> Result<IngestReport> {
    let store = TableStore::new(storage, source.target());
    let reporter = CliProgress::new();
    let result = IncrementalIngestor::new(source, &store, options)
        .with_history(storage)
        .run(&reporter)
        .await;
    // `done` is only reached on success.
    reporter.spinner.finish_and_clear();
    Ok(result?)
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn record_added(&self, label: &str, added: u64, per_run_cap: u64) {
        self.spinner
            .set_message(format!("Added [{added}/{per_run_cap}] {label}"));
    }

    fn record_skipped(&self, id: RecordId, reason: SkipReason) {
        let why = match reason {
            SkipReason::Existing => "already stored",
            SkipReason::NotFound => "not found",
            SkipReason::Malformed => "malformed",
        };
        self.spinner.set_message(format!("Skipped #{id} ({why})"));
    }

    fn done(&self, _report: &IngestReport) {
        self.spinner.finish_and_clear();
    }
}

// ---------------------------------------------------------------------------
// report
// ---------------------------------------------------------------------------

async fn cmd_report(config: &AppConfig, db_path: &Path, kind: ReportKind) -> Result<()> {
    let storage = Storage::open_readonly(db_path).await?;
    let output_dir = &config.reports.output_dir;

    let written = match kind {
        ReportKind::Attack { out } => {
            let result = report::attack_comparison(&storage).await?;
            println!("  Pokémon in both tables: {}", result.rows.len());
            println!("  Avg main-series attack: {}", fmt_avg(result.avg_pokemon_attack));
            println!("  Avg GO base attack:     {}", fmt_avg(result.avg_go_base_attack));
            let path = out.unwrap_or_else(|| output_dir.join("attack_comparison.json"));
            report::write_report(&path, &result)?
        }
        ReportKind::Compare { names, out } => {
            let names = names.unwrap_or_else(|| config.reports.compare_names.clone());
            let result = report::compare_stats(&storage, &names).await?;
            println!(
                "  Differences ({} - {}):",
                result.second.name, result.first.name
            );
            for (stat, delta) in &result.differences {
                println!("    {stat:<16} {}", fmt_delta(*delta));
            }
            let path = out.unwrap_or_else(|| output_dir.join("stat_comparison.json"));
            report::write_report(&path, &result)?
        }
        ReportKind::Evolution { names, out } => {
            let names = names.unwrap_or_else(|| config.reports.evolution_names.clone());
            let result = report::evolution_trend(&storage, &names).await?;
            for stage in &result.stages {
                println!(
                    "  {:<12} hp {:>4}  attack {:>4}  defense {:>4}",
                    stage.name,
                    fmt_stat(stage.hp),
                    fmt_stat(stage.attack),
                    fmt_stat(stage.defense)
                );
            }
            if !result.missing.is_empty() {
                println!("  Not stored: {}", result.missing.join(", "));
            }
            let path = out.unwrap_or_else(|| output_dir.join("evolution_trend.json"));
            report::write_report(&path, &result)?
        }
    };

    println!("  Report written to {}", written.display());
    Ok(())
}

fn fmt_avg(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}"))
}

fn fmt_delta(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:+}"))
}

fn fmt_stat(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

async fn cmd_status(db_path: &Path, runs: u32) -> Result<()> {
    if !db_path.exists() {
        return Err(eyre!(
            "no database at '{}', run `pokedex fetch` first",
            db_path.display()
        ));
    }
    let storage = Storage::open_readonly(db_path).await?;

    println!();
    println!("  Database: {}", db_path.display());
    for (table, count) in storage.table_counts().await? {
        println!("  {table:<18} {count:>6} rows");
    }

    let recent = storage.recent_ingest_runs(runs).await?;
    if !recent.is_empty() {
        println!();
        println!("  Recent runs:");
    }
    for run in recent {
        let outcome = match &run.stats {
            Some(stats) => format!(
                "{} (+{})",
                stats["status"].as_str().unwrap_or("unknown"),
                stats["added"].as_u64().unwrap_or(0)
            ),
            None => "unfinished".to_string(),
        };
        println!(
            "  {}  {:<10} -> {:<18} {outcome}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.source,
            run.table_name
        );
    }
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
