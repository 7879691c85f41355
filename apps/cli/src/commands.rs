//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use pagewatch_fetcher::Fetcher;
use pagewatch_notifier::Notifier;
use pagewatch_pipeline::{PassReport, Pipeline, ProgressReporter};
use pagewatch_shared::{AppConfig, Target, TargetStatus, init_config, load_config, resolve_db_path};
use pagewatch_storage::Storage;
use pagewatch_summarizer::Summarizer;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Pagewatch — get alerted when competitor pages change.
#[derive(Parser)]
#[command(
    name = "pagewatch",
    version,
    about = "Monitor competitor web pages and email alerts on meaningful changes.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database path (overrides the config file).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one monitoring pass over all active targets.
    ///
    /// This is the entry point an external scheduler (cron) should invoke.
    Run,

    /// Register a new target page.
    Add {
        /// Page URL to monitor.
        url: String,

        /// Email address alerts are sent to.
        #[arg(short, long)]
        email: String,

        /// Human-readable name (defaults to the URL in alerts).
        #[arg(short, long)]
        name: Option<String>,

        /// Check interval in hours.
        #[arg(short, long, default_value = "24")]
        frequency: u32,
    },

    /// List registered targets.
    List,

    /// Delete a target and its snapshot history.
    Remove {
        /// Target ID.
        id: String,
    },

    /// Pause a target (skipped by passes until resumed).
    Pause {
        /// Target ID.
        id: String,
    },

    /// Resume a paused target.
    Resume {
        /// Target ID.
        id: String,
    },

    /// Show a target's snapshot history, most recent first.
    History {
        /// Target ID.
        id: String,

        /// Maximum snapshots to show.
        #[arg(short, long, default_value = "10")]
        limit: u32,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
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
        0 => "pagewatch=info",
        1 => "pagewatch=debug",
        _ => "pagewatch=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run => cmd_run(cli.db).await,
        Command::Add {
            url,
            email,
            name,
            frequency,
        } => cmd_add(cli.db, &url, &email, name, frequency).await,
        Command::List => cmd_list(cli.db).await,
        Command::Remove { id } => cmd_remove(cli.db, &id).await,
        Command::Pause { id } => cmd_set_status(cli.db, &id, TargetStatus::Paused).await,
        Command::Resume { id } => cmd_set_status(cli.db, &id, TargetStatus::Active).await,
        Command::History { id, limit } => cmd_history(cli.db, &id, limit).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Open storage at the CLI override or the configured path.
async fn open_storage(db_override: Option<PathBuf>, config: &AppConfig) -> Result<Storage> {
    let path = match db_override {
        Some(p) => p,
        None => resolve_db_path(config)?,
    };
    Ok(Storage::open(&path).await?)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    // Capabilities resolve once here; missing credentials mean degraded
    // summaries and logged-only alerts, never a startup failure.
    let fetcher = Fetcher::new(&config.fetch)?;
    let summarizer = Summarizer::new(pagewatch_summarizer::Backend::from_config(&config.openai))?;
    let notifier = Notifier::new(pagewatch_notifier::Backend::from_config(&config.email))?;

    if !summarizer.is_configured() {
        info!("summarizer running in degraded mode");
    }
    if !notifier.is_configured() {
        info!("notifier running in simulated mode");
    }

    let pipeline = Pipeline::new(fetcher, summarizer, notifier, config.defaults.concurrency);

    let reporter = CliProgress::new();
    let report = pipeline.run_pass(&storage, &reporter).await?;
    reporter.finish();

    print_report(&report);
    Ok(())
}

fn print_report(report: &PassReport) {
    println!();
    println!("  Pass completed!");
    println!("  Checked: {}", report.checked);
    println!("  Changed: {}", report.changed);
    println!("  Failed:  {}", report.failed);
    println!("  Time:    {:.1}s", report.duration.as_secs_f64());
    for outcome in &report.outcomes {
        if let Err(e) = &outcome.result {
            println!("    failed: {} — {e}", outcome.url);
        }
    }
    println!();
}

async fn cmd_add(
    db: Option<PathBuf>,
    url: &str,
    email: &str,
    name: Option<String>,
    frequency: u32,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    let mut target = Target::new(url, email, name)?;
    target.frequency_hours = frequency;

    storage.insert_target(&target).await?;
    info!(url, id = %target.id, "target registered");

    println!("Registered target {} ({url})", target.id);
    Ok(())
}

async fn cmd_list(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    let targets = storage.list_targets().await?;
    if targets.is_empty() {
        println!("No targets registered. Add one with `pagewatch add <url> --email <you>`.");
        return Ok(());
    }

    for target in targets {
        let last = target
            .last_checked
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".into());
        println!(
            "{}  [{}]  {}  (owner: {}, every {}h, last checked: {last})",
            target.id,
            target.status,
            target.url,
            target.owner_email,
            target.frequency_hours,
        );
    }
    Ok(())
}

async fn cmd_remove(db: Option<PathBuf>, id: &str) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    let Some(target) = storage.get_target(id).await? else {
        return Err(eyre!("no target with id '{id}'"));
    };

    storage.delete_target(id).await?;
    println!("Removed {} ({})", target.id, target.url);
    Ok(())
}

async fn cmd_set_status(db: Option<PathBuf>, id: &str, status: TargetStatus) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    if storage.get_target(id).await?.is_none() {
        return Err(eyre!("no target with id '{id}'"));
    }

    storage.set_target_status(id, status).await?;
    println!("Target {id} is now {status}");
    Ok(())
}

async fn cmd_history(db: Option<PathBuf>, id: &str, limit: u32) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db, &config).await?;

    let Some(target) = storage.get_target(id).await? else {
        return Err(eyre!("no target with id '{id}'"));
    };

    let snapshots = storage.list_snapshots(id, limit).await?;
    println!("History for {} ({} snapshots shown)", target.url, snapshots.len());
    for snapshot in snapshots {
        println!(
            "  {}  {}  {}",
            snapshot.created_at.to_rfc3339(),
            &snapshot.content_hash[..12.min(snapshot.content_hash.len())],
            snapshot.summary,
        );
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
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
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn target_checked(&self, url: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Checked [{current}/{total}] {url}"));
    }
}
