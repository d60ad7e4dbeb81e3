//! CLI command definitions, routing, and tracing setup.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

use hireflow_attach::{DriveStore, StoreOptions};
use hireflow_core::controller::Pipeline;
use hireflow_core::scheduler::Scheduler;
use hireflow_llm::{ClientOptions, OpenRouterClient};
use hireflow_shared::{
    AppConfig, PipelineConfig, RecordFilter, init_config, load_config, resolve_data_dir,
    validate_api_key,
};
use hireflow_source::{SheetSource, SourceOptions};
use hireflow_storage::RecordStore;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Hireflow — applicant intake and screening pipeline.
#[derive(Parser)]
#[command(
    name = "hireflow",
    version,
    about = "Poll form responses, resolve attachments, and run LLM screening stages.",
    long_about = None,
)]
pub(crate) struct Cli {
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
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the pipeline until interrupted (or once with --once).
    Run {
        /// Sheet export URL (overrides the configured source).
        #[arg(long)]
        sheet_url: Option<String>,

        /// Seconds between ticks (overrides the configured interval).
        #[arg(long)]
        interval: Option<u64>,

        /// Execute a single tick and exit.
        #[arg(long)]
        once: bool,
    },

    /// Show record counts per pipeline stage.
    Status,

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
        0 => "hireflow=info",
        1 => "hireflow=debug",
        _ => "hireflow=trace",
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
    match cli.command {
        Command::Run {
            sheet_url,
            interval,
            once,
        } => cmd_run(sheet_url.as_deref(), interval, once).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

async fn cmd_run(sheet_url: Option<&str>, interval: Option<u64>, once: bool) -> Result<()> {
    let mut config = load_config()?;
    validate_api_key(&config)?;

    if let Some(secs) = interval {
        config.defaults.tick_interval_secs = secs;
    }

    let sheet_url = sheet_url
        .map(String::from)
        .unwrap_or_else(|| config.source.sheet_url.clone());
    if sheet_url.is_empty() {
        return Err(eyre!(
            "no sheet URL configured. Pass --sheet-url or set [source].sheet_url in the config."
        ));
    }
    let sheet_url =
        Url::parse(&sheet_url).map_err(|e| eyre!("invalid sheet URL '{sheet_url}': {e}"))?;

    let data_dir = resolve_data_dir(&config)?;
    let pipeline_config = PipelineConfig::from_app_config(&config, &data_dir);

    let store = RecordStore::open(&data_dir.join("hireflow.db")).await?;
    let source = SheetSource::new(sheet_url.clone(), &SourceOptions::default())?;
    let attachments = DriveStore::new(
        config.attachments.download_url_template.clone(),
        &StoreOptions::default(),
    )?;
    let api_key = std::env::var(&config.openrouter.api_key_env).unwrap_or_default();
    let llm = OpenRouterClient::new(
        config.openrouter.base_url.clone(),
        config.openrouter.default_model.clone(),
        api_key,
        &ClientOptions::default(),
    )?;

    let scheduler = Scheduler::new(
        store,
        Arc::new(source),
        Arc::new(attachments),
        Arc::new(llm),
        pipeline_config,
    );

    info!(
        sheet_url = %sheet_url,
        interval_secs = config.defaults.tick_interval_secs,
        model = %config.openrouter.default_model,
        data_dir = %data_dir.display(),
        once,
        "starting hireflow"
    );

    if once {
        let spinner = tick_spinner();
        let stats = scheduler.tick().await;
        spinner.finish_and_clear();

        println!();
        println!("  Tick complete.");
        if let Some(ingest) = stats.ingest {
            println!("  Fetched:     {}", ingest.fetched);
            println!("  Processed:   {}", ingest.processed);
            println!("  Duplicates:  {}", ingest.duplicates);
            println!("  Skipped:     {}", ingest.skipped);
        } else {
            println!("  Ingestion failed — see log output.");
        }
        println!("  Questions:   {}", stats.questions_generated);
        println!("  Evaluations: {}", stats.evaluations_completed);
        println!();
        return Ok(());
    }

    let mut pipeline = Pipeline::new(scheduler);
    pipeline.start();

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| eyre!("could not listen for ctrl-c: {e}"))?;
    println!("\nShutting down after the current tick...");
    pipeline.stop().await;

    Ok(())
}

/// Spinner shown while a one-shot tick runs.
fn tick_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner.set_message("Running tick");
    spinner
}

// ---------------------------------------------------------------------------
// status
// ---------------------------------------------------------------------------

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let data_dir = resolve_data_dir(&config)?;
    let db_path = data_dir.join("hireflow.db");

    if !db_path.exists() {
        return Err(eyre!(
            "no database at '{}' — run `hireflow run` first",
            db_path.display()
        ));
    }

    let store = RecordStore::open(&db_path).await?;
    let total = store.count(RecordFilter::All).await?;
    let awaiting_questions = store.count(RecordFilter::AwaitingQuestions).await?;
    let awaiting_evaluation = store.count(RecordFilter::AwaitingEvaluation).await?;
    let evaluated = store.count(RecordFilter::Evaluated).await?;
    let ticks = store.finished_tick_count().await?;

    println!();
    println!("  Records:             {total}");
    println!("  Awaiting questions:  {awaiting_questions}");
    println!("  Awaiting evaluation: {awaiting_evaluation}");
    println!("  Evaluated:           {evaluated}");
    println!("  Completed ticks:     {ticks}");
    println!("  Database:            {}", db_path.display());
    println!();

    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

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
