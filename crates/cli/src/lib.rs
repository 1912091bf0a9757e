use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use command::MatchRequest;
use envelope::CommandResponse;
use serde_json::Value;
use sop_router::RouterConfig;
use std::io;
use std::path::PathBuf;

mod command;
mod envelope;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "sop-router")]
#[command(about = "Route operational queries to standard operating procedures", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Catalog JSON file (overrides `catalog.path` from --config)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// TOML configuration file with [weights], [thresholds], [gather], [catalog]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Gather context for a query and select the procedure to follow
    Match(MatchArgs),

    /// Inspect and maintain the procedure catalog
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Args)]
struct MatchArgs {
    /// Free-text description of the problem
    query: String,

    /// JSON file describing service health, metrics, logs and alerts
    #[arg(long)]
    environment: Option<PathBuf>,

    /// JSON file with evidence the caller already has (affected services, metrics, logs, alerts)
    #[arg(long)]
    context: Option<PathBuf>,

    /// Gathering budget in milliseconds (overrides `gather.budget_ms`)
    #[arg(long)]
    budget_ms: Option<u64>,
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// Seed the catalog with the built-in sample procedures
    Init {
        /// Reseed even if the catalog already holds procedures
        #[arg(long)]
        force: bool,
    },

    /// List every procedure
    List,

    /// Print one procedure in full
    Get { id: String },

    /// Remove a procedure
    Delete { id: String },

    /// Find procedures by trigger keyword/description or by tag
    Search {
        #[arg(long = "keyword")]
        keywords: Vec<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Add procedures from a JSON array file
    Import {
        file: PathBuf,

        /// Replace procedures whose id already exists instead of skipping them
        #[arg(long)]
        overwrite: bool,
    },

    /// Write every procedure to a JSON array file
    Export { file: PathBuf },

    /// Counts, tags and cache state
    Stats,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let response = match run(cli).await {
        Ok(data) => CommandResponse::ok(data),
        Err(err) => {
            log::debug!("Command failed: {err:?}");
            CommandResponse::error(&err)
        }
    };
    print_stdout(&serde_json::to_string_pretty(&response)?)?;
    if response.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<Value> {
    let config = resolve_config(&cli)?;
    match cli.command {
        Commands::Match(args) => {
            let request = MatchRequest {
                query: args.query,
                environment: args.environment,
                context: args.context,
                budget_ms: args.budget_ms,
            };
            command::run_match(request, config).await
        }
        Commands::Catalog(cmd) => run_catalog(cmd, &config),
    }
}

fn run_catalog(cmd: CatalogCommand, config: &RouterConfig) -> Result<Value> {
    use command::catalog;

    let settings = &config.catalog;
    match cmd {
        CatalogCommand::Init { force } => catalog::init(settings, force),
        CatalogCommand::List => catalog::list(settings),
        CatalogCommand::Get { id } => catalog::get(settings, &id),
        CatalogCommand::Delete { id } => catalog::delete(settings, &id),
        CatalogCommand::Search { keywords, tags } => catalog::search(settings, &keywords, &tags),
        CatalogCommand::Import { file, overwrite } => catalog::import(settings, &file, overwrite),
        CatalogCommand::Export { file } => catalog::export(settings, &file),
        CatalogCommand::Stats => catalog::stats(settings),
    }
}

/// Defaults, then the TOML file, then flags.
fn resolve_config(cli: &Cli) -> Result<RouterConfig> {
    let mut config = match &cli.config {
        Some(path) => RouterConfig::load(path).context("Failed to load configuration")?,
        None => RouterConfig::default(),
    };
    if let Some(path) = &cli.catalog {
        config.catalog.path = path.clone();
    }
    config.validate()?;
    Ok(config)
}
