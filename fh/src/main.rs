//! Farmhand - card farming and market monitoring CLI

use std::fmt::{Debug, Display};
use std::fs;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};

use farmhand::cards::{RunningGames, card_engine};
use farmhand::cli::{Cli, Command, OutputFormat, get_log_path};
use farmhand::config::Config;
use farmhand::market::market_engine;
use farmhand::output::{render, render_summary};
use farmhand::progress::UnitProgress;
use farmhand::scheduler::Engine;
use farmhand::session::{OrderKind, ScriptedSession, Session};
use farmhand::workflow::{PauseGate, Workflow};

const CHANNEL_CAPACITY: usize = 64;

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load log level from config file early (before full config load)
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Cards {
            fixture,
            concurrency,
            reverse,
            format,
        } => cmd_cards(config, &fixture, concurrency, reverse, format).await,
        Command::Market {
            fixture,
            concurrency,
            rounds,
            format,
        } => cmd_market(config, &fixture, concurrency, rounds, format).await,
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_cards(
    mut config: Config,
    fixture: &Path,
    concurrency: Option<usize>,
    reverse: bool,
    format: OutputFormat,
) -> Result<()> {
    debug!(?fixture, ?concurrency, reverse, %format, "cmd_cards: called");
    if let Some(n) = concurrency {
        config.cards.max_concurrency = n;
    }
    config.cards.reverse |= reverse;
    config.validate()?;

    let session: Arc<dyn Session> = Arc::new(ScriptedSession::load(fixture)?);
    let engine = card_engine(
        session.clone(),
        config.cards.farm_settings(),
        config.cards.sort,
        PauseGate::new(),
        config.cards.engine_config(),
    )
    .await?;

    let mut running = RunningGames::new();
    let result = drive(engine, format, |progress| running.observe(progress)).await;
    if result.is_err() && !running.is_empty() {
        info!(games = running.len(), "Stopping games left running");
        running.stop_all(session.as_ref()).await;
    }
    result
}

async fn cmd_market(
    mut config: Config,
    fixture: &Path,
    concurrency: Option<usize>,
    rounds: Option<u32>,
    format: OutputFormat,
) -> Result<()> {
    debug!(?fixture, ?concurrency, ?rounds, %format, "cmd_market: called");
    if let Some(n) = concurrency {
        config.market.max_concurrency = n;
    }
    if let Some(rounds) = rounds {
        config.market.max_rounds = rounds;
    }
    config.validate()?;

    let session = Arc::new(ScriptedSession::load(fixture)?);
    let engine = market_engine(
        session,
        &[OrderKind::Buy, OrderKind::Sell],
        config.market.monitor_settings(),
        PauseGate::new(),
        config.market.engine_config(),
    )?;
    drive(engine, format, |_| {}).await
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize config")?;
    print!("{}", yaml);
    Ok(())
}

/// Run the engine on its own task and print what it forwards
async fn drive<K, W, F>(engine: Engine<K, W>, format: OutputFormat, mut observe: F) -> Result<()>
where
    K: Clone + Eq + Hash + Debug + Display + Serialize + Send + Sync + 'static,
    W: Workflow,
    F: FnMut(&UnitProgress<K>),
{
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(engine.run(tx));

    while let Some(progress) = rx.recv().await {
        observe(&progress);
        if let Some(line) = render(&progress, format)? {
            println!("{}", line);
        }
    }

    let stats = handle.await.context("Engine task panicked")??;
    info!(?stats, "Engine run complete");
    if format == OutputFormat::Text {
        println!("{}", render_summary(&stats));
    }
    Ok(())
}
