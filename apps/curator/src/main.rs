mod config;
mod errors;
mod promotion;
mod staging;
mod store;
mod submission;
mod transport;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{BotConfig, Config};
use crate::promotion::Promoter;
use crate::staging::{PermanentStores, StagingArea};
use crate::store::catalog::Catalog;
use crate::submission::{poller, IngestSettings, Ingestor};
use crate::transport::TelegramClient;

#[derive(Debug, Parser)]
#[command(
    name = "curator",
    version,
    about = "Collects photo submissions from a chat and publishes them to a catalog"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Poll the chat forever (default)
    Run,
    /// Run a single poll cycle and exit
    Once,
    /// Move completed submissions into the catalog and exit
    Promote,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting curator v{}", env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Run) {
        Command::Promote => promote(&config),
        command => ingest(&config, matches!(command, Command::Once)).await,
    }
}

async fn ingest(config: &Config, once: bool) -> Result<()> {
    let bot = BotConfig::from_env()?;
    let layout = config.layout();

    let transport = TelegramClient::new(&bot.api_url, bot.bot_token.clone(), bot.long_poll_secs)?;
    let mut ingestor = Ingestor::open(
        transport,
        &layout,
        IngestSettings {
            source_chat: bot.channel_id,
            reset_command: bot.reset_command.clone(),
        },
    )?;
    info!(
        "Ingesting from chat {} into {} (cursor {}, {} sessions)",
        bot.channel_id,
        layout.staging_dir.display(),
        ingestor.cursor().last_sequence,
        ingestor.session_count()
    );

    if once {
        let report = ingestor.run_cycle().await?;
        info!(
            "Processed {} of {} updates ({} failed), cursor at {}",
            report.handled, report.fetched, report.failed, report.cursor
        );
    } else {
        let cycles =
            poller::run_until(&mut ingestor, bot.poll_interval, poller::shutdown_signal()).await;
        info!("Stopped after {cycles} poll cycles");
    }
    Ok(())
}

fn promote(config: &Config) -> Result<()> {
    let layout = config.layout();
    let promoter = Promoter::new(
        StagingArea::new(&layout.staging_dir),
        PermanentStores::new(
            &layout.image_dir,
            &layout.prompt_dir,
            &layout.image_subdir,
            &layout.prompt_subdir,
        ),
        Catalog::new(&layout.catalog_file),
    );

    let promoted = promoter.promote()?;
    for base in &promoted {
        println!("{base}");
    }
    info!("Promoted {} submissions into {}", promoted.len(), layout.catalog_file.display());
    Ok(())
}
