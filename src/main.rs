//! Процесс шины каналов.
//!
//! Загружает настройки, поднимает логирование, запускает сервер с фоновым
//! сборщиком и работает до Ctrl+C.

use std::path::PathBuf;

use anyhow::{Context, Result};
use channelbus::{
    bus::{BusServer, Persistent},
    config::Settings,
    logging::{self, LogFormat},
};
use clap::Parser;

#[derive(Parser)]
#[command(name = "channelbus")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hierarchical pub/sub channel bus", long_about = None)]
struct Cli {
    /// Путь к TOML-файлу настроек
    #[arg(short, long, env = "CHANNELBUS_CONFIG")]
    config: Option<PathBuf>,
    /// Переопределяет формат логов из настроек
    #[arg(long)]
    log_format: Option<LogFormat>,
    /// Каналы, создаваемые постоянными при старте (можно повторять)
    #[arg(long = "persistent", value_name = "CHANNEL")]
    persistent: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings =
        Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(format) = cli.log_format {
        settings.logging.format = format;
    }
    logging::init_logging(&settings.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {e}"))?;

    tracing::info!(
        git_commit = env!("CHANNELBUS_GIT_COMMIT"),
        build_time = env!("CHANNELBUS_BUILD_TIME"),
        "Starting channelbus"
    );

    let server = BusServer::new(settings.bus_config());
    for id in &cli.persistent {
        server
            .create_channel_if_absent(id, &[&Persistent])
            .with_context(|| format!("invalid persistent channel {id}"))?;
    }
    server.start();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;

    server.stop();
    let metrics = server.metrics();
    tracing::info!(
        publishes = metrics.publishes,
        deliveries = metrics.deliveries,
        channels = server.channels().len(),
        "Shutdown complete"
    );
    Ok(())
}
