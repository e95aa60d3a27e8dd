mod app;
mod client;
mod config;
mod state;
mod types;
mod ui;

use anyhow::{anyhow, Result};
use clap::Parser;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use app::App;
use client::BotSocket;
use config::Settings;

#[derive(Parser)]
#[command(name = "bot-dashboard")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Terminal dashboard for the automated trading bot", long_about = None)]
struct Cli {
    /// WebSocket endpoint of the bot server (overrides config and BOT_WS_URL)
    #[arg(short, long)]
    url: Option<String>,

    /// Configuration file path
    #[arg(short, long, default_value = "dashboard.toml")]
    config: String,

    /// Log file path (the terminal is owned by the dashboard)
    #[arg(long, default_value = "bot-dashboard.log")]
    log_file: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // The TUI owns stdout, so logs go to a file; RUST_LOG overrides -v
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let log_file = std::fs::File::create(&cli.log_file)?;
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Bot Dashboard v0.1.0");

    let mut settings = Settings::load(&cli.config)?;
    if let Some(url) = cli.url.or_else(|| std::env::var("BOT_WS_URL").ok()) {
        settings.server.url = url;
    }
    settings
        .validate()
        .map_err(|errors| anyhow!("Invalid configuration: {}", errors.join(", ")))?;

    let socket = BotSocket::new(settings.server.url.clone())
        .with_reconnect(Duration::from_secs(settings.server.reconnect_secs));
    let (events, commands) = socket.connect();

    let terminal = ratatui::init();
    let result = App::new(settings).run(terminal, events, commands).await;
    ratatui::restore();
    result
}
