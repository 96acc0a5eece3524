use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use blogwatch::config::Config;
use blogwatch::pipeline;
use blogwatch::telegram::{self, TelegramBot};

#[tokio::main]
async fn main() -> Result<()> {
    let log_file = std::fs::File::create("blogwatch.log")?;
    tracing_subscriber::fmt()
        .with_env_filter("blogwatch=info")
        .with_writer(log_file)
        .init();

    // The one CLI flag: run the browser with a visible window. Needed for
    // the first run, when a human has to complete the login.
    let headless = !std::env::args().any(|arg| arg == "--no-headless");

    let config = Config::load(Path::new("config.toml"))?;

    // Load saved token from .env (real env vars take precedence)
    Config::load_env_file();

    println!();
    println!("  blogwatch v0.1.0");
    println!("  ================");
    println!();
    if !headless {
        println!("  Browser window will be visible (--no-headless).");
        println!();
    }

    let token = Config::bot_token()?;
    let bot = Arc::new(TelegramBot::new(
        &token,
        &config.telegram.api_base,
        config.telegram.chat_id,
    ));

    // Doubles as a token/chat-id check: a bad token fails here, at startup,
    // not on the first delivery.
    let minutes = config.scheduler.poll_interval_s / 60;
    bot.send_message(&format!(
        "Scraper bot started. Checking for new posts every {minutes} minutes. Send /refresh to force a check."
    ))
    .await?;

    println!("  Telegram chat reachable. Starting scheduler...");
    println!();

    let (refresh_tx, refresh_rx) = mpsc::channel(16);
    let listener_bot = bot.clone();
    tokio::spawn(async move {
        telegram::run_update_listener(listener_bot, refresh_tx).await;
    });

    tokio::select! {
        res = pipeline::run_scheduler(&config, headless, bot, refresh_rx) => res,
        _ = tokio::signal::ctrl_c() => {
            println!("\n  Stopped by user.");
            tracing::info!("shutting down on ctrl-c");
            Ok(())
        }
    }
}
