//! One scrape+notify cycle, and the scheduler loop that owns it.
//!
//! Both entry points — the interval timer and the /refresh command — funnel
//! into a single `select!` loop, so two cycles can never run concurrently
//! and the browser, cursor file, and session cache have exactly one user.

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::notifier;
use crate::scrape::{collect_new_posts, Post};
use crate::store::{CursorStore, SessionCache};
use crate::telegram::{Messenger, RefreshRequest, TelegramBot};

pub struct Cycle<'a> {
    pub config: &'a Config,
    pub cursor: &'a CursorStore,
    pub cache: &'a SessionCache,
    pub messenger: &'a dyn Messenger,
    pub headless: bool,
}

impl Cycle<'_> {
    /// Run one full cycle against a fresh browser session.
    pub async fn run(&self) -> Result<usize> {
        let cursor = self.cursor.read();
        tracing::info!(
            cursor = cursor.as_deref().unwrap_or("<none>"),
            "starting scrape cycle"
        );

        let mut session = BrowserSession::open(
            &self.config.blog,
            &self.config.scrape,
            self.headless,
            self.cache,
        )
        .await?;

        let batch = collect_new_posts(
            &mut session,
            cursor.as_deref(),
            &self.config.blog.listing_url,
            self.config.scrape.max_pages,
        )
        .await;

        // Teardown happens whether or not the scrape succeeded.
        session.close().await;

        self.deliver(batch?).await
    }

    /// Deliver a collected batch and advance the cursor. The cursor write
    /// is the last step of a cycle: any failure before it leaves stored
    /// state exactly as the cycle found it.
    pub async fn deliver(&self, batch: Vec<Post>) -> Result<usize> {
        if batch.is_empty() {
            tracing::info!("no new posts found");
            return Ok(0);
        }

        let newest = batch[0].link.clone();
        let delay = Duration::from_millis(self.config.scheduler.send_delay_ms);
        notifier::send_posts(self.messenger, &batch, delay).await;

        self.cursor.write(&newest)?;
        tracing::info!(count = batch.len(), cursor = %newest, "cycle complete, cursor advanced");
        Ok(batch.len())
    }
}

/// Report a cycle failure to the operator chat. Best effort: if the chat
/// is unreachable too, the failure lives only in the log.
pub async fn report_cycle_error(messenger: &dyn Messenger, label: &str, err: &anyhow::Error) {
    tracing::error!(error = format!("{err:#}"), label, "cycle failed");
    let text = format!("⚠️ *{label}*\n\n`{err:#}`");
    if let Err(send_err) = messenger.send(&text).await {
        tracing::warn!(error = %send_err, "failed to report error to chat");
    }
}

/// Scheduler loop: a cycle on every timer tick and on every queued
/// /refresh, forever. Errors are reported and the loop keeps its normal
/// cadence — the retry policy is simply the next scheduled interval.
pub async fn run_scheduler(
    config: &Config,
    headless: bool,
    bot: Arc<TelegramBot>,
    mut refresh_rx: mpsc::Receiver<RefreshRequest>,
) -> Result<()> {
    let cursor = CursorStore::new(&config.storage.cursor_path);
    let cache = SessionCache::new(&config.storage.cookies_path);
    let cycle = Cycle {
        config,
        cursor: &cursor,
        cache: &cache,
        messenger: bot.as_ref(),
        headless,
    };

    let mut timer = tokio::time::interval(Duration::from_secs(config.scheduler.poll_interval_s));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = timer.tick() => {
                tracing::info!("scheduled check for new posts");
                if let Err(e) = cycle.run().await {
                    report_cycle_error(bot.as_ref(), "Scraper error", &e).await;
                }
            }
            Some(_) = refresh_rx.recv() => {
                match cycle.run().await {
                    Ok(0) => {
                        if let Err(e) = bot.send_message("No new posts found.").await {
                            tracing::warn!(error = %e, "failed to send refresh summary");
                        }
                    }
                    Ok(n) => {
                        let summary = format!("Found and sent {n} new post(s).");
                        if let Err(e) = bot.send_message(&summary).await {
                            tracing::warn!(error = %e, "failed to send refresh summary");
                        }
                    }
                    Err(e) => report_cycle_error(bot.as_ref(), "Refresh error", &e).await,
                }
            }
        }
    }
}
