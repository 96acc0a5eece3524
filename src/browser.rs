//! Chromium-driven blog session. One fresh browser per cycle: launched in
//! `open`, torn down in `close`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::CookieParam;
use chromiumoxide::page::Page;
use futures::StreamExt;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::config::{BlogConfig, ScrapeConfig};
use crate::scrape::error::ScrapeError;
use crate::scrape::BlogSession;
use crate::store::{CookieRecord, SessionCache};

/// How often the render/login waits re-read the page markup.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct BrowserSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    listing_url: String,
    page_wait: Duration,
}

impl BrowserSession {
    /// Launch a browser and authenticate against the blog.
    ///
    /// With cached cookies the login is silent. Without them, a human must
    /// complete the login in the (ideally visible) browser window; the wait
    /// is bounded by `login_wait_s` and times out as a distinct error kind.
    pub async fn open(
        blog: &BlogConfig,
        scrape: &ScrapeConfig,
        headless: bool,
        cache: &SessionCache,
    ) -> Result<Self> {
        let (browser, page, handler) = launch(headless, &blog.root_url).await?;
        let session = Self {
            browser,
            page,
            handler,
            listing_url: blog.listing_url.clone(),
            page_wait: Duration::from_secs(scrape.page_wait_s),
        };

        match cache.load() {
            Some(cookies) => {
                tracing::info!(count = cookies.len(), "applying cached session cookies");
                session.apply_cookies(&cookies).await?;
                // Reload so the page is rendered with the session attached.
                session.goto(&blog.root_url).await?;
            }
            None => {
                println!("  No cached session. Please log in to the blog in the browser window.");
                println!("  The scraper will continue once you have logged in.");
                tracing::info!(
                    ceiling_s = scrape.login_wait_s,
                    "waiting for interactive login"
                );

                let ceiling = Duration::from_secs(scrape.login_wait_s);
                if !session.wait_for_markup(&blog.login_marker, ceiling).await? {
                    return Err(ScrapeError::LoginTimeout { waited_s: scrape.login_wait_s }.into());
                }

                let cookies = session.capture_cookies().await?;
                cache.save(&cookies)?;
                tracing::info!(count = cookies.len(), "login successful, session cached");
                println!("  Login successful, session cached.");
            }
        }

        Ok(session)
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .with_context(|| format!("navigation to {url} failed"))?;
        Ok(())
    }

    /// Poll the rendered markup until `needle` appears. Returns false if
    /// the ceiling elapses first.
    async fn wait_for_markup(&self, needle: &str, ceiling: Duration) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + ceiling;
        loop {
            let html = self.page.content().await.context("failed to read page content")?;
            if html.contains(needle) {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn apply_cookies(&self, cookies: &[CookieRecord]) -> Result<()> {
        for record in cookies {
            let param = CookieParam::builder()
                .name(&record.name)
                .value(&record.value)
                .domain(&record.domain)
                .path(&record.path)
                .secure(record.secure)
                .http_only(record.http_only)
                .build()
                .map_err(|e| anyhow::anyhow!("failed to build cookie {}: {e}", record.name))?;
            self.page
                .set_cookie(param)
                .await
                .with_context(|| format!("failed to set cookie {}", record.name))?;
        }
        Ok(())
    }

    async fn capture_cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.page.get_cookies().await.context("failed to read cookies")?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                secure: c.secure,
                http_only: c.http_only,
                // CDP expiry is not carried over; the blog session cookie
                // outlives any realistic gap between runs.
                expires: None,
            })
            .collect())
    }

    /// Tear the browser down. Failures here are logged, not propagated —
    /// the batch result matters more than a clean chrome exit.
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!(error = %e, "browser close failed");
        }
        if let Err(e) = self.handler.await {
            tracing::warn!(error = %e, "browser handler task failed");
        }
    }
}

#[async_trait]
impl BlogSession for BrowserSession {
    async fn listing_html(&mut self, page: usize) -> Result<String> {
        let url = if page <= 1 {
            self.listing_url.clone()
        } else {
            format!("{}?paged={page}", self.listing_url)
        };
        self.goto(&url).await?;

        if !self.wait_for_markup("<article", self.page_wait).await? {
            return Err(ScrapeError::RenderTimeout {
                marker: "article".to_string(),
                waited_s: self.page_wait.as_secs(),
            }
            .into());
        }
        self.page.content().await.context("failed to read listing page")
    }

    async fn post_html(&mut self, link: &str) -> Result<String> {
        self.goto(link).await?;

        if !self.wait_for_markup("entry-content", self.page_wait).await? {
            return Err(ScrapeError::RenderTimeout {
                marker: "entry-content".to_string(),
                waited_s: self.page_wait.as_secs(),
            }
            .into());
        }
        self.page.content().await.context("failed to read post page")
    }
}

async fn launch(headless: bool, initial_url: &str) -> Result<(Browser, Page, JoinHandle<()>)> {
    let builder = BrowserConfig::builder()
        .arg("--no-sandbox") // Required for containerized environments
        .arg("--disable-dev-shm-usage") // Avoid /dev/shm size issues in containers
        .arg("--start-maximized");
    let builder = if headless { builder } else { builder.with_head() };
    let config = builder
        .build()
        .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .context("failed to launch browser")?;

    let handle = tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    let page = browser
        .new_page(initial_url)
        .await
        .context("failed to open blog root")?;
    // Let the initial load settle before cookies are touched.
    tokio::time::sleep(Duration::from_secs(2)).await;

    Ok((browser, page, handle))
}
