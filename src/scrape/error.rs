use thiserror::Error;

/// Cycle-fatal scrape failures. Per-post extraction problems are not errors
/// at this level — the scraper logs and skips those.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("login wait timed out after {waited_s}s; complete the login in the browser window or clear the session cache")]
    LoginTimeout { waited_s: u64 },

    #[error("page did not render `{marker}` within {waited_s}s")]
    RenderTimeout { marker: String, waited_s: u64 },
}
