//! File-backed state that survives restarts: the delivery cursor and the
//! browser session cookies.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Watermark over the blog listing: the URL of the newest post already
/// delivered. Not a log — overwritten whole on every advance.
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Returns None if the cursor was never written.
    pub fn read(&self) -> Option<String> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        let url = content.trim();
        if url.is_empty() {
            None
        } else {
            Some(url.to_string())
        }
    }

    /// Overwrites unconditionally. Single-process, single-writer.
    pub fn write(&self, url: &str) -> Result<()> {
        std::fs::write(&self.path, url)
            .with_context(|| format!("Failed to write cursor file: {}", self.path.display()))
    }
}

/// One browser cookie, in the shape CDP hands them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub http_only: bool,
    /// Seconds since epoch; negative or absent means a session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedSession {
    cookies: Vec<CookieRecord>,
    created_at: DateTime<Utc>,
}

/// Persisted login cookies. Expiry is not checked here — a stale session
/// surfaces downstream as a failed login wait, not as a load error.
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self { path: path.as_ref().to_path_buf() }
    }

    /// Returns None if the file is absent or unreadable. A corrupt file is
    /// treated the same as a missing one.
    pub fn load(&self) -> Option<Vec<CookieRecord>> {
        let content = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str::<SavedSession>(&content) {
            Ok(saved) => Some(saved.cookies),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e,
                    "session cache unreadable, will re-login");
                None
            }
        }
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
        let saved = SavedSession {
            cookies: cookies.to_vec(),
            created_at: Utc::now(),
        };
        let content = serde_json::to_string_pretty(&saved)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write session cache: {}", self.path.display()))
    }
}
