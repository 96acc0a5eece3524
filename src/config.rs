use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::{self, Write};
use std::path::Path;

const ENV_FILE: &str = ".env";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub blog: BlogConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlogConfig {
    /// Blog root, used for login and cookie domain context.
    pub root_url: String,
    /// Listing page enumerating post summaries, newest first.
    pub listing_url: String,
    /// Text that only appears on the root page once logged in.
    pub login_marker: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    /// Listing pages to traverse per cycle. The upstream design only ever
    /// reads page 1; raising this is untested against the live site.
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
    /// Ceiling on the interactive login wait.
    #[serde(default = "default_login_wait")]
    pub login_wait_s: u64,
    /// Ceiling on each listing/post render wait.
    #[serde(default = "default_page_wait")]
    pub page_wait_s: u64,
}

fn default_max_pages() -> usize { 1 }
fn default_login_wait() -> u64 { 300 }
fn default_page_wait() -> u64 { 20 }

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
            login_wait_s: default_login_wait(),
            page_wait_s: default_page_wait(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Destination chat. Outbound posts go here; only /refresh from this
    /// chat is honored.
    pub chat_id: i64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_s: u64,
    /// Pacing between consecutive sends, to stay under Telegram rate limits.
    #[serde(default = "default_send_delay")]
    pub send_delay_ms: u64,
}

fn default_poll_interval() -> u64 { 300 }
fn default_send_delay() -> u64 { 1000 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_s: default_poll_interval(),
            send_delay_ms: default_send_delay(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_cursor_path")]
    pub cursor_path: String,
    #[serde(default = "default_cookies_path")]
    pub cookies_path: String,
}

fn default_cursor_path() -> String { "last_post_url.txt".to_string() }
fn default_cookies_path() -> String { "cookies.json".to_string() }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cursor_path: default_cursor_path(),
            cookies_path: default_cookies_path(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        Ok(config)
    }

    /// Load .env file into process environment. Real env vars take precedence.
    pub fn load_env_file() {
        let path = Path::new(ENV_FILE);
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return,
        };
        // Strip BOM if present (common on Windows-created files)
        let content = content.strip_prefix('\u{feff}').unwrap_or(&content);
        for line in content.lines() {
            let line = line.trim().trim_matches('\r');
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim().trim_matches('"').trim_matches('\'');
                if std::env::var(key).is_err() {
                    std::env::set_var(key, value);
                }
            }
        }
    }

    /// Bot token comes from the environment, or is prompted at startup.
    /// Prompted values are saved to .env for future runs.
    pub fn bot_token() -> Result<String> {
        match std::env::var("BLOGWATCH_BOT_TOKEN") {
            Ok(token) if !token.is_empty() => Ok(sanitize(&token)),
            _ => {
                let token = prompt("Telegram Bot Token")?;
                save_env_var("BLOGWATCH_BOT_TOKEN", &token);
                Ok(token)
            }
        }
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("  {} > ", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let value = input.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("{} cannot be empty", label);
    }
    Ok(value)
}

/// Strip carriage returns, BOM, and other invisible chars from a token value.
fn sanitize(raw: &str) -> String {
    raw.replace(['\r', '\u{feff}', '\u{200b}'], "")
        .trim()
        .to_string()
}

/// Append a KEY=VALUE line to .env and set it in the current process.
fn save_env_var(key: &str, value: &str) {
    std::env::set_var(key, value);
    let path = Path::new(ENV_FILE);
    let mut contents = std::fs::read_to_string(path).unwrap_or_default();
    if !contents.is_empty() && !contents.ends_with('\n') {
        contents.push('\n');
    }
    contents.push_str(&format!("{}={}\n", key, value));
    let _ = std::fs::write(path, contents);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipped_config_parses() {
        let config: Config = toml::from_str(include_str!("../config.toml")).unwrap();
        assert_eq!(config.scrape.max_pages, 1);
        assert_eq!(config.scheduler.poll_interval_s, 300);
        assert!(config.blog.listing_url.starts_with("https://"));
    }

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str(
            r#"
            [blog]
            root_url = "https://example.com/blog/"
            listing_url = "https://example.com/blog/posts/"
            login_marker = "My Blog"

            [telegram]
            chat_id = 42
            "#,
        )
        .unwrap();
        assert_eq!(config.scrape.max_pages, 1);
        assert_eq!(config.scrape.login_wait_s, 300);
        assert_eq!(config.scheduler.send_delay_ms, 1000);
        assert_eq!(config.storage.cursor_path, "last_post_url.txt");
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
    }
}
