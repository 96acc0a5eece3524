//! End-to-end cycle behavior over canned HTML: incremental traversal,
//! delivery order, cursor movement, and failure isolation.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use blogwatch::config::Config;
use blogwatch::pipeline::{report_cycle_error, Cycle};
use blogwatch::scrape::error::ScrapeError;
use blogwatch::scrape::{collect_new_posts, BlogSession};
use blogwatch::store::{CursorStore, SessionCache};
use blogwatch::telegram::Messenger;

const LISTING_URL: &str = "https://blog/listing/";

fn test_config() -> Config {
    toml::from_str(
        r#"
        [blog]
        root_url = "https://blog/"
        listing_url = "https://blog/listing/"
        login_marker = "Welcome"

        [telegram]
        chat_id = 42

        [scheduler]
        send_delay_ms = 0
        "#,
    )
    .unwrap()
}

struct RecordingMessenger {
    sent: Mutex<Vec<String>>,
}

impl RecordingMessenger {
    fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()) }
    }

    fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send(&self, text: &str) -> Result<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// A blog made of canned HTML, newest post first.
struct FakeBlog {
    listing: String,
    posts: HashMap<String, String>,
}

impl FakeBlog {
    fn with_posts(numbers: &[u32]) -> Self {
        let mut listing = String::from("<html><body>");
        let mut posts = HashMap::new();
        for n in numbers {
            let link = format!("https://blog/x/{n}");
            listing.push_str(&format!(
                r#"<article><h2 class="entry-title"><a href="{link}">Post {n}</a></h2></article>"#
            ));
            posts.insert(
                link,
                format!(
                    r#"<h1 class="entry-title">Post {n}</h1>
                       <div class="entry-content"><p>Body {n}</p></div>"#
                ),
            );
        }
        listing.push_str("</body></html>");
        Self { listing, posts }
    }
}

#[async_trait]
impl BlogSession for FakeBlog {
    async fn listing_html(&mut self, _page: usize) -> Result<String> {
        Ok(self.listing.clone())
    }

    async fn post_html(&mut self, link: &str) -> Result<String> {
        self.posts
            .get(link)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown post {link}"))
    }
}

#[tokio::test]
async fn test_worked_example_cursor_42_listing_50_down() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let cursor = CursorStore::new(dir.path().join("last_post_url.txt"));
    let cache = SessionCache::new(dir.path().join("cookies.json"));
    let messenger = RecordingMessenger::new();

    cursor.write("https://blog/x/42").unwrap();

    let numbers: Vec<u32> = (40..=50).rev().collect();
    let mut blog = FakeBlog::with_posts(&numbers);
    let batch = collect_new_posts(&mut blog, cursor.read().as_deref(), LISTING_URL, 1)
        .await
        .unwrap();
    assert_eq!(batch.len(), 8);

    let cycle = Cycle {
        config: &config,
        cursor: &cursor,
        cache: &cache,
        messenger: &messenger,
        headless: true,
    };
    let delivered = cycle.deliver(batch).await.unwrap();
    assert_eq!(delivered, 8);

    // Chronological delivery: 43 first, 50 last.
    let sent = messenger.sent();
    assert_eq!(sent.len(), 8);
    assert!(sent[0].contains("Post 43"));
    assert!(sent[7].contains("Post 50"));

    // Cursor advanced to the newest post of the batch.
    assert_eq!(cursor.read().as_deref(), Some("https://blog/x/50"));
}

#[tokio::test]
async fn test_no_new_posts_leaves_cursor_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let cursor = CursorStore::new(dir.path().join("last_post_url.txt"));
    let cache = SessionCache::new(dir.path().join("cookies.json"));
    let messenger = RecordingMessenger::new();

    cursor.write("https://blog/x/50").unwrap();

    let numbers: Vec<u32> = (46..=50).rev().collect();
    let mut blog = FakeBlog::with_posts(&numbers);
    let batch = collect_new_posts(&mut blog, cursor.read().as_deref(), LISTING_URL, 1)
        .await
        .unwrap();
    assert!(batch.is_empty());

    let cycle = Cycle {
        config: &config,
        cursor: &cursor,
        cache: &cache,
        messenger: &messenger,
        headless: true,
    };
    assert_eq!(cycle.deliver(batch).await.unwrap(), 0);

    assert!(messenger.sent().is_empty());
    assert_eq!(cursor.read().as_deref(), Some("https://blog/x/50"));
}

#[tokio::test]
async fn test_first_run_delivers_whole_page_and_sets_cursor() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let cursor = CursorStore::new(dir.path().join("last_post_url.txt"));
    let cache = SessionCache::new(dir.path().join("cookies.json"));
    let messenger = RecordingMessenger::new();

    assert!(cursor.read().is_none());

    let numbers: Vec<u32> = (48..=50).rev().collect();
    let mut blog = FakeBlog::with_posts(&numbers);
    let batch = collect_new_posts(&mut blog, None, LISTING_URL, 1).await.unwrap();
    assert_eq!(batch.len(), 3);

    let cycle = Cycle {
        config: &config,
        cursor: &cursor,
        cache: &cache,
        messenger: &messenger,
        headless: true,
    };
    cycle.deliver(batch).await.unwrap();

    assert_eq!(messenger.sent().len(), 3);
    assert_eq!(cursor.read().as_deref(), Some("https://blog/x/50"));
}

#[tokio::test]
async fn test_auth_failure_mutates_nothing_and_reports_once() {
    let dir = tempfile::tempdir().unwrap();
    let cursor = CursorStore::new(dir.path().join("last_post_url.txt"));
    let messenger = RecordingMessenger::new();

    cursor.write("https://blog/x/42").unwrap();

    // An auth timeout aborts the cycle before any delivery or cursor write;
    // the scheduler's only side effect is one operator-facing report.
    let err = anyhow::Error::from(ScrapeError::LoginTimeout { waited_s: 300 });
    report_cycle_error(&messenger, "Scraper error", &err).await;

    let sent = messenger.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Scraper error"));
    assert!(sent[0].contains("login wait timed out"));
    assert_eq!(cursor.read().as_deref(), Some("https://blog/x/42"));
}

#[tokio::test]
async fn test_broken_post_markup_still_delivers_neighbors() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let cursor = CursorStore::new(dir.path().join("last_post_url.txt"));
    let cache = SessionCache::new(dir.path().join("cookies.json"));
    let messenger = RecordingMessenger::new();

    let numbers: Vec<u32> = (48..=50).rev().collect();
    let mut blog = FakeBlog::with_posts(&numbers);
    blog.posts.insert(
        "https://blog/x/49".to_string(),
        "<html><body><p>theme exploded</p></body></html>".to_string(),
    );

    let batch = collect_new_posts(&mut blog, None, LISTING_URL, 1).await.unwrap();

    let cycle = Cycle {
        config: &config,
        cursor: &cursor,
        cache: &cache,
        messenger: &messenger,
        headless: true,
    };
    cycle.deliver(batch).await.unwrap();

    let sent = messenger.sent();
    assert_eq!(sent.len(), 2);
    assert!(sent[0].contains("Post 48"));
    assert!(sent[1].contains("Post 50"));
    // Cursor still advances past the broken post.
    assert_eq!(cursor.read().as_deref(), Some("https://blog/x/50"));
}
