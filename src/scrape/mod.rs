pub mod error;
pub mod extract;

use anyhow::Result;
use async_trait::async_trait;

/// One new blog post, ready for delivery. Transient: built here, consumed
/// once by the notifier, never persisted.
#[derive(Debug, Clone)]
pub struct Post {
    pub title: String,
    pub link: String,
    pub content: String,
}

/// An authenticated view of the blog. The browser driver implements this;
/// tests substitute canned HTML.
#[async_trait]
pub trait BlogSession: Send {
    /// Rendered HTML of listing page `page` (1-based).
    async fn listing_html(&mut self, page: usize) -> Result<String>;

    /// Rendered HTML of a single post page.
    async fn post_html(&mut self, link: &str) -> Result<String>;
}

/// Walk the listing newest-first and collect every post published after the
/// cursor, stopping at the first already-seen link.
///
/// The cursor comparison is a short-circuit, not a full diff: the first
/// match ends the traversal across all remaining pages. Navigation failures
/// abort the whole scrape; a post whose page is missing expected elements
/// is logged and skipped.
pub async fn collect_new_posts<S: BlogSession + ?Sized>(
    session: &mut S,
    cursor: Option<&str>,
    listing_url: &str,
    max_pages: usize,
) -> Result<Vec<Post>> {
    let mut batch: Vec<Post> = Vec::new();

    for page in 1..=max_pages {
        let html = session.listing_html(page).await?;
        let links = extract::listing_links(&html, listing_url);

        if links.is_empty() {
            tracing::warn!(page, "no articles found on listing page; the layout may have changed");
            break;
        }

        for link in links {
            if cursor == Some(link.as_str()) {
                tracing::info!(link, "reached last delivered post, stopping scrape");
                return Ok(batch);
            }

            let post_page = session.post_html(&link).await?;
            match extract::extract_post(&post_page) {
                Ok(extracted) => {
                    tracing::debug!(link, title = %extracted.title, "collected new post");
                    batch.push(Post {
                        title: extracted.title,
                        link,
                        content: extracted.content,
                    });
                }
                Err(e) => {
                    tracing::warn!(link, error = %e, "skipping post with unreadable markup");
                }
            }
        }
    }

    Ok(batch)
}
