//! Delivery of a scraped batch to the chat: one message per post,
//! oldest-first, paced to stay under the bot API rate limit.

use std::time::Duration;

use crate::scrape::Post;
use crate::telegram::Messenger;

/// Telegram rejects messages over 4096 UTF-16 units; capping the body well
/// below that leaves room for the header, title, and link.
const MAX_CONTENT_CHARS: usize = 3500;

pub fn format_post(post: &Post) -> String {
    let content = truncate_content(&post.content);
    format!(
        "📢 *New Internship Blog Post* 📢\n\n*Title:* {}\n\n*Content:*\n{}\n\n*Link:* {}",
        post.title, content, post.link
    )
}

fn truncate_content(content: &str) -> String {
    if content.chars().count() <= MAX_CONTENT_CHARS {
        return content.to_string();
    }
    let truncated: String = content.chars().take(MAX_CONTENT_CHARS).collect();
    format!("{truncated}…")
}

/// Send the batch in reverse (the scraper accumulates newest-first, the
/// chat should read chronologically). A failed send drops that one post
/// and moves on.
pub async fn send_posts(messenger: &dyn Messenger, posts: &[Post], delay: Duration) {
    tracing::info!(count = posts.len(), "sending new posts");

    for post in posts.iter().rev() {
        match messenger.send(&format_post(post)).await {
            Ok(()) => tracing::info!(title = %post.title, "sent post"),
            Err(e) => tracing::warn!(title = %post.title, error = %e, "failed to send post"),
        }
        tokio::time::sleep(delay).await;
    }

    tracing::info!("finished sending batch");
}
