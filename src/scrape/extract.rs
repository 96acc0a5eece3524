//! Markup contract with the upstream blog (a stock WordPress theme):
//! post summaries are `<article>` elements whose `.entry-title` wraps the
//! permalink, and a post page carries `h1.entry-title` plus
//! `div.entry-content`. An upstream redesign breaks these selectors — that
//! is a breaking external change, not a bug here.

use anyhow::{Context, Result};
use scraper::{Html, Selector};
use url::Url;

/// Pull permalinks out of a listing page, in rendered order (newest first).
/// Articles without a resolvable title link are skipped.
pub fn listing_links(html: &str, base_url: &str) -> Vec<String> {
    let Ok(article_sel) = Selector::parse("article") else {
        return Vec::new();
    };
    let Ok(title_sel) = Selector::parse(".entry-title") else {
        return Vec::new();
    };
    let Ok(anchor_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);

    document
        .select(&article_sel)
        .filter_map(|article| {
            let title = article.select(&title_sel).next()?;
            let href = title
                .select(&anchor_sel)
                .next()?
                .value()
                .attr("href")?;
            resolve_link(href, base.as_ref())
        })
        .collect()
}

/// Resolve a possibly-relative href against the listing URL.
fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Some(href.to_string()),
    }
}

/// Title and Markdown body extracted from one post page.
#[derive(Debug, Clone)]
pub struct ExtractedPost {
    pub title: String,
    pub content: String,
}

/// Extract title and body from a post page and convert the body to
/// Markdown. Missing elements are errors; the caller treats them as
/// skip-this-post, not as cycle failures.
pub fn extract_post(html: &str) -> Result<ExtractedPost> {
    let title_sel = Selector::parse("h1.entry-title")
        .ok()
        .context("invalid title selector")?;
    let content_sel = Selector::parse("div.entry-content")
        .ok()
        .context("invalid content selector")?;

    let document = Html::parse_document(html);

    let title = document
        .select(&title_sel)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .context("post page has no title element")?;

    let content_html = document
        .select(&content_sel)
        .next()
        .map(|el| el.html())
        .context("post page has no content element")?;

    let content = htmd::convert(&content_html)
        .map_err(|e| anyhow::anyhow!("failed to convert post body to Markdown: {e}"))?;

    Ok(ExtractedPost {
        title,
        content: content.trim().to_string(),
    })
}
