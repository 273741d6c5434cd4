//! Boilerplate-stripping text extraction from a fetched page.
//!
//! The extractor is deliberately simple: it does not score nodes the way
//! readability-style engines do. It removes everything that is obviously
//! chrome (scripts, navigation, footers, ads, comment threads), picks the
//! first article-like container, and keeps only heading and paragraph text
//! in document order. That is enough for the rewrite engine, which needs the
//! substance of a post, not its layout.

use crate::error::ExtractionError;
use crate::pipeline::fetch::PageFetcher;
use once_cell::sync::Lazy;
use scraper::{node::Element, ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

/// Tags whose whole subtree is never content.
const DENY_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "form", "nav", "footer", "header",
    "aside",
];

/// Class/id tokens that only mark chrome when they match exactly;
/// as substrings they would hit words like "header" or "shadow".
const DENY_EXACT_TOKENS: &[&str] = &["ad", "ads", "nav"];

/// Class/id substrings that mark chrome wherever they appear in a token.
const DENY_SUBSTRINGS: &[&str] = &[
    "advert",
    "sidebar",
    "comment",
    "footer",
    "header",
    "navbar",
    "navigation",
    "breadcrumb",
    "cookie",
    "banner",
    "newsletter",
    "share",
    "social",
    "promo",
    "related",
];

/// Structural elements exempt from class/id heuristics (`<body class="has-sidebar">`).
const PROTECTED_TAGS: &[&str] = &["html", "body", "main", "article"];

/// Content containers, most specific first.
static CONTAINER_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article",
        "main",
        "[role=\"main\"]",
        ".main",
        ".post",
        ".entry-content",
        ".article-body",
        "#main",
        "#content",
    ]
    .iter()
    .map(|s| Selector::parse(s).unwrap())
    .collect()
});

static TEXT_BLOCKS: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2, h3, h4, p").unwrap());

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// Landmarks that keep a wrapper alive even when its class looks like chrome
/// (`<div class="content-sidebar-wrap"><main>…`).
static LANDMARKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article, main, [role=\"main\"]").unwrap());

/// Fetch `url` and extract its readable text.
///
/// # Errors
/// - [`ExtractionError::Fetch`] / [`ExtractionError::FetchTimeout`] from the fetcher
/// - [`ExtractionError::EmptyContent`] when no heading or paragraph text survives
pub async fn extract(fetcher: &dyn PageFetcher, url: &Url) -> Result<String, ExtractionError> {
    let html = fetcher.fetch(url).await?;
    let text = extract_text(&html);
    if text.is_empty() {
        return Err(ExtractionError::EmptyContent {
            url: url.to_string(),
        });
    }
    debug!("Extracted {} chars from {}", text.len(), url);
    Ok(text)
}

/// Extract heading and paragraph text from an HTML document.
///
/// Returns the trimmed, whitespace-normalised text of each `h1`–`h4` and `p`
/// in the primary container, in document order, separated by blank lines.
/// Returns an empty string when nothing readable is found.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);

    for selector in CONTAINER_SELECTORS.iter() {
        for candidate in document.select(selector) {
            if in_denied_subtree(&candidate) {
                continue;
            }
            let blocks = collect_blocks(candidate);
            if !blocks.is_empty() {
                return blocks.join("\n\n");
            }
        }
    }

    // Fall back to the whole (remaining) body.
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());
    collect_blocks(root).join("\n\n")
}

fn collect_blocks(container: ElementRef<'_>) -> Vec<String> {
    container
        .select(&TEXT_BLOCKS)
        .filter(|el| !in_denied_subtree(el))
        .map(|el| {
            let mut raw = String::new();
            push_visible_text(el, &mut raw);
            normalize_whitespace(&raw)
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Append the text below `el`, skipping denied subtrees (e.g. an inline `<script>`).
fn push_visible_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    if !is_denied(child_el) {
                        push_visible_text(child_el, out);
                    }
                }
            }
            _ => {}
        }
    }
}

fn in_denied_subtree(el: &ElementRef<'_>) -> bool {
    if is_denied(*el) {
        return true;
    }
    el.ancestors().filter_map(ElementRef::wrap).any(is_denied)
}

fn is_denied(el: ElementRef<'_>) -> bool {
    let value = el.value();
    let name = value.name();
    if DENY_TAGS.contains(&name) {
        return true;
    }
    if PROTECTED_TAGS.contains(&name) {
        return false;
    }
    has_denied_token(value) && el.select(&LANDMARKS).next().is_none()
}

fn has_denied_token(el: &Element) -> bool {
    el.classes().any(is_denied_token) || el.id().is_some_and(is_denied_token)
}

fn is_denied_token(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    DENY_EXACT_TOKENS.contains(&token.as_str())
        || DENY_SUBSTRINGS.iter().any(|s| token.contains(s))
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
