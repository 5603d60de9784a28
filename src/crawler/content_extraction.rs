//! Content extraction functionality for the crawler module

use scraper::{ElementRef, Html, Node, Selector};
use tracing::warn;
use url::Url;

/// Minimum text a main-content candidate must hold to be accepted.
pub const MIN_SUBSTANCE_CHARS: usize = 200;

/// Title and cleaned body of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    /// Best-effort title
    pub title: String,

    /// Cleaned plain-text body; empty when nothing usable was found
    pub body: String,
}

/// Elements whose text ends a line when flattening to plain text.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "main", "br", "li", "ul", "ol", "h1", "h2", "h3", "h4",
    "h5", "h6", "tr", "td", "th", "table", "blockquote", "pre", "dd", "dt", "figcaption",
];

fn parse_selectors(selectors: &[String]) -> Vec<Selector> {
    selectors
        .iter()
        .filter_map(|s| match Selector::parse(s) {
            Ok(selector) => Some(selector),
            Err(e) => {
                warn!("Failed to parse selector '{}': {}", s, e);
                None
            }
        })
        .collect()
}

/// Split into lines, trim, drop lines of two characters or fewer, collapse
/// consecutive duplicates and rejoin with newlines.
pub fn clean_text(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in raw.lines().map(str::trim) {
        if line.chars().count() <= 2 {
            continue;
        }
        if lines.last().is_some_and(|last| *last == line) {
            continue;
        }
        lines.push(line);
    }
    lines.join("\n")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Flatten an element to text, skipping any subtree matched by `excluded`.
fn element_text(element: ElementRef<'_>, excluded: &[Selector]) -> String {
    let mut out = String::new();
    push_text(element, excluded, &mut out);
    out
}

fn push_text(element: ElementRef<'_>, excluded: &[Selector], out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push('\n');
            }
            Node::Element(el) => {
                let Some(child_ref) = ElementRef::wrap(child) else {
                    continue;
                };
                if excluded.iter().any(|s| s.matches(&child_ref)) {
                    continue;
                }
                push_text(child_ref, excluded, out);
                if BLOCK_TAGS.contains(&el.name()) {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(collapse_whitespace)
}

fn title_from_url(page_url: &str) -> String {
    let Ok(parsed) = Url::parse(page_url) else {
        return page_url.to_string();
    };
    parsed
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.replace(['-', '_'], " "))
        .or_else(|| parsed.host_str().map(str::to_string))
        .unwrap_or_else(|| page_url.to_string())
}

fn extract_title(document: &Html, page_url: &str) -> String {
    let candidates = [
        first_text(document, "h1"),
        first_text(document, "title"),
        first_attr(document, "meta[property='og:title']", "content"),
        first_attr(document, "meta[name='title']", "content"),
        first_attr(document, "meta[name='twitter:title']", "content"),
    ];

    candidates
        .into_iter()
        .flatten()
        .find(|t| t.chars().count() > 3)
        .unwrap_or_else(|| title_from_url(page_url))
}

/// Pick the most substantial main-content region and flatten it.
fn extract_body(document: &Html, content_selectors: &[String], excluded: &[Selector]) -> String {
    for selector in parse_selectors(content_selectors) {
        let best = document
            .select(&selector)
            .map(|el| clean_text(&element_text(el, excluded)))
            .max_by_key(|text| text.chars().count());

        if let Some(text) = best {
            if text.chars().count() > MIN_SUBSTANCE_CHARS {
                return text;
            }
        }
    }

    clean_text(&element_text(document.root_element(), excluded))
}

/// Extract a title and a cleaned plain-text body from a page.
///
/// Non-content elements matched by `exclude_selectors` are skipped before
/// text is collected. `content_selectors` are tried in order and, for each,
/// the match with the most text wins; the first selector that clears
/// [`MIN_SUBSTANCE_CHARS`] is used, otherwise the whole document is.
pub fn extract_content(
    page_html: &str,
    page_url: &str,
    content_selectors: &[String],
    exclude_selectors: &[String],
) -> ExtractedContent {
    let document = Html::parse_document(page_html);
    let excluded = parse_selectors(exclude_selectors);

    ExtractedContent {
        title: extract_title(&document, page_url),
        body: extract_body(&document, content_selectors, &excluded),
    }
}
