//! Same-domain link discovery

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use crate::crawler::normalize::normalize;

/// Extensions of binary, asset and data documents that carry no page content.
const DENIED_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp", ".css", ".js",
    ".mjs", ".map", ".zip", ".rar", ".gz", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    ".odt", ".mp3", ".mp4", ".wav", ".avi", ".mov", ".webm", ".woff", ".woff2", ".ttf", ".eot",
    ".xml", ".json", ".rss", ".atom", ".csv", ".txt", ".exe", ".dmg",
];

/// Path fragments of admin, auth, feed and API endpoints.
const DENIED_PATHS: &[&str] = &[
    "/wp-admin",
    "/wp-login",
    "/wp-json",
    "/wp-content/uploads",
    "/wp-includes",
    "/xmlrpc.php",
    "/admin/",
    "/administrator",
    "/login",
    "/logout",
    "/cdn-cgi/",
    "/feed/",
    "/rss/",
    "/api/",
    "/cart",
    "/checkout",
];

fn is_tracking_param(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.starts_with("utm_")
        || matches!(
            name.as_str(),
            "fbclid" | "gclid" | "gbraid" | "wbraid" | "_gl" | "mc_cid" | "mc_eid" | "ref" | "share"
        )
}

/// Whether a resolved URL is a non-content target that must never be queued
pub fn is_denied(url: &Url) -> bool {
    if url.scheme() != "http" && url.scheme() != "https" {
        return true;
    }

    let path = url.path().to_ascii_lowercase();
    if DENIED_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
        return true;
    }
    if DENIED_PATHS.iter().any(|p| path.contains(p)) {
        return true;
    }
    if path.ends_with("/feed") || path.ends_with("/rss") {
        return true;
    }

    // Tracking-only queries point at a page already reachable without them
    let mut pairs = url.query_pairs().peekable();
    if pairs.peek().is_some() && url.query_pairs().all(|(k, _)| is_tracking_param(&k)) {
        return true;
    }

    false
}

fn anchor_selector() -> &'static Option<Selector> {
    static SELECTOR: OnceLock<Option<Selector>> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("a[href]").ok())
}

/// Link shapes outside plain anchors: `data-href`/`data-url` attributes and
/// inline `location.href = '...'` navigation handlers.
fn pattern_link_regex() -> &'static Option<Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?:data-href|data-url|location\.href|window\.location)\s*=\s*["']([^"'\s]+)["']"#)
            .ok()
    })
}

fn matches_keywords(text: &str, keywords: &[String]) -> bool {
    let text = text.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(&k.to_lowercase()))
}

/// Discover same-domain candidate URLs on a fetched page.
///
/// Every href is resolved against `page_url`, normalized, and accepted only if
/// its host equals `domain`, it is in neither `visited` nor `failed`, and it is
/// not denied by [`is_denied`]. Links whose text or href matches one of
/// `keywords` come first; the result holds each canonical URL once, in
/// discovery order.
pub fn extract_links(
    page_html: &str,
    page_url: &str,
    domain: &str,
    visited: &HashSet<String>,
    failed: &HashSet<String>,
    keywords: &[String],
) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };

    let mut candidates: Vec<(String, bool)> = Vec::new();

    let document = Html::parse_document(page_html);
    if let Some(selector) = anchor_selector() {
        for anchor in document.select(selector) {
            if let Some(href) = anchor.value().attr("href") {
                let text = anchor.text().collect::<String>();
                let relevant = matches_keywords(href, keywords) || matches_keywords(&text, keywords);
                candidates.push((href.to_string(), relevant));
            }
        }
    }

    // Heuristic shapes are only kept when they look relevant
    if let Some(regex) = pattern_link_regex() {
        for capture in regex.captures_iter(page_html) {
            if let Some(href) = capture.get(1) {
                if matches_keywords(href.as_str(), keywords) {
                    candidates.push((href.as_str().to_string(), true));
                }
            }
        }
    }

    let mut seen = HashSet::new();
    let mut relevant = Vec::new();
    let mut rest = Vec::new();

    for (href, is_relevant) in candidates {
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base.join(href) else {
            continue;
        };
        if !resolved
            .host_str()
            .is_some_and(|host| host.eq_ignore_ascii_case(domain))
        {
            continue;
        }
        if is_denied(&resolved) {
            continue;
        }

        let canonical = normalize(resolved.as_str());
        if canonical == normalize(page_url)
            || visited.contains(&canonical)
            || failed.contains(&canonical)
        {
            continue;
        }
        if !seen.insert(canonical.clone()) {
            // A later keyword match promotes an already-seen plain link
            if is_relevant {
                if let Some(pos) = rest.iter().position(|u| u == &canonical) {
                    let url = rest.remove(pos);
                    relevant.push(url);
                }
            }
            continue;
        }

        if is_relevant {
            relevant.push(canonical);
        } else {
            rest.push(canonical);
        }
    }

    relevant.extend(rest);
    relevant
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::CrawlerConfig;

    fn keywords() -> Vec<String> {
        CrawlerConfig::default().relevance_keywords
    }

    fn links(html: &str) -> Vec<String> {
        extract_links(
            html,
            "https://example.edu/",
            "example.edu",
            &HashSet::new(),
            &HashSet::new(),
            &keywords(),
        )
    }

    #[test]
    fn test_resolves_relative_links_on_same_host() {
        let html = r#"<a href="/historia">Historia</a>
            <a href="galeria">Galería</a>
            <a href="https://other.org/x">Otro</a>"#;
        let found = links(html);
        assert_eq!(
            found,
            vec![
                "https://example.edu/historia".to_string(),
                "https://example.edu/galeria".to_string()
            ]
        );
    }

    #[test]
    fn test_fragment_variants_collapse() {
        let html = r#"<a href="/a#x">A</a><a href="/a#y">A again</a><a href="/a/">A slash</a>"#;
        assert_eq!(links(html), vec!["https://example.edu/a".to_string()]);
    }

    #[test]
    fn test_denylist() {
        let html = r#"<a href="/reglamento.pdf">PDF</a>
            <a href="/wp-admin/options.php">Admin</a>
            <a href="/estilos/main.css">CSS</a>
            <a href="/feed">Feed</a>
            <a href="/noticias?utm_source=fb">Tracked</a>
            <a href="mailto:info@example.edu">Mail</a>
            <a href="/noticias?page=2">Page 2</a>"#;
        assert_eq!(links(html), vec!["https://example.edu/noticias?page=2".to_string()]);
    }

    #[test]
    fn test_excludes_visited_and_failed() {
        let mut visited = HashSet::new();
        visited.insert("https://example.edu/visto".to_string());
        let mut failed = HashSet::new();
        failed.insert("https://example.edu/roto".to_string());

        let html = r#"<a href="/visto">V</a><a href="/roto">R</a><a href="/nuevo">N</a>"#;
        let found = extract_links(
            html,
            "https://example.edu/",
            "example.edu",
            &visited,
            &failed,
            &keywords(),
        );
        assert_eq!(found, vec!["https://example.edu/nuevo".to_string()]);
    }

    #[test]
    fn test_keyword_links_come_first() {
        let html = r#"<a href="/galeria">Fotos</a>
            <a href="/noticias">Noticias</a>
            <a href="/niveles/secundaria">Secundaria</a>
            <div data-href="/inscripciones-2025"></div>"#;
        let found = links(html);
        assert_eq!(found[0], "https://example.edu/niveles/secundaria");
        assert_eq!(found[1], "https://example.edu/inscripciones-2025");
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_self_link_is_skipped() {
        let html = r##"<a href="/">Inicio</a><a href="#contenido">Saltar</a>"##;
        assert!(links(html).is_empty());
    }
}
