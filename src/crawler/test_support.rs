//! In-memory website for crawler tests

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::crawler::{FetchError, FetchedPage, PageFetcher};

/// In-memory site; unknown URLs answer 404.
#[derive(Default)]
pub(crate) struct StaticSite {
    pages: HashMap<String, String>,
    broken: HashSet<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StaticSite {
    pub(crate) fn page(mut self, url: &str, html: String) -> Self {
        self.pages.insert(url.to_string(), html);
        self
    }

    /// Requests to `url` time out
    pub(crate) fn broken(mut self, url: &str) -> Self {
        self.broken.insert(url.to_string());
        self
    }

    /// Every fetch takes `delay`
    pub(crate) fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requested(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    /// Highest number of fetches that were running at the same time
    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticSite {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.broken.contains(url) {
            return Err(FetchError::Timeout {
                url: url.to_string(),
            });
        }
        match self.pages.get(url) {
            Some(html) => Ok(FetchedPage {
                url: url.to_string(),
                status: 200,
                content_type: Some("text/html".to_string()),
                html: html.clone(),
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// A page with a long body and the given outgoing links.
pub(crate) fn html_page(title: &str, links: &[&str]) -> String {
    let body = format!(
        "{title} reúne la información institucional del colegio sobre horarios, \
         propuestas pedagógicas, actividades extracurriculares y requisitos de ingreso. "
    )
    .repeat(3);
    let anchors: String = links
        .iter()
        .map(|l| format!(r#"<a href="{l}">Ver {l}</a>"#))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body><main><h1>{title}</h1><p>{body}</p></main><div>{anchors}</div></body></html>"
    )
}

/// Seed page linking to three substantial pages
pub(crate) fn small_school_site() -> StaticSite {
    StaticSite::default()
        .page("https://example.edu/", html_page("Inicio", &["/a", "/b", "/c"]))
        .page("https://example.edu/a", html_page("Página A", &[]))
        .page("https://example.edu/b", html_page("Página B", &[]))
        .page("https://example.edu/c", html_page("Página C", &[]))
}
