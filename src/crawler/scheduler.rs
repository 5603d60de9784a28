//! Breadth-first crawl driver

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::crawler::config::CrawlerConfig;
use crate::crawler::content_extraction::extract_content;
use crate::crawler::error::{CrawlError, FetchError};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher};
use crate::crawler::links::extract_links;
use crate::crawler::normalize::normalize;
use crate::crawler::PageRecord;

/// Per-run bookkeeping, discarded when the run ends.
///
/// A URL is in at most one of `queued`, `visited` and `failed`.
#[derive(Debug, Default)]
pub struct CrawlState {
    /// URLs fetched successfully this run
    pub visited: HashSet<String>,

    /// URLs whose fetch failed this run
    pub failed: HashSet<String>,

    /// URLs waiting in the frontier
    queued: HashSet<String>,

    /// Frontier levels; index is the depth
    frontier: Vec<VecDeque<String>>,
}

impl CrawlState {
    fn new(seed: String) -> Self {
        let mut state = Self::default();
        state.enqueue(0, seed);
        state
    }

    fn is_known(&self, url: &str) -> bool {
        self.queued.contains(url) || self.visited.contains(url) || self.failed.contains(url)
    }

    fn enqueue(&mut self, depth: usize, url: String) -> bool {
        if self.is_known(&url) {
            return false;
        }
        while self.frontier.len() <= depth {
            self.frontier.push(VecDeque::new());
        }
        self.queued.insert(url.clone());
        self.frontier[depth].push_back(url);
        true
    }

    fn level_len(&self, depth: usize) -> usize {
        self.frontier.get(depth).map_or(0, VecDeque::len)
    }

    fn pop(&mut self, depth: usize) -> Option<String> {
        let url = self.frontier.get_mut(depth)?.pop_front()?;
        self.queued.remove(&url);
        Some(url)
    }
}

/// Result of processing one frontier URL
#[derive(Debug)]
pub enum PageOutcome {
    /// Content was extracted; `html` is kept for link discovery
    Extracted { page: PageRecord, html: String },

    /// Fetched, but no usable content; links may still be followed
    Empty { html: String },

    /// The fetch failed
    Failed(FetchError),
}

/// Summary of a finished crawl
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Pages in the order they were successfully fetched
    pub pages: Vec<PageRecord>,

    /// Number of URLs fetched
    pub visited: usize,

    /// Fetch failures, one per URL
    pub failures: Vec<FetchError>,
}

/// Breadth-first crawler bounded by depth, page and fan-out budgets
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    config: CrawlerConfig,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Crawler {
    /// Create a crawler that fetches over HTTP
    pub fn new(config: CrawlerConfig) -> Result<Self, CrawlError> {
        let fetcher = HttpFetcher::new(&config)?;
        Ok(Self::with_fetcher(Arc::new(fetcher), config))
    }

    /// Create a crawler over any page source
    pub fn with_fetcher(fetcher: Arc<dyn PageFetcher>, config: CrawlerConfig) -> Self {
        // One fetch per configured period; a zero delay disables throttling
        let limiter = Quota::with_period(config.rate_limit()).map(RateLimiter::direct);
        Self {
            fetcher,
            config,
            limiter,
        }
    }

    /// Get the crawler configuration
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    async fn process(&self, url: &str) -> PageOutcome {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let fetched = match self.fetcher.fetch(url).await {
            Ok(fetched) => fetched,
            Err(e) => return PageOutcome::Failed(e),
        };

        let content = extract_content(
            &fetched.html,
            url,
            &self.config.content_selectors,
            &self.config.exclude_selectors,
        );

        if content.body.chars().count() < self.config.min_content_chars {
            debug!(url = %url, chars = content.body.len(), "Skipping page without substantial content");
            return PageOutcome::Empty { html: fetched.html };
        }

        PageOutcome::Extracted {
            page: PageRecord::new(url, content.title, content.body),
            html: fetched.html,
        }
    }

    fn enqueue_links(&self, state: &mut CrawlState, html: &str, url: &str, domain: &str, next: usize) {
        let links = extract_links(
            html,
            url,
            domain,
            &state.visited,
            &state.failed,
            &self.config.relevance_keywords,
        );

        let mut added = 0;
        for link in links {
            if added >= self.config.max_links_per_page
                || state.level_len(next) >= self.config.max_frontier_per_level
            {
                break;
            }
            if state.enqueue(next, link) {
                added += 1;
            }
        }
        debug!(url = %url, added, depth = next, "Enqueued links");
    }

    /// Crawl from `seed`, visiting depth levels `0..max_depth` and collecting
    /// at most `max_pages` pages.
    ///
    /// Levels are processed strictly in order; a URL first seen at a deeper
    /// level is never moved to a shallower one. Per-URL failures are recorded
    /// in the report and never abort the run.
    #[instrument(skip(self))]
    pub async fn crawl(
        &self,
        seed: &str,
        max_pages: u32,
        max_depth: u32,
    ) -> Result<CrawlReport, CrawlError> {
        let seed = normalize(seed);
        let parsed = Url::parse(&seed)?;
        let domain = parsed
            .host_str()
            .ok_or_else(|| CrawlError::InvalidSeed(seed.clone()))?
            .to_string();

        info!("Starting crawl for {} (max_pages={}, max_depth={})", seed, max_pages, max_depth);

        let max_pages = max_pages as usize;
        let max_depth = max_depth as usize;
        let mut state = CrawlState::new(seed);
        let mut report = CrawlReport::default();

        'levels: for depth in 0..max_depth {
            if state.level_len(depth) == 0 {
                break;
            }

            while let Some(url) = state.pop(depth) {
                if report.pages.len() >= max_pages {
                    break 'levels;
                }
                if state.visited.contains(&url) || state.failed.contains(&url) {
                    continue;
                }

                let html = match self.process(&url).await {
                    PageOutcome::Failed(e) => {
                        warn!(url = %url, error = %e, "Fetch failed");
                        state.failed.insert(url);
                        report.failures.push(e);
                        continue;
                    }
                    PageOutcome::Empty { html } => {
                        state.visited.insert(url.clone());
                        html
                    }
                    PageOutcome::Extracted { page, html } => {
                        state.visited.insert(url.clone());
                        info!(url = %url, depth, "Extracted content");
                        report.pages.push(page);
                        html
                    }
                };

                if depth + 1 < max_depth && report.pages.len() < max_pages {
                    self.enqueue_links(&mut state, &html, &url, &domain, depth + 1);
                }
            }
        }

        report.visited = state.visited.len();
        info!(
            "Crawl finished: {} pages from {} visited ({} failed)",
            report.pages.len(),
            report.visited,
            report.failures.len()
        );
        Ok(report)
    }
}

/// Crawl a website with the given configuration
///
/// # Arguments
///
/// * `url` - The seed URL
/// * `config` - The crawler configuration, including its budgets
///
/// # Returns
///
/// The pages that yielded substantial content, in fetch order
pub async fn crawl_website(url: &str, config: CrawlerConfig) -> Result<Vec<PageRecord>, CrawlError> {
    let (max_pages, max_depth) = (config.max_pages, config.max_depth);
    let crawler = Crawler::new(config)?;
    Ok(crawler.crawl(url, max_pages, max_depth).await?.pages)
}
