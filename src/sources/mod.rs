//! Retailer adapters
//!
//! Each adapter walks its own ordered chain of tiers (structured data, CSS
//! selectors, degraded link scraping). The first tier producing at least one
//! record wins. Failures stay inside the adapter: `search` always returns a
//! list, possibly empty.

mod amazon;
mod pharmeasy;
mod tata1mg;

pub use amazon::Amazon;
pub use pharmeasy::PharmEasy;
pub use tata1mg::Tata1mg;

use std::time::Duration;

use scraper::Html;

use crate::config::SearchConfig;
use crate::error::SourceError;
use crate::extractors::DocumentShape;
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{ProductRecord, QueryContext, Source};

pub trait SourceAdapter: Send + Sync {
    fn source(&self) -> Source;

    /// Run the tier chain. Never panics on bad input and never errors.
    fn search(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> Vec<ProductRecord>;
}

/// Limits shared by all adapters
#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub list_timeout: Duration,
    pub enrich_timeout: Duration,
    pub max_results: usize,
    pub enrich_limit: usize,
    pub enrich_delay: Duration,
}

impl From<&SearchConfig> for AdapterSettings {
    fn from(config: &SearchConfig) -> Self {
        Self {
            list_timeout: config.list_timeout(),
            enrich_timeout: config.enrich_timeout(),
            max_results: config.max_results,
            enrich_limit: config.enrich_limit,
            enrich_delay: config.enrich_delay(),
        }
    }
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

/// The adapters in their fixed search order
pub fn default_adapters(config: &SearchConfig) -> Vec<Box<dyn SourceAdapter>> {
    let settings = AdapterSettings::from(config);
    vec![
        Box::new(PharmEasy::new(settings.clone())),
        Box::new(Tata1mg::new(settings.clone())),
        Box::new(Amazon::new(settings)),
    ]
}

pub(crate) type TierResult = Result<Vec<ProductRecord>, SourceError>;

/// One fallback strategy within an adapter
pub(crate) struct Tier<'a> {
    name: &'static str,
    run: Box<dyn FnOnce() -> TierResult + 'a>,
}

impl<'a> Tier<'a> {
    pub(crate) fn new(name: &'static str, run: impl FnOnce() -> TierResult + 'a) -> Self {
        Self {
            name,
            run: Box::new(run),
        }
    }
}

/// Run tiers in order until one yields records
pub(crate) fn run_tiers<'a>(source: Source, tiers: impl IntoIterator<Item = Tier<'a>>) -> Vec<ProductRecord> {
    for tier in tiers {
        match (tier.run)() {
            Ok(records) if !records.is_empty() => {
                tracing::debug!(source = %source, tier = tier.name, count = records.len(), "tier produced results");
                return records;
            }
            Ok(_) => {
                tracing::debug!(source = %source, tier = tier.name, "tier empty, falling back");
            }
            Err(e) => {
                tracing::warn!(source = %source, tier = tier.name, "tier failed: {}", e);
            }
        }
    }
    tracing::info!(source = %source, "all tiers exhausted");
    Vec::new()
}

/// GET a page, treating non-2xx as an error
pub(crate) fn fetch_page(fetcher: &dyn Fetcher, request: &FetchRequest) -> Result<String, SourceError> {
    let response = fetcher.fetch(request)?;
    if !response.is_success() {
        return Err(SourceError::Status(response.status));
    }
    Ok(response.body)
}

/// Which URL template produced a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PageOrigin {
    Primary,
    Alternate,
}

/// GET `primary`; on failure retry exactly once with `alternate`
pub(crate) fn fetch_with_fallback(
    source: Source,
    fetcher: &dyn Fetcher,
    primary: &FetchRequest,
    alternate: &FetchRequest,
) -> Result<(String, PageOrigin), SourceError> {
    match fetch_page(fetcher, primary) {
        Ok(body) => Ok((body, PageOrigin::Primary)),
        Err(e) => {
            tracing::warn!(source = %source, url = %primary.url, "primary request failed ({}), trying alternate", e);
            fetch_page(fetcher, alternate).map(|body| (body, PageOrigin::Alternate))
        }
    }
}

/// The parsed page behind a shape, or a shape error for JSON/unrecognized bodies
pub(crate) fn require_document(shape: &DocumentShape) -> Result<&Html, SourceError> {
    shape
        .document()
        .ok_or_else(|| SourceError::Shape(format!("expected HTML, got {}", shape.kind())))
}

/// Browser-like headers for HTML pages
pub(crate) fn html_request(url: String, user_agent: String, timeout: Duration) -> FetchRequest {
    FetchRequest::get(url, timeout)
        .header("User-Agent", user_agent)
        .header("Accept", "text/html")
        .header("Accept-Language", "en-US,en;q=0.9")
        .header("Cache-Control", "no-cache")
        .header("Pragma", "no-cache")
}

/// Resolve `href` against the retailer origin; unusable links become `"#"`
pub(crate) fn absolutize(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.is_empty() || href == "#" || href.starts_with("javascript:") {
        return "#".to_string();
    }
    url::Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| "#".to_string())
}
