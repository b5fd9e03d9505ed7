//! Amazon India
//!
//! Tiers, in order:
//! 1. `asinMetadataResults` from the search widget's inline script
//! 2. Search-result cards via CSS selectors, scored and ranked
//! 3. Any card-like element with a matching title, document order
//!
//! A non-2xx search page is retried once with the `field-keywords` URL, whose
//! cards are taken as-is.

use scraper::{ElementRef, Html};
use serde_json::Value;

use super::{
    absolutize, fetch_with_fallback, html_request, require_document, run_tiers, AdapterSettings,
    PageOrigin, SourceAdapter, Tier, TierResult,
};
use crate::error::SourceError;
use crate::extractors::{
    detect_shape, extract_field, extract_text, has_match, json_f64, json_str, json_u64,
    navigate_json, parse_count, parse_price, parse_rating, select_all, DocumentShape,
    EmbeddedProbe, Locator,
};
use crate::fetch::Fetcher;
use crate::model::{
    Candidate, ProductRecord, QueryContext, Source, PRICE_NOT_AVAILABLE, UNKNOWN_TITLE,
};
use crate::ranking::{is_relevant, popularity, rank_top_k, relevance_score, MEDICINE_TERMS};

const BASE_URL: &str = "https://www.amazon.in";

const PROBES: &[EmbeddedProbe] = &[EmbeddedProbe::ScriptAssignment {
    script_selector: r#"script[type="text/javascript"]"#,
    tokens: &["asin", "search-result"],
    var: "data",
    path: &["asinMetadataResults"],
}];

const CARDS: &str = "[data-component-type='s-search-result'], .s-result-item";
/// Wider net for the degraded tier
const LOOSE_CARDS: &str = "[data-component-type='s-search-result'], .s-result-item, div[data-asin], div[class*='s-card']";
const CARD_SCAN_LIMIT: usize = 10;

const TITLE: &[Locator] = &[Locator::Text("h2 a span"), Locator::Text(".a-text-normal")];
const LOOSE_TITLE: &[Locator] = &[
    Locator::Text("h2 a span"),
    Locator::Text(".a-text-normal"),
    Locator::Text("h2"),
    Locator::TextOrAttr("a[title]", "title"),
];
const LINK: &[Locator] = &[
    Locator::Attr("h2 a", "href"),
    Locator::Attr(".a-link-normal", "href"),
    Locator::Attr("a[href]", "href"),
];
const PRICE: &[Locator] = &[Locator::Text(".a-price .a-offscreen"), Locator::Text(".a-price")];
const RATING: &[Locator] = &[
    Locator::Text("i.a-icon-star-small, i.a-icon-star"),
    Locator::Text("span.a-icon-alt"),
];
const REVIEWS: &[Locator] = &[
    Locator::Text(".a-size-base.s-underline-text"),
    Locator::Text("a[href*='customerReviews'] span"),
];
const SPONSORED: &str = ".s-sponsored-label, .puis-sponsored-label-text";
const PRIME: &str = ".s-prime, i.a-icon-prime";

/// Degraded-tier vocabulary
const BASIC_TERMS: &[&str] = &["medicine", "tablet", "capsule", "syrup", "health"];

pub struct Amazon {
    settings: AdapterSettings,
}

impl Amazon {
    pub fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    fn from_metadata(&self, shape: &DocumentShape, ctx: &QueryContext) -> TierResult {
        let Some(data) = shape.data() else {
            return Err(SourceError::Shape(format!("no search metadata in {} page", shape.kind())));
        };
        let metadata = navigate_json(data, &["asinMetadataResults"])
            .and_then(Value::as_object)
            .ok_or_else(|| SourceError::Shape("asinMetadataResults is not an object".into()))?;

        let candidates = metadata
            .iter()
            .filter(|(_, product)| !is_sponsored_json(product))
            .map(|(asin, product)| metadata_candidate(asin, product, &ctx.raw_query))
            .collect();

        Ok(rank_top_k(candidates, self.settings.max_results))
    }

    fn from_cards(&self, document: &Html, ctx: &QueryContext) -> Vec<ProductRecord> {
        let candidates = select_all(document.root_element(), CARDS)
            .into_iter()
            .take(CARD_SCAN_LIMIT)
            .filter(|card| !has_match(*card, SPONSORED))
            .filter_map(|card| card_candidate(card, &ctx.raw_query))
            .collect();

        rank_top_k(candidates, self.settings.max_results)
    }

    fn from_loose_cards(&self, document: &Html, ctx: &QueryContext) -> Vec<ProductRecord> {
        select_all(document.root_element(), LOOSE_CARDS)
            .into_iter()
            .filter_map(|card| {
                let title = extract_text(card, LOOSE_TITLE)?;
                if !is_relevant(&title, &ctx.raw_query, BASIC_TERMS) {
                    return None;
                }
                Some(basic_record(card, title))
            })
            .take(self.settings.max_results)
            .collect()
    }

    /// Titled cards from the alternate URL, without a relevance filter.
    /// Untitled cards are skipped before the limit applies, so up to
    /// `max_results` titled cards are kept.
    fn from_fallback_page(&self, document: &Html) -> Vec<ProductRecord> {
        select_all(document.root_element(), CARDS)
            .into_iter()
            .filter_map(|card| extract_text(card, TITLE).map(|title| basic_record(card, title)))
            .take(self.settings.max_results)
            .collect()
    }
}

impl SourceAdapter for Amazon {
    fn source(&self) -> Source {
        Source::Amazon
    }

    fn search(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> Vec<ProductRecord> {
        let user_agent = ctx.user_agent();
        let timeout = self.settings.list_timeout;
        let primary = html_request(
            format!("{BASE_URL}/s?k={}+medicine&s=relevanceblender", ctx.encoded_query),
            user_agent.clone(),
            timeout,
        );
        let alternate = html_request(
            format!("{BASE_URL}/s?field-keywords={}+medicine", ctx.encoded_query),
            user_agent,
            timeout,
        );

        let (body, origin) = match fetch_with_fallback(Source::Amazon, fetcher, &primary, &alternate) {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(source = "Amazon", "search page unavailable: {}", e);
                return Vec::new();
            }
        };

        let shape = detect_shape(&body, PROBES);
        tracing::debug!(source = "Amazon", shape = shape.kind(), ?origin, "search page classified");
        let document = || require_document(&shape);

        let mut records = match origin {
            PageOrigin::Primary => run_tiers(
                Source::Amazon,
                [
                    Tier::new("structured", || self.from_metadata(&shape, ctx)),
                    Tier::new("selector", || Ok(self.from_cards(document()?, ctx))),
                    Tier::new("degraded", || Ok(self.from_loose_cards(document()?, ctx))),
                ],
            ),
            PageOrigin::Alternate => run_tiers(
                Source::Amazon,
                [
                    Tier::new("status-fallback", || Ok(self.from_fallback_page(document()?))),
                    Tier::new("degraded", || Ok(self.from_loose_cards(document()?, ctx))),
                ],
            ),
        };

        records.truncate(self.settings.max_results);
        records
    }
}

fn is_sponsored_json(product: &Value) -> bool {
    ["sponsored", "isSponsored", "isAd"]
        .iter()
        .any(|key| product.get(key).and_then(Value::as_bool).unwrap_or(false))
}

fn metadata_candidate(asin: &str, product: &Value, query: &str) -> Candidate {
    let title = json_str(product, &["title"]).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let price = navigate_json(product, &["price", "displayString"])
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(PRICE_NOT_AVAILABLE)
        .to_string();
    let raw_price = parse_price(&price);
    let rating = json_f64(product, &["averageStarRating"]).unwrap_or(0.0);
    let reviews = json_u64(product, &["reviewCount"]).unwrap_or(0);

    let relevance = relevance_score(&title, query, false);
    let record = ProductRecord::new(Source::Amazon, title, format!("{BASE_URL}/dp/{asin}"), price, raw_price);
    Candidate::new(record)
        .with_rating(rating, reviews)
        .with_scores(relevance, popularity(rating, reviews))
}

fn card_candidate(card: ElementRef<'_>, query: &str) -> Option<Candidate> {
    let title = extract_text(card, TITLE).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    if !is_relevant(&title, query, MEDICINE_TERMS) {
        return None;
    }

    let link = card_link(card);
    let price = extract_text(card, PRICE).unwrap_or_else(|| PRICE_NOT_AVAILABLE.to_string());
    let raw_price = parse_price(&price);
    let rating = extract_field(card, RATING, parse_rating).unwrap_or(0.0);
    let reviews = extract_field(card, REVIEWS, parse_count).unwrap_or(0);
    let relevance = relevance_score(&title, query, has_match(card, PRIME));

    let record = ProductRecord::new(Source::Amazon, title, link, price, raw_price);
    Some(
        Candidate::new(record)
            .with_rating(rating, reviews)
            .with_scores(relevance, popularity(rating, reviews)),
    )
}

/// Title, link and display price; the price is not parsed
fn basic_record(card: ElementRef<'_>, title: String) -> ProductRecord {
    let price = extract_text(card, PRICE).unwrap_or_else(|| PRICE_NOT_AVAILABLE.to_string());
    ProductRecord::new(Source::Amazon, title, card_link(card), price, 0.0)
}

fn card_link(card: ElementRef<'_>) -> String {
    extract_text(card, LINK)
        .map(|href| absolutize(BASE_URL, &href))
        .unwrap_or_else(|| "#".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use std::sync::Arc;

    const SEARCH_URL: &str = "https://www.amazon.in/s?k=";
    const FALLBACK_URL: &str = "https://www.amazon.in/s?field-keywords=";

    fn ctx(query: &str) -> QueryContext {
        QueryContext::new(query, Arc::from(vec!["test-agent".to_string()]))
    }

    fn adapter() -> Amazon {
        Amazon::new(AdapterSettings::default())
    }

    fn metadata_page(items: &[(&str, &str, &str, f64, u64)]) -> String {
        let entries: Vec<String> = items
            .iter()
            .map(|(asin, title, price, rating, reviews)| {
                format!(
                    r#""{asin}": {{"title": "{title}", "price": {{"displayString": "{price}"}}, "averageStarRating": {rating}, "reviewCount": {reviews}}}"#
                )
            })
            .collect();
        format!(
            r#"<html><head><script type="text/javascript">
            // search-result asin metadata
            var data = {{"asinMetadataResults": {{{}}}}};
            </script></head><body></body></html>"#,
            entries.join(", ")
        )
    }

    #[test]
    fn test_structured_tier_ranks_and_truncates() {
        let page = metadata_page(&[
            ("A1", "Paracetamol 500mg Tablet", "₹25", 4.0, 10),
            ("A2", "Phone stand", "₹499", 5.0, 2),
            ("A3", "Paracetamol Syrup", "₹60", 4.5, 100),
            ("A4", "Vitamin C", "₹1,200.50", 3.0, 0),
            ("A5", "Generic Paracetamol", "₹10", 0.0, 0),
            ("A6", "Cold tablet", "Price not available", 4.0, 1),
            ("A7", "Paracetamol IP", "₹15", 2.0, 3),
            ("A8", "Bandage", "₹5", 1.0, 1),
        ]);
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 200, &page);

        let results = adapter().search(&ctx("paracetamol"), &fetcher);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        // A3: 10 + 50 + 450, A1: 20 + 50 + 40, A7: 50 + 6, A5: 50, A6: 10 + 4
        assert_eq!(
            titles,
            vec![
                "Paracetamol Syrup",
                "Paracetamol 500mg Tablet",
                "Paracetamol IP",
                "Generic Paracetamol",
                "Cold tablet"
            ]
        );
        assert!(results.iter().all(|r| r.source == Source::Amazon));
        assert_eq!(results[0].link, "https://www.amazon.in/dp/A3");
        assert_eq!(results[0].raw_price, 60.0);
        assert_eq!(results[4].raw_price, 0.0);
        assert_eq!(results[4].price, "Price not available");
    }

    #[test]
    fn test_selector_tier_skips_sponsored_and_boosts_prime() {
        let page = r#"
        <html><body>
          <div data-component-type="s-search-result">
            <span class="s-sponsored-label">Sponsored</span>
            <h2><a href="/dp/S1"><span>Crocin Advance Tablet</span></a></h2>
            <span class="a-price"><span class="a-offscreen">₹30</span></span>
          </div>
          <div data-component-type="s-search-result">
            <h2><a href="/dp/C1"><span>Crocin Pain Relief</span></a></h2>
            <span class="a-price"><span class="a-offscreen">₹1,050.00</span></span>
            <i class="a-icon-star-small"><span class="a-icon-alt">4.0 out of 5 stars</span></i>
            <span class="a-size-base s-underline-text">1,000</span>
          </div>
          <div data-component-type="s-search-result">
            <h2><a href="/dp/C2"><span>Crocin Cold Syrup</span></a></h2>
            <span class="a-price"><span class="a-offscreen">₹90</span></span>
            <i class="s-prime"></i>
          </div>
          <div data-component-type="s-search-result">
            <h2><a href="/dp/X"><span>Laptop sleeve</span></a></h2>
          </div>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 200, page);

        let results = adapter().search(&ctx("crocin"), &fetcher);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Crocin Pain Relief");
        assert_eq!(results[0].link, "https://www.amazon.in/dp/C1");
        assert_eq!(results[0].raw_price, 1050.0);
        assert_eq!(results[1].title, "Crocin Cold Syrup");
    }

    #[test]
    fn test_degraded_tier_keeps_document_order() {
        let page = r#"
        <html><body>
          <div data-asin="B3"><h2>Paracetamol strip of 15</h2><a href="/dp/B3">view</a></div>
          <div data-asin="B1"><h2>Paracetamol drops</h2><a href="/dp/B1">view</a></div>
          <div data-asin="B9"><h2>USB cable</h2><a href="/dp/B9">view</a></div>
          <div data-asin="B2"><h2>paracetamol infusion</h2><a href="/dp/B2">view</a></div>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 200, page);

        let results = adapter().search(&ctx("paracetamol"), &fetcher);
        let links: Vec<&str> = results.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://www.amazon.in/dp/B3",
                "https://www.amazon.in/dp/B1",
                "https://www.amazon.in/dp/B2"
            ]
        );
        assert!(results.iter().all(|r| r.raw_price == 0.0));
        assert!(results.iter().all(|r| r.price == PRICE_NOT_AVAILABLE));
    }

    #[test]
    fn test_status_fallback_uses_alternate_url() {
        let page = r#"
        <html><body>
          <div class="s-result-item">
            <h2><a href="/dp/F1"><span>Anything at all</span></a></h2>
            <span class="a-price"><span class="a-offscreen">₹12</span></span>
          </div>
          <div class="s-result-item"><p>no title</p></div>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new()
            .respond(SEARCH_URL, 503, "")
            .respond(FALLBACK_URL, 200, page);

        let results = adapter().search(&ctx("dolo"), &fetcher);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title, "Anything at all");
        assert_eq!(results[0].price, "₹12");
        assert_eq!(results[0].raw_price, 0.0);
        assert_eq!(fetcher.requested_urls().len(), 2);
    }

    #[test]
    fn test_status_fallback_limit_counts_titled_cards() {
        let titled: String = (1..=6)
            .map(|i| {
                format!(r#"<div class="s-result-item"><h2><a href="/dp/T{i}"><span>Item {i}</span></a></h2></div>"#)
            })
            .collect();
        let page = format!(
            r#"<html><body>
            <div class="s-result-item"><p>banner</p></div>
            <div class="s-result-item"><p>banner</p></div>
            {titled}
            </body></html>"#
        );
        let fetcher = ScriptedFetcher::new()
            .respond(SEARCH_URL, 500, "")
            .respond(FALLBACK_URL, 200, &page);

        let results = adapter().search(&ctx("dolo"), &fetcher);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Item 1", "Item 2", "Item 3", "Item 4", "Item 5"]);
        assert_eq!(results[4].link, "https://www.amazon.in/dp/T5");
    }

    #[test]
    fn test_total_failure_is_empty() {
        let fetcher = ScriptedFetcher::new();
        assert!(adapter().search(&ctx("dolo"), &fetcher).is_empty());
    }
}
