//! Tata 1mg
//!
//! The search page is requested sorted by popularity, so candidates are ranked
//! on rating signals alone.

use std::collections::HashSet;

use scraper::{ElementRef, Html};
use serde_json::Value;

use super::{
    absolutize, fetch_with_fallback, html_request, require_document, run_tiers, AdapterSettings,
    SourceAdapter, Tier, TierResult,
};
use crate::error::SourceError;
use crate::extractors::{
    detect_shape, extract_field, extract_text, format_amount, json_f64, json_str, navigate_json,
    parse_count, parse_price, parse_rating, select_all, select_first_alternative, DocumentShape,
    EmbeddedProbe, Locator,
};
use crate::fetch::Fetcher;
use crate::model::{
    Candidate, ProductRecord, QueryContext, Source, PRICE_NOT_AVAILABLE, UNKNOWN_TITLE,
};
use crate::ranking::{is_relevant, popularity, rank_top_k, MEDICINE_TERMS};

const BASE_URL: &str = "https://www.1mg.com";
const SCAN_LIMIT: usize = 10;

const PROBES: &[EmbeddedProbe] = &[EmbeddedProbe::ScriptJson {
    script_selector: r#"script[type="application/json"]"#,
    path: &["data", "products"],
}];

const CARD_ALTERNATIVES: &[&str] = &[
    ".style__product-box___3oEU6",
    ".style__horizontal-card___1Zwmt",
    ".style__product-grid___3ZQ7D div[data-auto-id='product-grid-card']",
];
const TITLE: &[Locator] = &[
    Locator::TextOrAttr("[data-auto-id='product-name']", "title"),
    Locator::TextOrAttr(".style__pro-title___3zxNC", "title"),
    Locator::TextOrAttr("a[title]", "title"),
    Locator::TextOrAttr(".style__product-title___1Pst1", "title"),
];
const PRICE: &[Locator] = &[
    Locator::Text(".style__price-tag___B2csA"),
    Locator::Text(".style__discount-price___25Bya"),
];
const RATING: &[Locator] = &[Locator::Text(".style__rating___1T2L8, .style__rating-wrap___2oUm3")];
const RATING_COUNT: &[Locator] = &[Locator::Text(".style__rating-count___2oUm3")];
const PRODUCT_LINKS: &str = "a[href*='/drugs/'], a[href*='/otc/']";

pub struct Tata1mg {
    settings: AdapterSettings,
}

impl Tata1mg {
    pub fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    fn from_script_data(&self, shape: &DocumentShape) -> TierResult {
        let products = shape
            .data()
            .and_then(|data| navigate_json(data, &["data", "products"]))
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Shape(format!("no product data in {} page", shape.kind())))?;

        let candidates = products
            .iter()
            .take(SCAN_LIMIT)
            .filter(|p| p.is_object())
            .map(json_candidate)
            .collect();

        Ok(rank_top_k(candidates, self.settings.max_results))
    }

    fn from_cards(&self, document: &Html) -> Vec<ProductRecord> {
        let candidates = select_first_alternative(document, CARD_ALTERNATIVES)
            .into_iter()
            .take(SCAN_LIMIT)
            .map(card_candidate)
            .collect();

        rank_top_k(candidates, self.settings.max_results)
    }

    /// Product-page anchors whose text looks like the query, document order
    fn from_product_links(&self, document: &Html, ctx: &QueryContext) -> Vec<ProductRecord> {
        let mut seen = HashSet::new();
        select_all(document.root_element(), PRODUCT_LINKS)
            .into_iter()
            .filter_map(|anchor| {
                let title = extract_text(anchor, &[Locator::OwnText, Locator::OwnAttr("title")])?;
                if !is_relevant(&title, &ctx.raw_query, MEDICINE_TERMS) {
                    return None;
                }
                let link = absolutize(BASE_URL, anchor.value().attr("href")?);
                Some((title, link))
            })
            .filter(|(_, link)| seen.insert(link.clone()))
            .take(self.settings.max_results)
            .map(|(title, link)| ProductRecord::new(Source::Tata1mg, title, link, PRICE_NOT_AVAILABLE, 0.0))
            .collect()
    }
}

impl SourceAdapter for Tata1mg {
    fn source(&self) -> Source {
        Source::Tata1mg
    }

    fn search(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> Vec<ProductRecord> {
        let user_agent = ctx.user_agent();
        let timeout = self.settings.list_timeout;
        let primary = html_request(
            format!("{BASE_URL}/search/all?name={}&sort=popularity", ctx.encoded_query),
            user_agent.clone(),
            timeout,
        );
        let alternate = html_request(
            format!("{BASE_URL}/search/all?name={}", ctx.encoded_query),
            user_agent,
            timeout,
        );

        let body = match fetch_with_fallback(Source::Tata1mg, fetcher, &primary, &alternate) {
            Ok((body, _)) => body,
            Err(e) => {
                tracing::error!(source = "Tata 1mg", "search page unavailable: {}", e);
                return Vec::new();
            }
        };

        let shape = detect_shape(&body, PROBES);
        tracing::debug!(source = "Tata 1mg", shape = shape.kind(), "search page classified");

        let mut records = run_tiers(
            Source::Tata1mg,
            [
                Tier::new("structured", || self.from_script_data(&shape)),
                Tier::new("selector", || Ok(self.from_cards(require_document(&shape)?))),
                Tier::new("degraded", || {
                    Ok(self.from_product_links(require_document(&shape)?, ctx))
                }),
            ],
        );

        records.truncate(self.settings.max_results);
        records
    }
}

fn json_candidate(product: &Value) -> Candidate {
    let title = json_str(product, &["name"]).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let slug = json_str(product, &["slug"]).unwrap_or_default();
    let mrp = json_f64(product, &["mrp"]);
    let price = json_f64(product, &["price"]).or(mrp);
    let discount = json_f64(product, &["discountPercent"]).unwrap_or(0.0);
    let rating = json_f64(product, &["rating"]).unwrap_or(0.0);
    let rating_count = json_f64(product, &["ratingCount"]).unwrap_or(0.0).max(0.0) as u64;

    let display = match (price, mrp) {
        (Some(price), Some(mrp)) if discount > 0.0 => format!(
            "₹{} (MRP: ₹{}, {}% off)",
            format_amount(price),
            format_amount(mrp),
            format_amount(discount)
        ),
        (Some(price), _) => format!("₹{}", format_amount(price)),
        (None, _) => PRICE_NOT_AVAILABLE.to_string(),
    };

    let link = format!("{BASE_URL}/{}", slug.trim_start_matches('/'));
    let record = ProductRecord::new(Source::Tata1mg, title, link, display, price.unwrap_or(0.0));
    Candidate::new(record)
        .with_rating(rating, rating_count)
        .with_scores(0.0, popularity(rating, rating_count))
}

fn card_candidate(card: ElementRef<'_>) -> Candidate {
    let title = extract_text(card, TITLE).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let link = extract_text(card, &[Locator::Attr("a[href]", "href")])
        .map(|href| absolutize(BASE_URL, &href))
        .unwrap_or_else(|| "#".to_string());
    let price = extract_text(card, PRICE).unwrap_or_else(|| PRICE_NOT_AVAILABLE.to_string());
    let raw_price = parse_price(&price);
    let rating = extract_field(card, RATING, parse_rating).unwrap_or(0.0);
    let rating_count = extract_field(card, RATING_COUNT, parse_count).unwrap_or(0);

    let record = ProductRecord::new(Source::Tata1mg, title, link, price, raw_price);
    Candidate::new(record)
        .with_rating(rating, rating_count)
        .with_scores(0.0, popularity(rating, rating_count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use std::sync::Arc;

    const SEARCH_URL: &str = "https://www.1mg.com/search/all?name=";

    fn ctx(query: &str) -> QueryContext {
        QueryContext::new(query, Arc::from(vec!["test-agent".to_string()]))
    }

    fn adapter() -> Tata1mg {
        Tata1mg::new(AdapterSettings::default())
    }

    #[test]
    fn test_script_json_tier() {
        let page = r#"
        <html><head>
        <script type="application/json">{"config": {"x": 1}}</script>
        <script type="application/json">{"data": {"products": [
            {"name": "Dolo 650", "slug": "drugs/dolo-650-74467", "mrp": 33.6, "price": 30.24, "discountPercent": 10, "rating": 4.4, "ratingCount": 1500},
            {"name": "Dolo 500", "slug": "drugs/dolo-500", "price": 20, "rating": 3.0, "ratingCount": 2},
            {"name": "Dolo Drops", "slug": "drugs/dolo-drops", "mrp": 45, "rating": 5.0, "ratingCount": 0}
        ]}}</script>
        </head><body></body></html>
        "#;
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 200, page);

        let results = adapter().search(&ctx("dolo"), &fetcher);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Dolo 650", "Dolo 500", "Dolo Drops"]);

        assert_eq!(results[0].price, "₹30.24 (MRP: ₹33.6, 10% off)");
        assert_eq!(results[0].raw_price, 30.24);
        assert_eq!(results[0].link, "https://www.1mg.com/drugs/dolo-650-74467");
        assert_eq!(results[1].price, "₹20");
        // price falls back to MRP
        assert_eq!(results[2].price, "₹45");
        assert!(results.iter().all(|r| r.source == Source::Tata1mg));
    }

    #[test]
    fn test_card_alternatives_rank_by_popularity() {
        let page = r#"
        <html><body>
          <div class="style__horizontal-card___1Zwmt">
            <a href="/otc/crocin-pain-relief" title="Crocin Pain Relief"></a>
            <div class="style__price-tag___B2csA">₹45</div>
            <span class="style__rating___1T2L8">3.9</span>
            <span class="style__rating-count___2oUm3">12 ratings</span>
          </div>
          <div class="style__horizontal-card___1Zwmt">
            <span data-auto-id="product-name">Crocin Advance</span>
            <a href="/drugs/crocin-advance">open</a>
            <div class="style__discount-price___25Bya">₹1,020.50</div>
            <span class="style__rating___1T2L8">4.5</span>
            <span class="style__rating-count___2oUm3">(2,000)</span>
          </div>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 200, page);

        let results = adapter().search(&ctx("crocin"), &fetcher);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Crocin Advance");
        assert_eq!(results[0].link, "https://www.1mg.com/drugs/crocin-advance");
        assert_eq!(results[0].raw_price, 1020.5);
        assert_eq!(results[1].title, "Crocin Pain Relief");
        assert_eq!(results[1].price, "₹45");
    }

    #[test]
    fn test_degraded_links_after_status_fallback() {
        let page = r#"
        <html><body>
          <a href="/drugs/saridon-tablet-1">Saridon Tablet</a>
          <a href="/drugs/saridon-tablet-1">Saridon Tablet</a>
          <a href="/otc/hand-wash">Hand wash</a>
          <a href="/labs/saridon">Saridon lab test</a>
          <a href="/otc/saridon-advance">Saridon Advance</a>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new()
            .respond("https://www.1mg.com/search/all?name=saridon&sort", 502, "")
            .respond(SEARCH_URL, 200, page);

        let results = adapter().search(&ctx("saridon"), &fetcher);
        let links: Vec<&str> = results.iter().map(|r| r.link.as_str()).collect();
        assert_eq!(
            links,
            vec![
                "https://www.1mg.com/drugs/saridon-tablet-1",
                "https://www.1mg.com/otc/saridon-advance"
            ]
        );
        assert!(results.iter().all(|r| r.price == PRICE_NOT_AVAILABLE && r.raw_price == 0.0));
        assert_eq!(fetcher.requested_urls().len(), 2);
    }

    #[test]
    fn test_unreachable_site_is_empty() {
        let fetcher = ScriptedFetcher::new().respond(SEARCH_URL, 500, "");
        assert!(adapter().search(&ctx("saridon"), &fetcher).is_empty());
    }
}
