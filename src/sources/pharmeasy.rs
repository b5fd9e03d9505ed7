//! PharmEasy
//!
//! The JSON search API is tried first. When it fails or returns nothing with a
//! usable price, the HTML search page is fetched once and worked through:
//! `window.__INITIAL_STATE__`, product cards, and finally bare product links
//! enriched by visiting each product page.

use std::cell::OnceCell;
use std::sync::LazyLock;
use std::thread;

use regex::Regex;
use scraper::{ElementRef, Html};
use serde_json::Value;

use super::{
    absolutize, fetch_page, fetch_with_fallback, html_request, require_document, run_tiers,
    AdapterSettings, SourceAdapter, Tier, TierResult,
};
use crate::error::SourceError;
use crate::extractors::{
    detect_shape, extract_field, extract_text, find_text_containing, format_amount, json_f64,
    json_str, navigate_json, parse_count, parse_price, parse_rating, select_all,
    select_first_alternative, DocumentShape, EmbeddedProbe, Locator,
};
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{
    Candidate, ProductRecord, QueryContext, Source, PRICE_NOT_AVAILABLE, UNKNOWN_TITLE,
};
use crate::ranking::{is_relevant, popularity, rank_top_k, relevance_score, MEDICINE_TERMS};

const BASE_URL: &str = "https://pharmeasy.in";
const PRODUCT_PATH: &str = "/online-medicine-order/";
/// Display price when nothing could be recovered
const UNKNOWN_MRP: &str = "MRP₹--*";
const JSON_SCAN_LIMIT: usize = 10;

const PROBES: &[EmbeddedProbe] = &[EmbeddedProbe::Assignment {
    var: "window.__INITIAL_STATE__",
    path: &["search", "products"],
}];

const CARD_ALTERNATIVES: &[&str] = &[
    "[data-test='product-card']",
    ".ProductCard_productCard__OXwT6, .ProductCard_medicineCard__8kZBB, .ProductCard_productCardWrapper__Emr18",
    "div[class*='ProductCard_']",
    "div[class*='card'], div[class*='Card'], div[data-test*='product']",
];

const TITLE: &[Locator] = &[
    Locator::Text("h2, h3, div[class*='name'], div[class*='title'], div[class*='Name'], div[class*='Title']"),
    Locator::Text("h1"),
    Locator::Text("p"),
];
const PRICE_CLASSES: &str = "div[class*='Price'], span[class*='Price'], div[class*='price'], span[class*='price'], \
     div[class*='MRP'], span[class*='MRP'], div[class*='_sale'], span[class*='_sale'], \
     div[class*='final'], span[class*='final']";
const PRICE_ATTR_HOLDERS: &str = "[data-price], [data-mrp], [data-saleprice], [data-value]";
const PRICE_ATTRS: &[&str] = &["data-price", "data-mrp", "data-saleprice", "data-value"];
const RATING: &[Locator] = &[Locator::Text(
    "div[class*='rating'], span[class*='rating'], div[class*='Rating'], span[class*='Rating']",
)];
const REVIEWS: &[Locator] = &[Locator::Text(
    "div[class*='review'], span[class*='review'], div[class*='Review'], span[class*='Review']",
)];

static MRP_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"MRP:?\s*₹?\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static RUPEE_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"₹\s*(\d+(?:\.\d+)?)").expect("valid regex"));
static PERCENT_OFF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%\s*off").expect("valid regex"));

pub struct PharmEasy {
    settings: AdapterSettings,
}

impl PharmEasy {
    pub fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    fn from_api(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> TierResult {
        let request = FetchRequest::get(
            format!("{BASE_URL}/api/search/search?q={}", ctx.encoded_query),
            self.settings.list_timeout,
        )
        .header("User-Agent", ctx.user_agent())
        .header("Accept", "application/json")
        .header("Referer", format!("{BASE_URL}/search/all?name={}", ctx.encoded_query));

        let body = fetch_page(fetcher, &request)?;
        let data: Value = serde_json::from_str(&body)?;
        let records = self.from_product_list(&data, &["data", "products"], ctx)?;

        if records.iter().all(|r| r.price == PRICE_NOT_AVAILABLE) {
            return Ok(Vec::new());
        }
        Ok(records)
    }

    fn from_embedded(&self, shape: &DocumentShape, ctx: &QueryContext) -> TierResult {
        let data = shape
            .data()
            .ok_or_else(|| SourceError::Shape(format!("no initial state in {} page", shape.kind())))?;
        self.from_product_list(data, &["search", "products"], ctx)
    }

    fn from_product_list(&self, data: &Value, path: &[&str], ctx: &QueryContext) -> TierResult {
        let products = navigate_json(data, path)
            .and_then(Value::as_array)
            .ok_or_else(|| SourceError::Shape(format!("{} is not a list", path.join("."))))?;

        let candidates = products
            .iter()
            .take(JSON_SCAN_LIMIT)
            .filter(|p| p.is_object())
            .map(|p| json_candidate(p, &ctx.raw_query))
            .collect();

        Ok(rank_top_k(candidates, self.settings.max_results))
    }

    fn from_cards(&self, document: &Html, ctx: &QueryContext) -> Vec<ProductRecord> {
        let candidates = select_first_alternative(document, CARD_ALTERNATIVES)
            .into_iter()
            .filter_map(|card| card_candidate(card, &ctx.raw_query))
            .collect();

        rank_top_k(candidates, self.settings.max_results)
    }

    /// Relevant product links from the page, each enriched from its own
    /// product page. Only the first `enrich_limit` links are visited.
    fn from_product_links(
        &self,
        document: &Html,
        ctx: &QueryContext,
        fetcher: &dyn Fetcher,
    ) -> Vec<ProductRecord> {
        let links: Vec<(String, String)> = select_all(document.root_element(), "a[href]")
            .into_iter()
            .filter_map(|anchor| {
                let href = anchor.value().attr("href")?;
                if !href.contains(PRODUCT_PATH) && !href.contains("product-details") {
                    return None;
                }
                let title = extract_text(anchor, &[Locator::OwnText])?;
                if !is_relevant(&title, &ctx.raw_query, MEDICINE_TERMS) {
                    return None;
                }
                Some((title, absolutize(BASE_URL, href)))
            })
            .take(self.settings.enrich_limit)
            .collect();

        let candidates = links
            .into_iter()
            .enumerate()
            .map(|(idx, (title, link))| {
                if idx > 0 && !self.settings.enrich_delay.is_zero() {
                    thread::sleep(self.settings.enrich_delay);
                }
                let details = self.enrich(&link, ctx, fetcher);
                let relevance = relevance_score(&title, &ctx.raw_query, false);
                let raw_price = parse_price(&details.price);
                let record = ProductRecord::new(Source::PharmEasy, title, link, details.price, raw_price);
                Candidate::new(record)
                    .with_rating(details.rating, details.reviews)
                    .with_scores(relevance, popularity(details.rating, details.reviews))
            })
            .collect();

        rank_top_k(candidates, self.settings.max_results)
    }

    /// Visit a product page for price, rating and reviews. Never fails: an
    /// unreachable page yields the unknown-price placeholder.
    fn enrich(&self, link: &str, ctx: &QueryContext, fetcher: &dyn Fetcher) -> PageDetails {
        let request = FetchRequest::get(link, self.settings.enrich_timeout)
            .header("User-Agent", ctx.user_agent());
        match fetch_page(fetcher, &request) {
            Ok(body) => PageDetails::from_page(&Html::parse_document(&body)),
            Err(e) => {
                tracing::debug!(source = "PharmEasy", url = link, "product page unavailable: {}", e);
                PageDetails::default()
            }
        }
    }

    fn load_search_page(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> Option<DocumentShape> {
        let user_agent = ctx.user_agent();
        let timeout = self.settings.list_timeout;
        let primary = html_request(
            format!("{BASE_URL}/search/all?name={}&sort_by=popularity", ctx.encoded_query),
            user_agent.clone(),
            timeout,
        );
        let alternate = html_request(
            format!("{BASE_URL}/search/all?name={}", ctx.encoded_query),
            user_agent,
            timeout,
        );

        match fetch_with_fallback(Source::PharmEasy, fetcher, &primary, &alternate) {
            Ok((body, origin)) => {
                let shape = detect_shape(&body, PROBES);
                tracing::debug!(source = "PharmEasy", shape = shape.kind(), ?origin, "search page classified");
                Some(shape)
            }
            Err(e) => {
                tracing::warn!(source = "PharmEasy", "search page unavailable: {}", e);
                None
            }
        }
    }
}

impl SourceAdapter for PharmEasy {
    fn source(&self) -> Source {
        Source::PharmEasy
    }

    fn search(&self, ctx: &QueryContext, fetcher: &dyn Fetcher) -> Vec<ProductRecord> {
        // Fetched at most once, and only if the API tier comes up empty
        let page: OnceCell<Option<DocumentShape>> = OnceCell::new();
        let shape = || {
            page.get_or_init(|| self.load_search_page(ctx, fetcher))
                .as_ref()
                .ok_or_else(|| SourceError::Shape("no search page".into()))
        };

        let mut records = run_tiers(
            Source::PharmEasy,
            [
                Tier::new("api", || self.from_api(ctx, fetcher)),
                Tier::new("embedded", || self.from_embedded(shape()?, ctx)),
                Tier::new("selector", || Ok(self.from_cards(require_document(shape()?)?, ctx))),
                Tier::new("degraded", || {
                    Ok(self.from_product_links(require_document(shape()?)?, ctx, fetcher))
                }),
            ],
        );

        records.truncate(self.settings.max_results);
        records
    }
}

fn json_candidate(product: &Value, query: &str) -> Candidate {
    let title = json_str(product, &["name"]).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let slug = json_str(product, &["slug"]).unwrap_or_default();
    let mrp = json_f64(product, &["mrp"]);
    let sale = json_f64(product, &["salePrice"]).or(mrp);
    let discount = json_f64(product, &["discountPercent"]).unwrap_or(0.0);

    let price = match (sale, mrp) {
        (Some(sale), Some(mrp)) if discount > 0.0 => discounted_price(sale, mrp, discount),
        (_, Some(mrp)) => format!("MRP₹{}*", format_amount(mrp)),
        (Some(sale), None) => format!("₹{}", format_amount(sale)),
        (None, None) => PRICE_NOT_AVAILABLE.to_string(),
    };

    let rating_count = json_f64(product, &["ratingCount"]).unwrap_or(0.0);
    let retailer_popularity = json_f64(product, &["popularity"]).unwrap_or(0.0);
    let relevance = relevance_score(&title, query, false);

    let record = ProductRecord::new(
        Source::PharmEasy,
        title,
        format!("{BASE_URL}{PRODUCT_PATH}{slug}"),
        price,
        sale.unwrap_or(0.0),
    );
    Candidate::new(record)
        .with_rating(0.0, rating_count.max(0.0) as u64)
        .with_scores(relevance, retailer_popularity + rating_count)
}

fn discounted_price(sale: f64, mrp: f64, discount: f64) -> String {
    format!(
        "₹{}*MRP₹{}Save {}%",
        format_amount(sale),
        format_amount(mrp),
        format_amount(discount)
    )
}

/// Rewrite a scraped price into the retailer's sale/MRP form when both
/// amounts can be found. `context` is the surrounding text, searched for MRP
/// and discount when the price text lacks them.
fn reformat_with_mrp(price: &str, context: &str) -> Option<String> {
    let amount = |re: &Regex, text: &str| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };

    let sale = amount(&RUPEE_AMOUNT, price)?;
    let mrp = amount(&MRP_AMOUNT, price).or_else(|| amount(&MRP_AMOUNT, context))?;
    if mrp <= 0.0 {
        return None;
    }
    let discount = amount(&PERCENT_OFF, price)
        .or_else(|| amount(&PERCENT_OFF, context))
        .unwrap_or_else(|| ((1.0 - sale / mrp) * 100.0).round());

    Some(if discount > 0.0 {
        discounted_price(sale, mrp, discount)
    } else {
        format!("MRP₹{}*", format_amount(mrp))
    })
}

/// Price text from class names, then any rupee text, then price attributes
fn scraped_price(scope: ElementRef<'_>) -> Option<String> {
    extract_text(scope, &[Locator::Text(PRICE_CLASSES)])
        .or_else(|| find_text_containing(scope, "₹"))
        .or_else(|| {
            select_all(scope, PRICE_ATTR_HOLDERS).into_iter().find_map(|el| {
                PRICE_ATTRS.iter().find_map(|attr| {
                    let value = el.value().attr(attr)?.trim().parse::<f64>().ok()?;
                    Some(format!("₹{}", format_amount(value)))
                })
            })
        })
}

fn card_candidate(card: ElementRef<'_>, query: &str) -> Option<Candidate> {
    let title = extract_text(card, TITLE).unwrap_or_else(|| UNKNOWN_TITLE.to_string());
    let link = card_link(card, &title)?;
    let card_text = card.text().collect::<String>();

    let price = match scraped_price(card) {
        Some(price) => reformat_with_mrp(&price, &card_text).unwrap_or(price),
        None => match parse_price(&title) {
            amount if amount > 0.0 => format!("₹{}", format_amount(amount)),
            _ => UNKNOWN_MRP.to_string(),
        },
    };
    let raw_price = parse_price(&price);
    let rating = extract_field(card, RATING, parse_rating).unwrap_or(0.0);
    let reviews = extract_field(card, REVIEWS, parse_count).unwrap_or(0);
    let relevance = relevance_score(&title, query, false);

    let record = ProductRecord::new(Source::PharmEasy, title, link, price, raw_price);
    Some(
        Candidate::new(record)
            .with_rating(rating, reviews)
            .with_scores(relevance, popularity(rating, reviews)),
    )
}

/// The card's anchor, or a slug built from the title when the card carries
/// an id attribute (`id`, `data-id`, `*-id`). Cards with neither are dropped.
fn card_link(card: ElementRef<'_>, title: &str) -> Option<String> {
    if let Some(href) = extract_text(card, &[Locator::Attr("a", "href")]) {
        return Some(absolutize(BASE_URL, &href));
    }
    let has_id = card
        .value()
        .attrs()
        .any(|(name, value)| is_id_attr(name) && !value.trim().is_empty());
    if !has_id {
        return None;
    }
    let slug = title.to_lowercase().split_whitespace().collect::<Vec<_>>().join("-");
    Some(format!("{BASE_URL}{PRODUCT_PATH}{slug}"))
}

fn is_id_attr(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name == "id" || name.ends_with("-id")
}

/// What a product page adds to a bare link
#[derive(Debug, Clone, PartialEq)]
struct PageDetails {
    price: String,
    rating: f64,
    reviews: u64,
}

impl Default for PageDetails {
    fn default() -> Self {
        Self {
            price: UNKNOWN_MRP.to_string(),
            rating: 0.0,
            reviews: 0,
        }
    }
}

impl PageDetails {
    fn from_page(document: &Html) -> Self {
        let root = document.root_element();
        let page_text = root.text().collect::<String>();
        let price = scraped_price(root)
            .map(|price| reformat_with_mrp(&price, &page_text).unwrap_or(price))
            .unwrap_or_else(|| UNKNOWN_MRP.to_string());

        Self {
            price,
            rating: extract_field(root, RATING, parse_rating).unwrap_or(0.0),
            reviews: extract_field(root, REVIEWS, parse_count).unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedFetcher;
    use std::sync::Arc;
    use std::time::Duration;

    const API_URL: &str = "https://pharmeasy.in/api/search/search?q=";
    const PAGE_URL: &str = "https://pharmeasy.in/search/all?name=";

    fn ctx(query: &str) -> QueryContext {
        QueryContext::new(query, Arc::from(vec!["test-agent".to_string()]))
    }

    fn adapter() -> PharmEasy {
        PharmEasy::new(AdapterSettings {
            enrich_delay: Duration::ZERO,
            ..AdapterSettings::default()
        })
    }

    #[test]
    fn test_api_tier() {
        let api = r#"{"data": {"products": [
            {"name": "Dolo 650 Tablet", "slug": "dolo-650", "mrp": 34, "salePrice": 30, "discountPercent": 12, "ratingCount": 200, "popularity": 50},
            {"name": "Dolo Cold", "slug": "dolo-cold", "mrp": 60, "ratingCount": 1, "popularity": 0},
            {"name": "Pain balm", "slug": "balm", "mrp": 100, "salePrice": 90, "discountPercent": 10, "popularity": 5000}
        ]}}"#;
        let fetcher = ScriptedFetcher::new().respond(API_URL, 200, api);

        let results = adapter().search(&ctx("dolo"), &fetcher);
        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Pain balm", "Dolo 650 Tablet", "Dolo Cold"]);

        assert_eq!(results[1].price, "₹30*MRP₹34Save 12%");
        assert_eq!(results[1].raw_price, 30.0);
        assert_eq!(results[1].link, "https://pharmeasy.in/online-medicine-order/dolo-650");
        assert_eq!(results[2].price, "MRP₹60*");
        assert_eq!(results[2].raw_price, 60.0);

        // the HTML page is never requested
        assert_eq!(fetcher.requested_urls().len(), 1);
    }

    #[test]
    fn test_initial_state_after_api_error() {
        let page = r#"<html><body><script>
            window.__INITIAL_STATE__ = {"search": {"products": [
                {"name": "Calpol 500mg Tablet", "slug": "calpol", "mrp": 20, "salePrice": 18, "discountPercent": 10}
            ]}};
        </script></body></html>"#;
        let fetcher = ScriptedFetcher::new()
            .respond(API_URL, 500, "oops")
            .respond(PAGE_URL, 200, page);

        let results = adapter().search(&ctx("calpol"), &fetcher);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].price, "₹18*MRP₹20Save 10%");
        assert_eq!(results[0].source, Source::PharmEasy);
    }

    #[test]
    fn test_priceless_api_falls_through_to_cards() {
        let api = r#"{"data": {"products": [{"name": "Crocin"}]}}"#;
        let page = r#"
        <html><body>
          <div data-test="product-card">
            <h2>Crocin Advance 500mg Tablet</h2>
            <div class="ProductCard_ourPrice__x">₹25.5</div>
            <div class="ProductCard_mrp">MRP ₹30</div>
            <a href="/online-medicine-order/crocin-advance">view</a>
          </div>
          <div data-test="product-card" data-product-id="77">
            <h3>Crocin Pain Relief Rs. 45</h3>
          </div>
          <div data-test="product-card">
            <h3>Crocin Syrup</h3>
            <span class="price">₹60</span>
          </div>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new()
            .respond(API_URL, 200, api)
            .respond(PAGE_URL, 200, page);

        let results = adapter().search(&ctx("crocin"), &fetcher);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Crocin Advance 500mg Tablet");
        assert_eq!(results[0].price, "₹25.5*MRP₹30Save 15%");
        assert_eq!(results[0].raw_price, 25.5);
        assert_eq!(results[0].link, "https://pharmeasy.in/online-medicine-order/crocin-advance");

        assert_eq!(results[1].price, "₹45");
        assert_eq!(
            results[1].link,
            "https://pharmeasy.in/online-medicine-order/crocin-pain-relief-rs.-45"
        );
    }

    #[test]
    fn test_product_links_are_enriched() {
        let page = r#"
        <html><body><ul>
          <li><a href="/online-medicine-order/zincovit-tablet">Zincovit Tablet</a></li>
          <li><a href="https://pharmeasy.in/health-care/product-details/zinc-syrup">Zinc Syrup</a></li>
          <li><a href="/about">About</a></li>
        </ul></body></html>
        "#;
        let product = r#"
        <html><body>
          <div class="PriceInfo_ourPrice">₹99</div>
          <span>MRP ₹110</span><span>10% off</span>
          <div class="Rating_value">4.5</div>
          <span class="Reviews_count">120 reviews</span>
        </body></html>
        "#;
        let fetcher = ScriptedFetcher::new()
            .respond(PAGE_URL, 200, page)
            .respond("https://pharmeasy.in/online-medicine-order/zincovit-tablet", 200, product);

        let results = adapter().search(&ctx("zinc"), &fetcher);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Zincovit Tablet");
        assert_eq!(results[0].price, "₹99*MRP₹110Save 10%");
        assert_eq!(results[0].raw_price, 99.0);

        // unreachable product page keeps the placeholder
        assert_eq!(results[1].title, "Zinc Syrup");
        assert_eq!(results[1].price, UNKNOWN_MRP);
        assert_eq!(results[1].raw_price, 0.0);
    }

    #[test]
    fn test_product_link_enrichment_is_capped() {
        let links: String = (1..=12)
            .map(|i| format!(r#"<li><a href="/online-medicine-order/zinc-tablet-{i}">Zinc Tablet {i}</a></li>"#))
            .collect();
        let page = format!(
            r#"<html><body><ul>
            <li><a href="/online-medicine-order/gift-voucher">Gift voucher</a></li>
            {links}
            </ul></body></html>"#
        );
        let product = r#"<html><body><div class="PriceInfo_ourPrice">₹40</div></body></html>"#;
        let fetcher = ScriptedFetcher::new()
            .respond(PAGE_URL, 200, &page)
            .respond("https://pharmeasy.in/online-medicine-order/", 200, product);
        let adapter = PharmEasy::new(AdapterSettings {
            enrich_delay: Duration::ZERO,
            max_results: 20,
            ..AdapterSettings::default()
        });

        let results = adapter.search(&ctx("zinc"), &fetcher);
        assert_eq!(results.len(), 10);
        assert!(results.iter().all(|r| r.title.starts_with("Zinc Tablet")));
        assert!(results.iter().all(|r| r.raw_price == 40.0));

        let visited: Vec<String> = fetcher
            .requested_urls()
            .into_iter()
            .filter(|u| u.contains(PRODUCT_PATH))
            .collect();
        assert_eq!(visited.len(), 10);
        // the irrelevant link is neither visited nor counted against the cap
        assert!(!visited.iter().any(|u| u.ends_with("gift-voucher")));
        assert!(visited.iter().any(|u| u.ends_with("zinc-tablet-10")));
        assert!(!visited.iter().any(|u| u.ends_with("zinc-tablet-11")));
    }

    #[test]
    fn test_card_link_requires_id_attribute() {
        let html = Html::parse_fragment(
            r#"<div data-provider="x" data-video="y">a</div>
            <div data-sku-id="9">b</div>
            <div id="c3">c</div>
            <div data-id="">d</div>"#,
        );
        let cards = select_all(html.root_element(), "div");
        assert_eq!(card_link(cards[0], "Dolo 650"), None);
        assert_eq!(
            card_link(cards[1], "Dolo 650").as_deref(),
            Some("https://pharmeasy.in/online-medicine-order/dolo-650")
        );
        assert!(card_link(cards[2], "Dolo 650").is_some());
        assert_eq!(card_link(cards[3], "Dolo 650"), None);
    }

    #[test]
    fn test_search_page_alternate_template() {
        let page = r#"<script>window.__INITIAL_STATE__ = {"search": {"products": [{"name": "Dolo", "slug": "d", "mrp": 30}]}};</script>"#;
        let fetcher = ScriptedFetcher::new()
            .respond("https://pharmeasy.in/search/all?name=dolo&sort_by", 503, "")
            .respond("https://pharmeasy.in/search/all?name=dolo", 200, page);

        let results = adapter().search(&ctx("dolo"), &fetcher);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].price, "MRP₹30*");

        let urls = fetcher.requested_urls();
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[2], "https://pharmeasy.in/search/all?name=dolo");
    }

    #[test]
    fn test_reformat_with_mrp() {
        assert_eq!(
            reformat_with_mrp("₹80", "MRP: ₹100 20% off").as_deref(),
            Some("₹80*MRP₹100Save 20%")
        );
        assert_eq!(reformat_with_mrp("₹100", "MRP ₹100").as_deref(), Some("MRP₹100*"));
        assert_eq!(reformat_with_mrp("₹80", "no list price"), None);
    }
}
