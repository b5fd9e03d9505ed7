//! Single product page lookup
//!
//! Pulls a name, price, image and description out of a retailer's product
//! page. Each retailer has its own selector list; anything still missing is
//! filled from generic page structure (`h1`, `<title>`, rupee text, meta
//! description).

use std::time::Duration;

use scraper::{ElementRef, Html};
use serde::Serialize;

use crate::error::SourceError;
use crate::extractors::{document_first_attr, extract_text, find_text_containing, Locator};
use crate::fetch::{FetchRequest, Fetcher};
use crate::model::{Source, PRICE_NOT_AVAILABLE};
use crate::sources::fetch_page;

pub const DEFAULT_NAME: &str = "Product Name";
pub const NO_DESCRIPTION: &str = "No description available";
/// Descriptions shorter than this are worth replacing
const MIN_DESCRIPTION_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetails {
    pub source: Source,
    pub url: String,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
    pub description: String,
}

struct DetailLocators {
    name: &'static [Locator],
    price: &'static [Locator],
    image: &'static [Locator],
    description: &'static [Locator],
}

const PHARMEASY: DetailLocators = DetailLocators {
    name: &[Locator::Text(
        ".MedicineOverviewSection_medicineName__dHDQZ, h1.ProductTitle_product-title__OkCXo, \
         h1[class*='product-title'], h1[class*='medicineName'], .medicine-name, .product-title",
    )],
    price: &[Locator::Text(
        ".PriceInfo_ourPrice__jFYXr, div[class*='Price'], span[class*='Price'], div[class*='price'], \
         span[class*='price'], div[class*='MRP'], span[class*='MRP']",
    )],
    image: &[Locator::Attr(
        ".ProductImageCarousel_carousel-img__cJgkZ, .style__image___Sd7O3, img[class*='product'], \
         img[class*='medicine'], .product-image img, .medicine-image img",
        "src",
    )],
    description: &[Locator::Text(
        ".ProductDescription_product-description__gAYip, .MedicineOverviewSection_medicineOverview__yR8HD, \
         div[class*='description'], div[class*='overview'], div[class*='details'], .product-details",
    )],
};

const TATA_1MG: DetailLocators = DetailLocators {
    name: &[Locator::Text(
        ".DrugHeader__title___2ZZX_ h1, .ProductTitle__product-title___3QMYH, h1[class*='title'], \
         h1[class*='name'], div.DrugHeader__title-content___2ZZX_",
    )],
    price: &[Locator::Text(
        ".PriceBoxPlanOption__offer-price___3v_Nd, .ProductPriceBox__price___11Tjr, div[class*='price'], \
         span[class*='price'], div[class*='offer-price']",
    )],
    image: &[Locator::Attr(
        ".ProductImage__image-container___2_MWm img, .style__image-container___2G57K img, \
         img[class*='product'], img.style__product-image___1bkbA",
        "src",
    )],
    description: &[Locator::Text(
        ".ProductDescription_description-content___A_qCZ, .DrugOverview__content___2ZZX_, \
         div[class*='description'], div[class*='overview']",
    )],
};

const AMAZON: DetailLocators = DetailLocators {
    name: &[Locator::Text("#productTitle, #title, h1"), Locator::Text("title")],
    price: &[
        Locator::Text(".a-price .a-offscreen"),
        Locator::Text(".a-price"),
        Locator::Text("#priceblock_ourprice"),
        Locator::Text("#priceblock_dealprice"),
        Locator::Text("#priceblock_saleprice"),
    ],
    image: &[
        Locator::Attr("#landingImage", "data-old-hires"),
        Locator::Attr("#landingImage", "src"),
        Locator::Attr("#imgBlkFront", "src"),
        Locator::Attr("img[data-old-hires]", "data-old-hires"),
        Locator::Attr("img[id*='image']", "src"),
    ],
    description: &[
        Locator::Text("#productDescription"),
        Locator::Text("#feature-bullets"),
        Locator::Text(".product-description"),
        Locator::Text("[id$='-description']"),
    ],
};

/// Secondary description sources, tried while the description is short
const DESCRIPTION_FALLBACKS: &[Locator] = &[
    Locator::Attr("meta[name='description']", "content"),
    Locator::Attr("meta[property='og:description']", "content"),
    Locator::Text(".product-description"),
    Locator::Text("[class*='description']"),
    Locator::Text("[class*='info']"),
    Locator::Text("[class*='detail']"),
];

fn locators_for(source: Source) -> &'static DetailLocators {
    match source {
        Source::PharmEasy => &PHARMEASY,
        Source::Tata1mg => &TATA_1MG,
        Source::Amazon => &AMAZON,
    }
}

/// Fetch and parse one product page
pub fn product_details(
    fetcher: &dyn Fetcher,
    source: Source,
    url: &str,
    user_agent: &str,
    timeout: Duration,
) -> Result<ProductDetails, SourceError> {
    let request = FetchRequest::get(url, timeout)
        .header("User-Agent", user_agent)
        .header("Accept", "text/html");
    let body = fetch_page(fetcher, &request)?;
    Ok(parse_details(source, url, &Html::parse_document(&body)))
}

/// Extract details from an already fetched page
pub fn parse_details(source: Source, url: &str, document: &Html) -> ProductDetails {
    let root = document.root_element();
    let locators = locators_for(source);

    let name = extract_text(root, locators.name)
        .map(|name| match source {
            Source::Amazon => strip_store_suffix(&name),
            _ => name,
        })
        .or_else(|| extract_text(root, &[Locator::Text("h1"), Locator::Text("title")]))
        .unwrap_or_else(|| DEFAULT_NAME.to_string());

    let price = extract_text(root, locators.price)
        .or_else(|| find_text_containing(root, "₹"))
        .unwrap_or_else(|| PRICE_NOT_AVAILABLE.to_string());

    let image = extract_text(root, locators.image)
        .or_else(|| generic_image(document))
        .map(|src| resolve_url(url, &src));

    let description = improve_description(
        root,
        extract_text(root, locators.description).unwrap_or_else(|| NO_DESCRIPTION.to_string()),
    );

    ProductDetails {
        source,
        url: url.to_string(),
        name,
        price,
        image,
        description,
    }
}

/// `"Dolo 650: Amazon.in: Health"` → `"Dolo 650"`
fn strip_store_suffix(name: &str) -> String {
    if name.contains("Amazon.in") {
        name.split(':').next().unwrap_or(name).trim().to_string()
    } else {
        name.to_string()
    }
}

fn generic_image(document: &Html) -> Option<String> {
    document_first_attr(document, "img[src*='product'], img[src*='large']", "src")
        .or_else(|| document_first_attr(document, "img", "src"))
}

fn resolve_url(page_url: &str, src: &str) -> String {
    url::Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| src.to_string())
}

/// Replace a missing or short description with the longest fallback found,
/// stopping once one is long enough
fn improve_description(root: ElementRef<'_>, mut description: String) -> String {
    let is_weak = |d: &str| d == NO_DESCRIPTION || d.chars().count() < MIN_DESCRIPTION_LEN;
    if !is_weak(&description) {
        return description;
    }
    for locator in DESCRIPTION_FALLBACKS {
        let Some(candidate) = extract_text(root, std::slice::from_ref(locator)) else {
            continue;
        };
        if description == NO_DESCRIPTION || candidate.chars().count() > description.chars().count() {
            description = candidate;
        }
        if !is_weak(&description) {
            break;
        }
    }
    description
}
