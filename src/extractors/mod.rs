//! Field extraction building blocks
//!
//! Every retailer field (title, link, price, rating, review count) is described
//! as an ordered list of locators. The first locator that resolves to
//! non-empty text and survives its transform wins; anything else falls through
//! to the next candidate and finally to a sentinel.

mod css_extractor;
mod fields;
mod json_extractor;

pub use css_extractor::*;
pub use fields::*;
pub use json_extractor::*;

use scraper::ElementRef;

/// Where a value lives inside a card element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// Text of the first element matching the selector
    Text(&'static str),
    /// Attribute of the first element matching the selector
    Attr(&'static str, &'static str),
    /// Text of the first match, or its attribute when the text is blank
    TextOrAttr(&'static str, &'static str),
    /// Attribute on the scope element itself
    OwnAttr(&'static str),
    /// Text of the scope element itself
    OwnText,
}

/// Generic "first success wins" combinator
pub fn first_success<C, T>(candidates: &[C], attempt: impl FnMut(&C) -> Option<T>) -> Option<T> {
    candidates.iter().find_map(attempt)
}

/// Resolve a single locator against `scope`, returning trimmed non-empty text
pub fn locate(scope: ElementRef<'_>, locator: &Locator) -> Option<String> {
    let value = match *locator {
        Locator::Text(sel) => select_first(scope, sel).map(element_text),
        Locator::Attr(sel, attr) => {
            select_first(scope, sel).and_then(|el| el.value().attr(attr).map(String::from))
        }
        Locator::TextOrAttr(sel, attr) => select_first(scope, sel).and_then(|el| {
            let text = element_text(el);
            if text.is_empty() {
                el.value().attr(attr).map(String::from)
            } else {
                Some(text)
            }
        }),
        Locator::OwnAttr(attr) => scope.value().attr(attr).map(String::from),
        Locator::OwnText => Some(element_text(scope)),
    }?;

    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Run locators in order, applying `transform` to each hit until one succeeds
pub fn extract_field<T>(
    scope: ElementRef<'_>,
    locators: &[Locator],
    transform: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    first_success(locators, |locator| {
        locate(scope, locator).and_then(|raw| transform(&raw))
    })
}

/// First locator that yields any text
pub fn extract_text(scope: ElementRef<'_>, locators: &[Locator]) -> Option<String> {
    extract_field(scope, locators, |s| Some(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    const CARD: &str = r#"
    <div class="card" data-id="77">
        <h2 class="name">   </h2>
        <a class="title" title="Dolo 650 Tablet" href="/p/dolo"></a>
        <span class="price">call for price</span>
        <span class="price-alt">₹ 30.50</span>
    </div>
    "#;

    fn card(doc: &Html) -> ElementRef<'_> {
        select_all(doc.root_element(), "div.card")[0]
    }

    #[test]
    fn test_blank_text_falls_through() {
        let doc = Html::parse_fragment(CARD);
        let title = extract_text(
            card(&doc),
            &[Locator::Text("h2.name"), Locator::TextOrAttr("a.title", "title")],
        );
        assert_eq!(title.as_deref(), Some("Dolo 650 Tablet"));
    }

    #[test]
    fn test_failed_transform_falls_through() {
        let doc = Html::parse_fragment(CARD);
        let price = extract_field(
            card(&doc),
            &[Locator::Text(".price"), Locator::Text(".price-alt")],
            |s| Some(parse_price(s)).filter(|p| *p > 0.0),
        );
        assert_eq!(price, Some(30.5));
    }

    #[test]
    fn test_invalid_selector_is_a_miss() {
        let doc = Html::parse_fragment(CARD);
        let value = extract_text(
            card(&doc),
            &[Locator::Text("[[[broken"), Locator::OwnAttr("data-id")],
        );
        assert_eq!(value.as_deref(), Some("77"));
    }

    #[test]
    fn test_first_success_order() {
        let got = first_success(&[1, 2, 3, 4], |n| if n % 2 == 0 { Some(n * 10) } else { None });
        assert_eq!(got, Some(20));
        let none: Option<i32> = first_success(&[1, 3], |_| None);
        assert_eq!(none, None);
    }
}
