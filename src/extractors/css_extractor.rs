//! CSS selector-based extraction
//!
//! Uses the scraper crate to select elements by CSS selectors. Selectors that
//! fail to parse behave like selectors that match nothing.

use scraper::{ElementRef, Html, Selector};

/// Parse a selector, logging instead of failing
pub fn parse_selector(selector_str: &str) -> Option<Selector> {
    match Selector::parse(selector_str) {
        Ok(s) => Some(s),
        Err(e) => {
            tracing::debug!(selector = selector_str, "invalid selector: {:?}", e);
            None
        }
    }
}

/// All elements under `scope` matching a CSS selector
pub fn select_all<'a>(scope: ElementRef<'a>, selector_str: &str) -> Vec<ElementRef<'a>> {
    match parse_selector(selector_str) {
        Some(selector) => scope.select(&selector).collect(),
        None => vec![],
    }
}

/// First element under `scope` matching a CSS selector
pub fn select_first<'a>(scope: ElementRef<'a>, selector_str: &str) -> Option<ElementRef<'a>> {
    let selector = parse_selector(selector_str)?;
    scope.select(&selector).next()
}

/// Whether anything under `scope` matches
pub fn has_match(scope: ElementRef<'_>, selector_str: &str) -> bool {
    select_first(scope, selector_str).is_some()
}

/// Elements matched by the first selector alternative that matches anything
pub fn select_first_alternative<'a>(document: &'a Html, alternatives: &[&str]) -> Vec<ElementRef<'a>> {
    for selector_str in alternatives {
        let items = select_all(document.root_element(), selector_str);
        if !items.is_empty() {
            return items;
        }
    }
    vec![]
}

/// Text content with whitespace runs collapsed
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First text node under `scope` containing `needle`
pub fn find_text_containing(scope: ElementRef<'_>, needle: &str) -> Option<String> {
    scope
        .text()
        .map(str::trim)
        .find(|t| t.contains(needle))
        .map(collapse_whitespace)
}

/// Extract the first matching element's text from a whole document
pub fn document_first_text(document: &Html, selector_str: &str) -> Option<String> {
    select_first(document.root_element(), selector_str)
        .map(element_text)
        .filter(|t| !t.is_empty())
}

/// Extract the first matching element's attribute from a whole document
pub fn document_first_attr(document: &Html, selector_str: &str, attr_name: &str) -> Option<String> {
    select_first(document.root_element(), selector_str)
        .and_then(|el| el.value().attr(attr_name).map(String::from))
        .filter(|v| !v.trim().is_empty())
}
