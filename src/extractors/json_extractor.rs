//! Structured data hidden in retailer responses
//!
//! Retailers expose product data as plain API JSON, as JSON inside a
//! `<script type="application/json">` tag, or as a JavaScript object literal
//! assigned to a variable (`window.__INITIAL_STATE__ = {...};`). `detect_shape`
//! classifies a response body so adapters can dispatch on the variant.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use super::css_extractor::select_all;

/// What a response body turned out to be
#[derive(Debug)]
pub enum DocumentShape {
    /// The whole body is JSON
    StructuredApi(Value),
    /// An HTML page carrying JSON that satisfied one of the probes
    EmbeddedJson { data: Value, document: Html },
    /// HTML without recognizable embedded data
    RawHtml(Html),
    /// Empty, non-HTML, or malformed JSON
    Unrecognized,
}

impl DocumentShape {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::StructuredApi(_) => "structured-api",
            Self::EmbeddedJson { .. } => "embedded-json",
            Self::RawHtml(_) => "raw-html",
            Self::Unrecognized => "unrecognized",
        }
    }

    /// JSON payload, whether it was the whole body or embedded
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::StructuredApi(data) | Self::EmbeddedJson { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Parsed HTML, if the body was a page
    pub fn document(&self) -> Option<&Html> {
        match self {
            Self::EmbeddedJson { document, .. } | Self::RawHtml(document) => Some(document),
            _ => None,
        }
    }
}

/// How to look for embedded JSON in an HTML page. Every probe carries a
/// `path` that must resolve in the found JSON for the probe to match.
#[derive(Debug, Clone, Copy)]
pub enum EmbeddedProbe {
    /// A script whose text contains every token; JSON is the value assigned to `var`
    ScriptAssignment {
        script_selector: &'static str,
        tokens: &'static [&'static str],
        var: &'static str,
        path: &'static [&'static str],
    },
    /// A script whose whole body is JSON
    ScriptJson {
        script_selector: &'static str,
        path: &'static [&'static str],
    },
    /// A `var = {...}` assignment anywhere in the raw page text
    Assignment {
        var: &'static str,
        path: &'static [&'static str],
    },
}

impl EmbeddedProbe {
    fn find(&self, document: &Html, body: &str) -> Option<Value> {
        match *self {
            Self::ScriptAssignment { script_selector, tokens, var, path } => {
                select_all(document.root_element(), script_selector)
                    .into_iter()
                    .map(|script| script.text().collect::<String>())
                    .filter(|text| tokens.iter().all(|t| text.contains(t)))
                    .filter_map(|text| find_assigned_value(&text, var))
                    .find(|value| navigate_json(value, path).is_some())
            }
            Self::ScriptJson { script_selector, path } => {
                select_all(document.root_element(), script_selector)
                    .into_iter()
                    .filter_map(|script| {
                        let text = script.text().collect::<String>();
                        serde_json::from_str::<Value>(text.trim()).ok()
                    })
                    .find(|value| navigate_json(value, path).is_some())
            }
            Self::Assignment { var, path } => find_assigned_value(body, var)
                .filter(|value| navigate_json(value, path).is_some()),
        }
    }
}

/// Classify a response body
pub fn detect_shape(body: &str, probes: &[EmbeddedProbe]) -> DocumentShape {
    let trimmed = body.trim_start();
    if trimmed.is_empty() {
        return DocumentShape::Unrecognized;
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return match serde_json::from_str::<Value>(trimmed) {
            Ok(value) => DocumentShape::StructuredApi(value),
            Err(e) => {
                tracing::debug!("body looks like JSON but does not parse: {}", e);
                DocumentShape::Unrecognized
            }
        };
    }

    if !trimmed.contains('<') {
        return DocumentShape::Unrecognized;
    }

    let document = Html::parse_document(body);
    for probe in probes {
        if let Some(data) = probe.find(&document, body) {
            return DocumentShape::EmbeddedJson { data, document };
        }
    }
    DocumentShape::RawHtml(document)
}

/// Find `var = <object or array>` in JavaScript source and parse the value.
/// Every occurrence is tried in order; the first that parses wins.
pub fn find_assigned_value(source: &str, var: &str) -> Option<Value> {
    let pattern = format!(r"(?:^|[^\w$]){}\s*=\s*", regex::escape(var));
    let re = Regex::new(&pattern).ok()?;

    let found = re.find_iter(source).find_map(|m| {
        let literal = balanced_literal(&source[m.end()..])?;
        parse_js_value(literal).ok()
    });
    found
}

/// The `{...}` or `[...]` literal at the start of `text`, honouring strings
fn balanced_literal(text: &str) -> Option<&str> {
    let open = text.chars().next()?;
    if open != '{' && open != '[' {
        return None;
    }

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '{' | '[' => depth += 1,
            '}' | ']' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..idx + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid regex"));
static UNQUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"([{,]\s*)([A-Za-z_$][\w$]*)\s*:"#).expect("valid regex"));

/// Parse a JavaScript literal as JSON.
/// Handles trailing commas, single quotes, and unquoted keys.
pub fn parse_js_value(js_str: &str) -> Result<Value, serde_json::Error> {
    if let Ok(v) = serde_json::from_str(js_str) {
        return Ok(v);
    }

    let json_str = js_str.replace('\'', "\"");
    let json_str = TRAILING_COMMA.replace_all(&json_str, "$1");
    let json_str = UNQUOTED_KEY.replace_all(&json_str, r#"$1"$2":"#);

    serde_json::from_str(&json_str)
}

/// Navigate a JSON value by path parts; numeric parts index arrays
pub fn navigate_json<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        current = match current {
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => current.get(part)?,
        };
    }
    Some(current)
}

/// First key holding a non-empty string (numbers are stringified)
pub fn json_str(obj: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// First key holding a number or a numeric string
pub fn json_f64(obj: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    })
    .filter(|v| v.is_finite())
}

/// Like `json_f64` but for non-negative counts
pub fn json_u64(obj: &Value, keys: &[&str]) -> Option<u64> {
    json_f64(obj, keys).filter(|v| *v >= 0.0).map(|v| v as u64)
}
