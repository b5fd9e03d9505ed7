//! Search records shared by every retailer

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_TITLE: &str = "Unknown Product";
pub const PRICE_NOT_AVAILABLE: &str = "Price not available";

/// Retailer a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "PharmEasy")]
    PharmEasy,
    #[serde(rename = "Tata 1mg")]
    Tata1mg,
    #[serde(rename = "Amazon")]
    Amazon,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PharmEasy => "PharmEasy",
            Self::Tata1mg => "Tata 1mg",
            Self::Amazon => "Amazon",
        }
    }

    /// Parse a display name as produced by `as_str` (case-insensitive)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "pharmeasy" => Some(Self::PharmEasy),
            "tata 1mg" | "tata1mg" | "1mg" => Some(Self::Tata1mg),
            "amazon" => Some(Self::Amazon),
            _ => None,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized product listing as returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub source: Source,
    pub title: String,
    pub link: String,
    /// Display price exactly as the retailer shows it
    pub price: String,
    /// Parsed price, `0.0` when unknown
    pub raw_price: f64,
}

impl ProductRecord {
    pub fn new(
        source: Source,
        title: impl Into<String>,
        link: impl Into<String>,
        price: impl Into<String>,
        raw_price: f64,
    ) -> Self {
        Self {
            source,
            title: title.into(),
            link: link.into(),
            price: price.into(),
            raw_price: if raw_price.is_finite() && raw_price > 0.0 { raw_price } else { 0.0 },
        }
    }
}

/// A record still carrying the signals used to rank it
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub record: ProductRecord,
    pub relevance_score: f64,
    pub popularity_score: f64,
    pub rating: f64,
    pub rating_count: u64,
}

impl Candidate {
    pub fn new(record: ProductRecord) -> Self {
        Self {
            record,
            relevance_score: 0.0,
            popularity_score: 0.0,
            rating: 0.0,
            rating_count: 0,
        }
    }

    pub fn with_scores(mut self, relevance: f64, popularity: f64) -> Self {
        self.relevance_score = relevance;
        self.popularity_score = popularity;
        self
    }

    pub fn with_rating(mut self, rating: f64, rating_count: u64) -> Self {
        self.rating = rating;
        self.rating_count = rating_count;
        self
    }

    pub fn combined_score(&self) -> f64 {
        self.relevance_score + self.popularity_score
    }

    /// Drop the ranking signals
    pub fn into_record(self) -> ProductRecord {
        self.record
    }
}

/// Read-only input shared by every adapter for one search
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub raw_query: String,
    /// Form-encoded query (`+` for spaces)
    pub encoded_query: String,
    pub user_agents: Arc<[String]>,
}

impl QueryContext {
    pub fn new(query: &str, user_agents: Arc<[String]>) -> Self {
        let raw_query = query.trim().to_string();
        let encoded_query = url::form_urlencoded::byte_serialize(raw_query.as_bytes()).collect();
        Self {
            raw_query,
            encoded_query,
            user_agents,
        }
    }

    pub fn user_agent(&self) -> String {
        crate::fetch::pick_user_agent(&self.user_agents)
    }

    pub fn query_lower(&self) -> String {
        self.raw_query.to_lowercase()
    }
}
