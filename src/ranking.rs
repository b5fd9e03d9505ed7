//! Shared scoring and top-K selection
//!
//! The weights are tuning constants, not a normative ratio.

use crate::model::{Candidate, ProductRecord};

/// Domain vocabulary that marks a title as medicine-like
pub const MEDICINE_TERMS: &[&str] = &[
    "medicine", "tablet", "capsule", "syrup", "drug", "pharma", "health", "medical", "dose", "mg",
];

pub const KEYWORD_WEIGHT: f64 = 10.0;
pub const QUERY_MATCH_WEIGHT: f64 = 50.0;
pub const PROMOTED_WEIGHT: f64 = 5.0;

/// Keyword and query-substring relevance of a title
pub fn relevance_score(title: &str, query: &str, promoted: bool) -> f64 {
    let lower_title = title.to_lowercase();
    let keyword_hits = MEDICINE_TERMS
        .iter()
        .filter(|term| lower_title.contains(*term))
        .count();

    let mut score = keyword_hits as f64 * KEYWORD_WEIGHT;
    let query = query.trim().to_lowercase();
    if !query.is_empty() && lower_title.contains(&query) {
        score += QUERY_MATCH_WEIGHT;
    }
    if promoted {
        score += PROMOTED_WEIGHT;
    }
    score
}

/// `rating × max(rating_count, 1)`
pub fn popularity(rating: f64, rating_count: u64) -> f64 {
    if !rating.is_finite() || rating <= 0.0 {
        return 0.0;
    }
    rating * rating_count.max(1) as f64
}

/// Cheap filter for unscored tiers: the title mentions the query or a term
pub fn is_relevant(title: &str, query: &str, terms: &[&str]) -> bool {
    let lower_title = title.to_lowercase();
    let query = query.trim().to_lowercase();
    (!query.is_empty() && lower_title.contains(&query))
        || terms.iter().any(|term| lower_title.contains(term))
}

/// Sort by `relevance + popularity` descending (stable on ties), keep `k`,
/// and strip the scoring fields.
pub fn rank_top_k(mut candidates: Vec<Candidate>, k: usize) -> Vec<ProductRecord> {
    candidates.sort_by(|a, b| b.combined_score().total_cmp(&a.combined_score()));
    candidates
        .into_iter()
        .take(k)
        .map(Candidate::into_record)
        .collect()
}
