//! Weighted additive fusion of the vector and keyword result lists.
//!
//! Each signal's raw score is scaled by its weight and summed per document,
//! so a document strong in both signals outranks one strong in only one.
//! Ties keep first-seen insertion order, which favors vector-discovered
//! documents because the vector pass runs first; that tie-break is part of
//! the contract, not an accident of implementation.

use std::collections::HashMap;

use crate::models::{Document, FusionWeights, ScoredDocument};

/// How many fused candidates to hand to the next stage. With a reranker
/// configured, fusion oversamples to `top_k * 2` so the reranker has a real
/// list to reorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionLimit {
    Exact(usize),
    OversampledFor(usize),
}

impl FusionLimit {
    fn candidate_count(self) -> usize {
        match self {
            Self::Exact(top_k) => top_k,
            Self::OversampledFor(top_k) => top_k * 2,
        }
    }
}

/// Merge the two ranked result lists into one deduplicated ranking.
///
/// The vector pass inserts every document with `score = raw * vector_weight`.
/// The keyword pass inserts unseen documents with `score = raw *
/// keyword_weight` and updates documents already found by vector search in
/// place, recomputing `score = vector_score * vector_weight + raw *
/// keyword_weight`. Entries scoring below `min_score` are discarded after
/// the merge.
pub fn fuse(
    vector_hits: Vec<(Document, f32)>,
    keyword_hits: Vec<(Document, f32)>,
    weights: FusionWeights,
    min_score: f32,
    limit: FusionLimit,
) -> Vec<ScoredDocument> {
    let mut merged: Vec<ScoredDocument> =
        Vec::with_capacity(vector_hits.len() + keyword_hits.len());
    let mut position: HashMap<String, usize> = HashMap::new();

    for (doc, raw) in vector_hits {
        if position.contains_key(&doc.id) {
            // The store should not repeat ids within one list; keep the
            // first (highest-ranked) occurrence.
            continue;
        }
        let mut scored = ScoredDocument::from_document(doc, raw * weights.vector_weight);
        scored.vector_score = Some(raw);
        position.insert(scored.id.clone(), merged.len());
        merged.push(scored);
    }

    for (doc, raw) in keyword_hits {
        match position.get(&doc.id) {
            Some(&idx) => {
                let entry = &mut merged[idx];
                if entry.keyword_score.is_some() {
                    continue;
                }
                entry.keyword_score = Some(raw);
                entry.score = entry.vector_score.unwrap_or(0.0) * weights.vector_weight
                    + raw * weights.keyword_weight;
            }
            None => {
                let mut scored = ScoredDocument::from_document(doc, raw * weights.keyword_weight);
                scored.keyword_score = Some(raw);
                position.insert(scored.id.clone(), merged.len());
                merged.push(scored);
            }
        }
    }

    // Stable sort: equal scores keep first-seen insertion order.
    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged.retain(|d| d.score >= min_score);
    merged.truncate(limit.candidate_count());
    merged
}
