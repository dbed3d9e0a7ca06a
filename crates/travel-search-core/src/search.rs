//! Filtered semantic search.
//!
//! 1. Translate the [`FilterSpec`] into a [`Where`] (or no filter).
//! 2. Fetch `candidate_k` nearest candidates from the collection.
//! 3. Re-check every candidate against the predicate.
//! 4. Convert distance to similarity: `similarity = 1 - distance`.
//! 5. Drop candidates below `threshold`.
//! 6. Sort by score (desc), then original name (asc).
//! 7. Keep the best hit per original name.
//! 8. Truncate to `limit`.
//!
//! Step 4 is only meaningful for cosine distance (range `[0, 2]`). Other
//! spaces are rejected with [`PipelineError::DistanceSpace`] rather than
//! scored with a formula that does not apply to them.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::embedding::DistanceSpace;
use crate::error::PipelineError;
use crate::filter::{FilterSpec, Where};
use crate::models::SearchHit;
use crate::store::{Collection, QueryCandidate};

/// Default similarity threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.80;
/// Default maximum number of results.
pub const DEFAULT_LIMIT: usize = 10;
/// Hard cap on the number of results, whatever `limit` says.
pub const MAX_LIMIT: usize = 10;
/// Default number of raw candidates fetched before post-filtering.
pub const DEFAULT_CANDIDATE_K: usize = 10;

/// Retrieval tuning parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams {
    /// Raw candidates requested from the collection. Raised to `limit` if
    /// smaller.
    pub candidate_k: usize,
    /// Maximum results returned. Never more than [`MAX_LIMIT`].
    pub limit: usize,
    /// Minimum similarity, inclusive.
    pub threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            candidate_k: DEFAULT_CANDIDATE_K,
            limit: DEFAULT_LIMIT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Convert a collection distance into a similarity score.
pub fn similarity(space: DistanceSpace, distance: f64) -> Result<f64, PipelineError> {
    match space {
        DistanceSpace::Cosine => Ok(1.0 - distance),
        other => Err(PipelineError::DistanceSpace(other.to_string())),
    }
}

/// Run a filtered semantic search. Never writes to the collection.
pub async fn search<C>(
    collection: &C,
    question: &str,
    filters: &FilterSpec,
    params: &SearchParams,
) -> Result<Vec<SearchHit>, PipelineError>
where
    C: Collection + ?Sized,
{
    if question.trim().is_empty() {
        return Ok(Vec::new());
    }

    let space = collection.space();
    if space != DistanceSpace::Cosine {
        return Err(PipelineError::DistanceSpace(space.to_string()));
    }

    let filter = filters.to_where();
    if let Some(w) = &filter {
        debug!(filter = %w.to_json(), "query predicate");
    }

    let k = params.candidate_k.max(params.limit);
    let candidates = collection
        .query_by_text(question, filter.as_ref(), k)
        .await
        .map_err(PipelineError::store)?;

    let hits = rank_candidates(space, candidates, filter.as_ref(), params)?;
    info!(
        collection = collection.name(),
        results = hits.len(),
        "search finished"
    );
    Ok(hits)
}

/// Score, threshold, sort, deduplicate and truncate raw candidates.
pub fn rank_candidates(
    space: DistanceSpace,
    candidates: Vec<QueryCandidate>,
    filter: Option<&Where>,
    params: &SearchParams,
) -> Result<Vec<SearchHit>, PipelineError> {
    let mut hits = Vec::with_capacity(candidates.len());
    for cand in candidates {
        if filter.is_some_and(|w| !w.matches(&cand.metadata)) {
            continue;
        }
        hits.push(SearchHit {
            name: cand.metadata.display_name().to_string(),
            score: similarity(space, cand.distance)?,
            original_name: cand.metadata.name,
        });
    }
    Ok(rank_hits(hits, params))
}

/// Threshold, sort, deduplicate by original name and truncate scored hits.
pub fn rank_hits(hits: Vec<SearchHit>, params: &SearchParams) -> Vec<SearchHit> {
    let mut hits: Vec<SearchHit> = hits
        .into_iter()
        .filter(|h| h.score >= params.threshold)
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.original_name.cmp(&b.original_name))
    });

    let mut seen = HashSet::new();
    hits.retain(|h| seen.insert(h.original_name.clone()));
    hits.truncate(params.limit.min(MAX_LIMIT));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Metadata;

    fn hit(name: &str, score: f64) -> SearchHit {
        SearchHit {
            name: name.to_string(),
            score,
            original_name: name.to_string(),
        }
    }

    fn candidate(name: &str, city: &str, distance: f64) -> QueryCandidate {
        QueryCandidate {
            id: format!("id-{}", name),
            distance,
            metadata: Metadata {
                file_name: "f.csv".into(),
                name: name.into(),
                store_type: "美食".into(),
                address: String::new(),
                tel: String::new(),
                city: city.into(),
                town: String::new(),
                date: 0,
                new_store_name: None,
            },
        }
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let params = SearchParams::default();
        let out = rank_hits(vec![hit("at", 0.80), hit("below", 0.7999)], &params);
        let names: Vec<&str> = out.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["at"]);
    }

    #[test]
    fn test_never_more_than_limit_and_sorted() {
        let hits: Vec<SearchHit> = (0..25)
            .map(|i| hit(&format!("store-{:02}", i), 0.80 + (i as f64) * 0.005))
            .collect();
        let out = rank_hits(hits, &SearchParams::default());
        assert_eq!(out.len(), 10);
        for pair in out.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        assert_eq!(out[0].name, "store-24");
    }

    #[test]
    fn test_limit_above_cap_still_returns_ten() {
        let hits: Vec<SearchHit> = (0..30)
            .map(|i| hit(&format!("store-{:02}", i), 0.9))
            .collect();
        let params = SearchParams {
            limit: 25,
            ..SearchParams::default()
        };
        assert_eq!(rank_hits(hits, &params).len(), MAX_LIMIT);
    }

    #[test]
    fn test_dedup_keeps_highest_score() {
        let out = rank_hits(
            vec![hit("A", 0.85), hit("B", 0.9), hit("A", 0.95)],
            &SearchParams::default(),
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].original_name, "A");
        assert!((out[0].score - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_dedup_by_original_name_not_display() {
        let renamed = SearchHit {
            name: "新名".into(),
            score: 0.9,
            original_name: "舊名".into(),
        };
        let out = rank_hits(vec![renamed, hit("舊名", 0.85)], &SearchParams::default());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "新名");
    }

    #[test]
    fn test_cosine_distance_converts_to_similarity() {
        assert!((similarity(DistanceSpace::Cosine, 0.15).unwrap() - 0.85).abs() < 1e-12);
        assert!(matches!(
            similarity(DistanceSpace::L2, 0.15),
            Err(PipelineError::DistanceSpace(_))
        ));
    }

    #[test]
    fn test_post_filter_drops_non_matching_candidates() {
        let filter = FilterSpec::new().cities(["南投縣"]).to_where();
        let out = rank_candidates(
            DistanceSpace::Cosine,
            vec![candidate("A", "南投縣", 0.1), candidate("B", "台北市", 0.05)],
            filter.as_ref(),
            &SearchParams::default(),
        )
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "A");
    }

    #[test]
    fn test_ties_break_by_name() {
        let out = rank_hits(
            vec![hit("b", 0.9), hit("a", 0.9), hit("c", 0.9)],
            &SearchParams::default(),
        );
        let names: Vec<&str> = out.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
