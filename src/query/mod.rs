//! C5 — QueryPipeline: expansion, embedding fetch, hybrid rerank and the
//! threshold gate described in §4.5.

mod expansion;

use crate::constants::{ANN_OVERSAMPLE_FACTOR, PREVIEW_LENGTH};
use crate::embed::EmbeddingService;
use crate::errors::Result;
use crate::hybridstore::HybridStore;
use crate::metadata::{ChunkRow, Location};
use crate::spatial::SpatialFilter;
use std::collections::HashSet;
use std::sync::Arc;

pub use expansion::{expand_query, tokenize};

/// One enriched, reranked search result surfaced to `find`.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub container_id: String,
    pub primary_location: Location,
    pub container_path: String,
    pub preview: String,
    pub semantic_score: f32,
    pub keyword_score: f32,
    pub final_score: f32,
}

pub struct QueryPipeline {
    store: Arc<HybridStore>,
    embeddings: Arc<EmbeddingService>,
    alpha: f32,
}

impl QueryPipeline {
    pub fn new(store: Arc<HybridStore>, embeddings: Arc<EmbeddingService>, alpha: f32) -> Self {
        Self { store, embeddings, alpha }
    }

    /// Runs the full pipeline for a raw query string, optionally
    /// restricted to a `(center, radius)` spatial window (§4.4).
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        near: Option<(Location, f64)>,
    ) -> Result<Vec<SearchResult>> {
        let expanded_tokens = expansion::expand_query(query);
        let expanded_query = expanded_tokens.join(" ");

        let allow_set: Option<HashSet<u32>> = match &near {
            Some((center, radius)) => {
                let set = SpatialFilter::allow_set(&self.store, center, *radius)?;
                if set.is_empty() {
                    return Ok(Vec::new());
                }
                Some(set)
            }
            None => None,
        };

        let query_embedding = self.embeddings.embed_query(&expanded_query).await?;
        let oversampled = limit.saturating_mul(ANN_OVERSAMPLE_FACTOR).max(limit);

        let candidates = self
            .store
            .search(&query_embedding, oversampled, allow_set.as_ref())?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let threshold = self.store.get_threshold()?;
        // Expansion entries can be multi-word phrases (e.g. "diamond pickaxe"),
        // but `content_tokens` below is always single words, so split each
        // entry into its constituent words before building the overlap set.
        let query_terms: HashSet<&str> = expanded_tokens
            .iter()
            .flat_map(|term| term.split_whitespace())
            .collect();

        let mut scored: Vec<(f32, f32, f32, ChunkRow)> = candidates
            .into_iter()
            .filter_map(|(hit, row)| {
                if let Some((center, radius)) = &near {
                    if !SpatialFilter::within_radius(center, &row, *radius) {
                        return None;
                    }
                }
                let semantic = hit.score;
                if semantic < threshold {
                    return None;
                }
                let keyword = keyword_overlap_score(&query_terms, &row.content_text);
                let final_score = self.alpha * semantic + (1.0 - self.alpha) * keyword;
                Some((final_score, semantic, keyword, row))
            })
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored
            .into_iter()
            .map(|(final_score, semantic, keyword, row)| SearchResult {
                container_id: row.container_id.clone(),
                primary_location: row.primary_location.clone(),
                container_path: row.container_path.clone(),
                preview: preview_of(&row.content_text),
                semantic_score: semantic,
                keyword_score: keyword,
                final_score,
            })
            .collect())
    }
}

/// Normalized token-overlap between the expanded query terms and a
/// candidate's full content text (§4.5 step 4).
fn keyword_overlap_score(query_terms: &HashSet<&str>, content_text: &str) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let content_tokens: HashSet<String> = tokenize(content_text).into_iter().collect();
    let overlap = query_terms
        .iter()
        .filter(|t| content_tokens.contains(**t))
        .count();
    overlap as f32 / query_terms.len() as f32
}

fn preview_of(content_text: &str) -> String {
    if content_text.chars().count() <= PREVIEW_LENGTH {
        return content_text.to_string();
    }
    let truncated: String = content_text.chars().take(PREVIEW_LENGTH).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_overlap_full_match_scores_one() {
        let terms: HashSet<&str> = ["diamond", "pickaxe"].into_iter().collect();
        let score = keyword_overlap_score(&terms, "diamond pickaxe x5");
        assert_eq!(score, 1.0);
    }

    #[test]
    fn keyword_overlap_partial_match() {
        let terms: HashSet<&str> = ["diamond", "sword"].into_iter().collect();
        let score = keyword_overlap_score(&terms, "diamond pickaxe x5");
        assert_eq!(score, 0.5);
    }

    #[test]
    fn preview_truncates_long_content() {
        let text = "x".repeat(150);
        let preview = preview_of(&text);
        assert_eq!(preview.chars().count(), PREVIEW_LENGTH + 3);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn preview_leaves_short_content_untouched() {
        let preview = preview_of("short");
        assert_eq!(preview, "short");
    }
}
