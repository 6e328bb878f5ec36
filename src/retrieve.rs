//! Semantic retrieval over the rules index.
//!
//! A query is embedded with the index's own model and scored against every
//! stored segment by cosine similarity. The scan is brute force; the rules
//! corpus is a few thousand segments, so an ANN structure would not pay off.
//!
//! Short follow-up questions ("legal?", "what about it?") usually omit
//! their subject, so when a query has fewer than `short_query_tokens`
//! whitespace-separated tokens and there is history, the previous user
//! turn is prepended before embedding.

use anyhow::{bail, Result};
use std::sync::Arc;

use crate::embedding::{cosine_similarity, embed_query, EmbeddingProvider};
use crate::index::VectorIndex;
use crate::models::CorpusSegment;

/// Ranks rule segments against a query.
pub struct Retriever {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn EmbeddingProvider>,
    short_query_tokens: usize,
}

impl Retriever {
    /// Pair an index with the provider that will embed queries.
    ///
    /// Fails if the provider's model differs from the one the index was
    /// built with; vectors from different models are not comparable.
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn EmbeddingProvider>,
        short_query_tokens: usize,
    ) -> Result<Self> {
        if !index.is_empty() && embedder.model_name() != index.embedding_model_id() {
            bail!(
                "embedding model mismatch: index was built with '{}', provider is '{}'",
                index.embedding_model_id(),
                embedder.model_name()
            );
        }
        Ok(Self {
            index,
            embedder,
            short_query_tokens,
        })
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Return up to `top_k` segments, most similar first.
    ///
    /// Equal scores keep corpus order. An empty index yields an empty
    /// result without calling the embedder.
    pub async fn retrieve(
        &self,
        query: &str,
        history: &[String],
        top_k: usize,
    ) -> Result<Vec<CorpusSegment>> {
        if self.index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let search_text = augment_query(query, history, self.short_query_tokens);
        tracing::debug!(search_text = %search_text, top_k, "retrieving rules");

        let query_vec = embed_query(self.embedder.as_ref(), &search_text).await?;
        Ok(rank(&self.index, &query_vec, top_k)
            .into_iter()
            .map(|(pos, _)| self.index.segments()[pos].clone())
            .collect())
    }
}

/// Text actually embedded for `query`.
///
/// The second-to-last history entry is the previous user turn, since
/// history alternates user/assistant and ends on an assistant reply.
pub fn augment_query(query: &str, history: &[String], short_query_tokens: usize) -> String {
    let token_count = query.split_whitespace().count();
    if token_count < short_query_tokens && history.len() >= 2 {
        let prior_user = &history[history.len() - 2];
        format!("{} {}", prior_user, query)
    } else {
        query.to_string()
    }
}

/// Positions and scores of the `top_k` best segments, best first.
pub fn rank(index: &VectorIndex, query_vec: &[f32], top_k: usize) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = index
        .embeddings()
        .iter()
        .enumerate()
        .map(|(pos, v)| (pos, cosine_similarity(query_vec, v)))
        .collect();

    // sort_by is stable, so ties stay in corpus order.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);
    scored
}
