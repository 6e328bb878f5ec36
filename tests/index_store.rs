//! Index build, persistence, and retrieval through the public API.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use mtg_judge::chunk::segment_rules;
use mtg_judge::embedding::EmbeddingProvider;
use mtg_judge::error::IndexError;
use mtg_judge::index::{self, VectorIndex};
use mtg_judge::index_cmd::build_index;
use mtg_judge::models::CorpusSegment;
use mtg_judge::retrieve::Retriever;

/// Deterministic bag-of-keywords embedder. Each dimension counts one
/// keyword, so texts about the same mechanic land close together.
struct KeywordEmbedder {
    model: String,
    seen: Mutex<Vec<String>>,
}

const KEYWORDS: [&str; 4] = ["trample", "flying", "mana", "combat"];

impl KeywordEmbedder {
    fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        KEYWORDS.len() + 1
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(texts.iter().cloned());
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|k| lower.matches(k).count() as f32)
                    .collect();
                // Constant component keeps every vector non-zero.
                v.push(0.1);
                v
            })
            .collect())
    }
}

struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    fn model_name(&self) -> &str {
        "failing"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        anyhow::bail!("provider offline")
    }
}

const RULES: &str = "\
302.1. A creature is a type of permanent.
302.6. A creature's activated ability with the tap symbol can't be activated unless the creature has been under its controller's control continuously.
506.1. The combat phase has five steps. Combat damage is dealt during combat.
702.9a Flying is an evasion ability.
702.9b A creature with flying can't be blocked except by creatures with flying and/or reach.
702.19b The controller of an attacking creature with trample first assigns damage to the creature blocking it. Trample lets excess combat damage go to the player.
605.1a An activated ability is a mana ability if it could add mana to a player's mana pool.";

fn seg(id: &str, text: &str) -> CorpusSegment {
    CorpusSegment {
        segment_id: id.to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn test_build_write_load_round_trip() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("index.sqlite");

    let segments = segment_rules(RULES, 1500);
    assert_eq!(segments.len(), 4);

    let embedder = KeywordEmbedder::new("keyword-test");
    let built = build_index(&embedder, segments.clone(), 2).await.unwrap();
    assert_eq!(built.len(), 4);
    assert_eq!(built.dims(), 5);

    index::write(&path, &built, "abc123").await.unwrap();
    let loaded = index::load(&path).await.unwrap();

    assert_eq!(loaded.segments(), segments.as_slice());
    assert_eq!(loaded.embeddings(), built.embeddings());
    assert_eq!(loaded.embedding_model_id(), "keyword-test");

    let summary = index::summarize(&path).await.unwrap();
    assert_eq!(summary.segment_count, 4);
    assert_eq!(summary.vector_count, 4);
    assert_eq!(summary.model.as_deref(), Some("keyword-test"));
    assert_eq!(summary.dims.as_deref(), Some("5"));
    assert_eq!(summary.corpus_sha256.as_deref(), Some("abc123"));
    assert!(summary.built_at.is_some());
}

#[tokio::test]
async fn test_rebuild_replaces_contents() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("index.sqlite");
    let embedder = KeywordEmbedder::new("keyword-test");

    let first = build_index(&embedder, segment_rules(RULES, 1500), 64)
        .await
        .unwrap();
    index::write(&path, &first, "one").await.unwrap();

    let second = build_index(&embedder, vec![seg("100.1", "mana")], 64)
        .await
        .unwrap();
    index::write(&path, &second, "two").await.unwrap();

    let loaded = index::load(&path).await.unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.segments()[0].segment_id, "100.1");
}

#[tokio::test]
async fn test_build_fails_when_provider_fails() {
    let err = build_index(&FailingEmbedder, vec![seg("100.1", "x")], 8)
        .await
        .unwrap_err();
    assert!(format!("{:#}", err).contains("provider offline"));
}

#[tokio::test]
async fn test_load_missing_file() {
    let tmp = TempDir::new().unwrap();
    let err = index::load(&tmp.path().join("missing.sqlite"))
        .await
        .unwrap_err();
    assert!(matches!(err, IndexError::Unavailable { .. }));
    assert!(err.to_string().contains("vector index unavailable"));
}

#[test]
fn test_misaligned_index_is_corrupt() {
    let err = VectorIndex::new(
        vec![seg("1", "a"), seg("2", "b")],
        vec![vec![1.0, 0.0]],
        "m",
    )
    .unwrap_err();
    assert!(matches!(err, IndexError::Corrupt(_)));
}

#[tokio::test]
async fn test_retrieval_ranks_by_similarity() {
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let index = build_index(embedder.as_ref(), segment_rules(RULES, 1500), 64)
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(index), embedder.clone(), 5).unwrap();

    let results = retriever
        .retrieve("How does trample assign damage to a blocking creature?", &[], 2)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0].text.contains("trample"));
}

#[tokio::test]
async fn test_retrieval_is_deterministic() {
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let index = build_index(embedder.as_ref(), segment_rules(RULES, 1500), 64)
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(index), embedder, 5).unwrap();

    let query = "flying creatures in combat";
    let a = retriever.retrieve(query, &[], 4).await.unwrap();
    let b = retriever.retrieve(query, &[], 4).await.unwrap();
    assert_eq!(a, b);
}

#[tokio::test]
async fn test_top_k_larger_than_index() {
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let index = build_index(embedder.as_ref(), segment_rules(RULES, 1500), 64)
        .await
        .unwrap();
    let retriever = Retriever::new(Arc::new(index), embedder, 5).unwrap();

    let results = retriever.retrieve("mana", &[], 50).await.unwrap();
    assert_eq!(results.len(), 4);
}

#[tokio::test]
async fn test_short_query_uses_previous_user_turn() {
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let index = VectorIndex::new(vec![seg("1", "mana")], vec![vec![0.0, 0.0, 1.0, 0.0, 0.1]], "keyword-test")
        .unwrap();
    let retriever = Retriever::new(Arc::new(index), embedder.clone(), 5).unwrap();

    let history = vec![
        "Does trample work against chump blockers?".to_string(),
        "Yes, excess damage carries over.".to_string(),
    ];
    retriever.retrieve("and deathtouch?", &history, 3).await.unwrap();
    retriever
        .retrieve("what happens when a trampler is blocked by two creatures", &history, 3)
        .await
        .unwrap();

    let seen = embedder.seen();
    assert_eq!(
        seen[0],
        "Does trample work against chump blockers? and deathtouch?"
    );
    assert_eq!(
        seen[1],
        "what happens when a trampler is blocked by two creatures"
    );
}

#[tokio::test]
async fn test_empty_index_skips_embedding() {
    let embedder = Arc::new(KeywordEmbedder::new("keyword-test"));
    let index = VectorIndex::new(vec![], vec![], "keyword-test").unwrap();
    let retriever = Retriever::new(Arc::new(index), embedder.clone(), 5).unwrap();

    assert!(retriever.retrieve("trample", &[], 5).await.unwrap().is_empty());
    assert!(embedder.seen().is_empty());
}

#[tokio::test]
async fn test_model_mismatch_rejected() {
    let index = VectorIndex::new(vec![seg("1", "x")], vec![vec![1.0]], "model-a").unwrap();
    let embedder = Arc::new(KeywordEmbedder::new("model-b"));
    assert!(Retriever::new(Arc::new(index), embedder, 5).is_err());
}
