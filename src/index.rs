//! Vector index store.
//!
//! The index is an SQLite file written once by `judge index build` and
//! loaded whole into memory at process start. After [`load`] returns, the
//! [`VectorIndex`] is immutable and can be shared across concurrent turns
//! behind an `Arc` without locking.
//!
//! # Schema
//!
//! | Table | Contents |
//! |-------|----------|
//! | `segments` | `position`, `segment_id`, `text` in corpus order |
//! | `segment_vectors` | `position`, `dims`, little-endian f32 `embedding` |
//! | `index_meta` | `model`, `dims`, `corpus_sha256`, `built_at` |

use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::IndexError;
use crate::migrate;
use crate::models::CorpusSegment;

const META_MODEL: &str = "model";
const META_DIMS: &str = "dims";
const META_CORPUS_SHA: &str = "corpus_sha256";
const META_BUILT_AT: &str = "built_at";

/// Rule segments with one embedding each, aligned by position.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    segments: Vec<CorpusSegment>,
    embeddings: Vec<Vec<f32>>,
    embedding_model_id: String,
}

impl VectorIndex {
    /// Build an index, rejecting misaligned segment and embedding lists.
    pub fn new(
        segments: Vec<CorpusSegment>,
        embeddings: Vec<Vec<f32>>,
        embedding_model_id: impl Into<String>,
    ) -> Result<Self, IndexError> {
        if segments.len() != embeddings.len() {
            return Err(IndexError::Corrupt(format!(
                "{} segments but {} embeddings",
                segments.len(),
                embeddings.len()
            )));
        }
        Ok(Self {
            segments,
            embeddings,
            embedding_model_id: embedding_model_id.into(),
        })
    }

    pub fn segments(&self) -> &[CorpusSegment] {
        &self.segments
    }

    pub fn embeddings(&self) -> &[Vec<f32>] {
        &self.embeddings
    }

    /// The model every stored vector was produced with. Queries must use it too.
    pub fn embedding_model_id(&self) -> &str {
        &self.embedding_model_id
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Dimensionality of the stored vectors, or 0 for an empty index.
    pub fn dims(&self) -> usize {
        self.embeddings.first().map(Vec::len).unwrap_or(0)
    }
}

/// Summary of an index file, read without loading the vectors.
#[derive(Debug, Clone)]
pub struct IndexSummary {
    pub segment_count: i64,
    pub vector_count: i64,
    pub model: Option<String>,
    pub dims: Option<String>,
    pub corpus_sha256: Option<String>,
    pub built_at: Option<String>,
}

fn unavailable(path: &Path, reason: impl ToString) -> IndexError {
    IndexError::Unavailable {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

/// Load a prebuilt index from `path`.
///
/// # Errors
///
/// [`IndexError::Unavailable`] if the file is missing or unreadable,
/// [`IndexError::Corrupt`] if the stored vectors do not line up with
/// the stored segments.
pub async fn load(path: &Path) -> Result<VectorIndex, IndexError> {
    if !path.exists() {
        return Err(unavailable(path, "no index file; run `judge index build`"));
    }

    let pool = db::connect_existing(path)
        .await
        .map_err(|e| unavailable(path, e))?;

    let result = read_index(&pool, path).await;
    pool.close().await;
    let index = result?;

    tracing::info!(
        segments = index.len(),
        model = %index.embedding_model_id,
        path = %path.display(),
        "vector index loaded"
    );
    Ok(index)
}

async fn read_index(pool: &SqlitePool, path: &Path) -> Result<VectorIndex, IndexError> {
    let model: String = sqlx::query_scalar("SELECT value FROM index_meta WHERE key = ?")
        .bind(META_MODEL)
        .fetch_one(pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => unavailable(path, "index metadata missing"),
            other => unavailable(path, other),
        })?;

    let rows = sqlx::query(
        r#"
        SELECT s.position, s.segment_id, s.text, v.embedding
        FROM segments s
        LEFT JOIN segment_vectors v ON v.position = s.position
        ORDER BY s.position ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|e| unavailable(path, e))?;

    let mut segments = Vec::with_capacity(rows.len());
    let mut embeddings = Vec::with_capacity(rows.len());

    for row in &rows {
        let position: i64 = row.get("position");
        let blob: Option<Vec<u8>> = row.get("embedding");
        let Some(blob) = blob else {
            return Err(IndexError::Corrupt(format!(
                "segment at position {} has no embedding",
                position
            )));
        };
        segments.push(CorpusSegment {
            segment_id: row.get("segment_id"),
            text: row.get("text"),
        });
        embeddings.push(blob_to_vec(&blob));
    }

    if let Some(first) = embeddings.first() {
        let dims = first.len();
        if let Some(bad) = embeddings.iter().position(|v| v.len() != dims) {
            return Err(IndexError::Corrupt(format!(
                "embedding at position {} has {} dims, expected {}",
                bad,
                embeddings[bad].len(),
                dims
            )));
        }
    }

    VectorIndex::new(segments, embeddings, model)
}

/// Replace the contents of the index file at `path` with `index`.
pub async fn write(path: &Path, index: &VectorIndex, corpus_sha256: &str) -> anyhow::Result<()> {
    let pool = db::connect(path).await?;
    migrate::create_schema(&pool).await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM segment_vectors")
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM segments").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM index_meta").execute(&mut *tx).await?;

    for (position, (segment, vector)) in index.segments.iter().zip(&index.embeddings).enumerate() {
        sqlx::query("INSERT INTO segments (position, segment_id, text) VALUES (?, ?, ?)")
            .bind(position as i64)
            .bind(&segment.segment_id)
            .bind(&segment.text)
            .execute(&mut *tx)
            .await?;

        sqlx::query("INSERT INTO segment_vectors (position, dims, embedding) VALUES (?, ?, ?)")
            .bind(position as i64)
            .bind(vector.len() as i64)
            .bind(vec_to_blob(vector))
            .execute(&mut *tx)
            .await?;
    }

    let built_at = chrono::Utc::now().to_rfc3339();
    let dims = index.dims().to_string();
    for (key, value) in [
        (META_MODEL, index.embedding_model_id.as_str()),
        (META_DIMS, dims.as_str()),
        (META_CORPUS_SHA, corpus_sha256),
        (META_BUILT_AT, built_at.as_str()),
    ] {
        sqlx::query("INSERT INTO index_meta (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    pool.close().await;
    Ok(())
}

/// Read counts and metadata from an index file.
pub async fn summarize(path: &Path) -> Result<IndexSummary, IndexError> {
    if !path.exists() {
        return Err(unavailable(path, "no index file; run `judge index build`"));
    }
    let pool = db::connect_existing(path)
        .await
        .map_err(|e| unavailable(path, e))?;

    let summary = read_summary(&pool).await.map_err(|e| unavailable(path, e));
    pool.close().await;
    summary
}

async fn read_summary(pool: &SqlitePool) -> Result<IndexSummary, sqlx::Error> {
    let segment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segments")
        .fetch_one(pool)
        .await?;
    let vector_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segment_vectors")
        .fetch_one(pool)
        .await?;

    let mut summary = IndexSummary {
        segment_count,
        vector_count,
        model: None,
        dims: None,
        corpus_sha256: None,
        built_at: None,
    };

    for row in sqlx::query("SELECT key, value FROM index_meta")
        .fetch_all(pool)
        .await?
    {
        let key: String = row.get("key");
        let value: String = row.get("value");
        match key.as_str() {
            META_MODEL => summary.model = Some(value),
            META_DIMS => summary.dims = Some(value),
            META_CORPUS_SHA => summary.corpus_sha256 = Some(value),
            META_BUILT_AT => summary.built_at = Some(value),
            _ => {}
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(id: &str) -> CorpusSegment {
        CorpusSegment {
            segment_id: id.to_string(),
            text: format!("text of {}", id),
        }
    }

    #[test]
    fn test_new_rejects_misaligned() {
        let err = VectorIndex::new(vec![seg("100.1")], vec![], "m").unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }

    #[test]
    fn test_empty_index_has_zero_dims() {
        let index = VectorIndex::new(vec![], vec![], "m").unwrap();
        assert!(index.is_empty());
        assert_eq!(index.dims(), 0);
    }

    #[tokio::test]
    async fn test_load_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope.sqlite")).await.unwrap_err();
        assert!(matches!(err, IndexError::Unavailable { .. }));
    }
}
