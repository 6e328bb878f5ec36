//! Offline index commands: `judge index build` and `judge stats`.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::chunk::segment_rules;
use crate::config::Config;
use crate::embedding::{self, EmbeddingProvider};
use crate::index::{self, VectorIndex};
use crate::models::CorpusSegment;

/// Segment the rules file, embed every segment, and replace the index.
pub async fn run_index_build(config: &Config, rules_path: &Path, dry_run: bool) -> Result<()> {
    let text = std::fs::read_to_string(rules_path)
        .with_context(|| format!("Failed to read rules file: {}", rules_path.display()))?;
    // The published rules file ships with a byte-order mark.
    let text = text.trim_start_matches('\u{feff}');

    let segments = segment_rules(text, config.chunking.max_chars);
    let corpus_sha256 = format!("{:x}", Sha256::digest(text.as_bytes()));

    if dry_run {
        println!("index build (dry-run)");
        println!("  rules file: {}", rules_path.display());
        println!("  segments: {}", segments.len());
        println!("  corpus sha256: {}", corpus_sha256);
        return Ok(());
    }

    if segments.is_empty() {
        bail!("No rule segments found in {}", rules_path.display());
    }
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config.");
    }

    let provider = embedding::create_provider(&config.embedding)?;
    let index = build_index(provider.as_ref(), segments, config.embedding.batch_size).await?;
    index::write(&config.index.path, &index, &corpus_sha256).await?;

    println!("index build");
    println!("  segments: {}", index.len());
    println!("  model: {} ({} dims)", index.embedding_model_id(), index.dims());
    println!("  written to: {}", config.index.path.display());
    Ok(())
}

/// Embed `segments` in batches. Any failed batch aborts the build; a
/// partial index would silently drop rules from retrieval.
pub async fn build_index(
    provider: &dyn EmbeddingProvider,
    segments: Vec<CorpusSegment>,
    batch_size: usize,
) -> Result<VectorIndex> {
    let total = segments.len();
    let mut embeddings = Vec::with_capacity(total);

    for (batch_no, batch) in segments.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|s| s.text.clone()).collect();
        let vectors = provider
            .embed(&texts)
            .await
            .with_context(|| format!("embedding batch {} failed", batch_no + 1))?;
        if vectors.len() != texts.len() {
            bail!(
                "provider returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            );
        }
        embeddings.extend(vectors);
        tracing::info!(done = embeddings.len(), total, "embedded rule segments");
    }

    Ok(VectorIndex::new(segments, embeddings, provider.model_name())?)
}

/// Print a summary of the index file.
pub async fn run_stats(config: &Config) -> Result<()> {
    let summary = index::summarize(&config.index.path).await?;

    let size = std::fs::metadata(&config.index.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("MTG Judge — Index Stats");
    println!("=======================");
    println!();
    println!("  Index:       {}", config.index.path.display());
    println!("  Size:        {}", format_bytes(size));
    println!();
    println!("  Segments:    {}", summary.segment_count);
    println!("  Embedded:    {}", summary.vector_count);
    println!("  Model:       {}", summary.model.as_deref().unwrap_or("-"));
    println!("  Dims:        {}", summary.dims.as_deref().unwrap_or("-"));
    println!("  Corpus hash: {}", summary.corpus_sha256.as_deref().unwrap_or("-"));
    println!("  Built at:    {}", summary.built_at.as_deref().unwrap_or("-"));
    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
