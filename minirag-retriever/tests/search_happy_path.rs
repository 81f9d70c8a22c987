//! End-to-end tests: markdown tree → embedding pipeline → persisted index → search

use anyhow::Result;
use minirag_embed::{EmbeddingProvider, HashEmbedProvider};
use minirag_retriever::retrieval::{
    checkpoint::CheckpointStore,
    chunking_strategy::{ChunkingConfig, ChunkingStrategy},
    embedding_pipeline::{EmbeddingPipeline, PipelineConfig, PipelineOutcome},
    search::{search, try_search},
};
use minirag_retriever::storage::IndexFileStore;
use minirag_retriever::{ErrorKind, RetrieverError};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tokio::sync::watch;

fn write_docs(root: &Path) -> Result<()> {
    std::fs::create_dir_all(root.join("guides"))?;
    std::fs::write(
        root.join("intro.md"),
        "# Welcome\nminirag indexes markdown documentation\n\n# License\nreleased under the MIT license\n",
    )?;
    std::fs::write(
        root.join("guides/install.md"),
        "# Installation\ninstall the binary with cargo install\n\n## Configuration\nput settings in minirag.toml next to the docs\n",
    )?;
    Ok(())
}

async fn build_index(root: &Path, out: &Path) -> Result<IndexFileStore> {
    let chunks = ChunkingStrategy::new(ChunkingConfig::new(root)).load_chunks()?;
    let store = IndexFileStore::new(out.join("index.bin"));
    let pipeline = EmbeddingPipeline::new(
        Arc::new(HashEmbedProvider::new(128)?),
        PipelineConfig::default().with_concurrency(2),
        CheckpointStore::new(out.join("checkpoint.bin")),
        store.clone(),
    );

    let (_shutdown, signal) = watch::channel(false);
    let outcome = pipeline.run(chunks, signal).await?;
    assert!(outcome.is_completed());
    Ok(store)
}

#[tokio::test]
async fn test_exact_chunk_text_ranks_first() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    let store = build_index(docs.path(), out.path()).await?;

    let file = store.load().await?;
    assert_eq!(file.chunks.len(), 4);
    assert_eq!(file.document_count(), 2);
    assert_eq!(file.model_info, "hash-embedder-v1-d128");
    let (index, _) = file.into_index()?;

    let provider = HashEmbedProvider::new(128)?;
    let query = provider
        .embed_text("put settings in minirag.toml next to the docs")
        .await?;
    let results = search(&index, &query, 3, 0.0);

    assert!(!results.is_empty());
    assert_eq!(results[0].chunk.path, "guides/install.md");
    assert_eq!(results[0].chunk.heading, "Configuration");
    assert!((results[0].score - 1.0).abs() < 1e-5);
    assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
    Ok(())
}

#[tokio::test]
async fn test_threshold_and_top_k() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    let (index, _) = build_index(docs.path(), out.path())
        .await?
        .load()
        .await?
        .into_index()?;

    let query = HashEmbedProvider::new(128)?.embed_sync("released under the MIT license")?;

    let all = search(&index, &query, 0, -1.0);
    assert_eq!(all.len(), 4);
    assert_eq!(search(&index, &query, 1, -1.0).len(), 1);

    let strict = search(&index, &query, 0, 0.99);
    assert_eq!(strict.len(), 1);
    assert_eq!(strict[0].chunk.heading, "License");
    Ok(())
}

#[tokio::test]
async fn test_query_from_other_dimension_is_rejected() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    let (index, _) = build_index(docs.path(), out.path())
        .await?
        .load()
        .await?
        .into_index()?;

    let query = HashEmbedProvider::new(64)?.embed_sync("install the binary")?;

    assert!(search(&index, &query, 5, 0.0).is_empty());
    let err = try_search(&index, &query, 5, 0.0).unwrap_err();
    assert!(matches!(err, RetrieverError::DimensionMismatch { expected: 128, actual: 64 }));
    assert_eq!(err.kind(), ErrorKind::Input);
    Ok(())
}

#[tokio::test]
async fn test_regenerating_unchanged_docs_is_stable() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;

    let first = build_index(docs.path(), out.path()).await?.load().await?;
    let second = build_index(docs.path(), out.path()).await?.load().await?;

    assert_eq!(first, second);
    assert!(!out.path().join("checkpoint.bin").exists());
    Ok(())
}

#[tokio::test]
async fn test_surrounding_context_of_a_hit() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    let (index, _) = build_index(docs.path(), out.path())
        .await?
        .load()
        .await?
        .into_index()?;

    let query = HashEmbedProvider::new(128)?.embed_sync("install the binary with cargo install")?;
    let results = search(&index, &query, 1, 0.0);
    let around = index.surrounding_chunks(&results[0].chunk, 2);

    let headings: Vec<&str> = around.iter().map(|c| c.heading.as_str()).collect();
    assert_eq!(headings, vec!["Installation", "Configuration"]);
    Ok(())
}

#[tokio::test]
async fn test_outcome_reports_generation_counts() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    let chunks = ChunkingStrategy::new(ChunkingConfig::new(docs.path())).load_chunks()?;

    let pipeline = EmbeddingPipeline::new(
        Arc::new(HashEmbedProvider::new(32)?),
        PipelineConfig::default(),
        CheckpointStore::new(out.path().join("checkpoint.bin")),
        IndexFileStore::new(out.path().join("index.bin")),
    );
    let (_shutdown, signal) = watch::channel(false);

    match pipeline.run(chunks, signal).await? {
        PipelineOutcome::Completed {
            index,
            embedded,
            reused,
        } => {
            assert_eq!(embedded, 4);
            assert_eq!(reused, 0);
            assert_eq!(index.dimension, 32);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_empty_document_does_not_block_generation() -> Result<()> {
    let docs = tempdir()?;
    let out = tempdir()?;
    write_docs(docs.path())?;
    std::fs::write(docs.path().join("empty.md"), "\n")?;

    let file = build_index(docs.path(), out.path()).await?.load().await?;

    assert_eq!(file.chunks.len(), 4);
    assert!(file.chunks.iter().all(|c| c.path != "empty.md"));
    assert!(!out.path().join("checkpoint.bin").exists());
    Ok(())
}
