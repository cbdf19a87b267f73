//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use adk_vectorstore::{
    EmbeddingProvider, InMemoryClient, Metadata, Result, StoreConfig, StoreError,
    VectorStoreAdapter,
};
use async_trait::async_trait;
use serde_json::Value;

pub const DIM: usize = 64;

/// Deterministic embedder hashing character trigrams into a fixed-size vector.
///
/// Identical texts embed identically; texts sharing many trigrams land close.
#[derive(Debug, Default)]
pub struct TrigramEmbedder {
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
}

impl TrigramEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; DIM];
        let padded: Vec<char> = format!("  {}  ", text.to_lowercase()).chars().collect();
        for window in padded.windows(3) {
            let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
            for c in window {
                hash ^= *c as u64;
                hash = hash.wrapping_mul(0x0100_0000_01b3);
            }
            vector[(hash % DIM as u64) as usize] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for TrigramEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIM
    }

    fn name(&self) -> &str {
        "trigram"
    }
}

/// Embedder that always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(StoreError::EmbeddingError {
            provider: "failing".to_string(),
            message: "model unavailable".to_string(),
        })
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Embedder that drops the last vector of every batch.
pub struct ShortBatchEmbedder;

#[async_trait]
impl EmbeddingProvider for ShortBatchEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(TrigramEmbedder::vector(text))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| TrigramEmbedder::vector(t)).collect();
        vectors.pop();
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn meta(value: Value) -> Metadata {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

pub fn config(index_name: &str, metadata_keys: &[&str]) -> StoreConfig {
    StoreConfig::builder(index_name).metadata_keys(metadata_keys.iter().copied()).build().unwrap()
}

pub const TEXTS: [&str; 4] = ["hello world", "hi there", "how are you", "bye now"];

pub fn foo_metadatas() -> Vec<Metadata> {
    ["bar", "baz", "qux", "bar"].iter().map(|foo| meta(serde_json::json!({ "foo": foo }))).collect()
}

/// The four-document store used by the end-to-end scenarios.
pub async fn foo_store() -> (Arc<InMemoryClient>, VectorStoreAdapter<InMemoryClient>) {
    init_tracing();
    let client = Arc::new(InMemoryClient::new());
    let store = VectorStoreAdapter::from_texts(
        Arc::clone(&client),
        Arc::new(TrigramEmbedder::default()),
        &TEXTS,
        &foo_metadatas(),
        config("Test", &["foo"]),
    )
    .await
    .unwrap();
    (client, store)
}
