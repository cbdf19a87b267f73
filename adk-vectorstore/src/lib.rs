//! # adk-vectorstore
//!
//! A document-level adapter over external vector databases for ADK-Rust.
//!
//! The adapter maps [`Document`]s (text plus nested JSON metadata) onto the
//! rows of a vector collection: one text column, one column per declared
//! metadata path, and the embedding vector. Embeddings come from an
//! [`EmbeddingProvider`]; storage and nearest-neighbour search are delegated
//! to a [`VectorClient`].
//!
//! ## Features
//!
//! - **Dotted-path metadata projection**: declare `"deep.deepdeep.string"`
//!   and it is stored in `deep_deepdeep_string`, then rebuilt on the way out
//! - **Upsert by id** and **delete by id or filter**
//! - **Opaque filters**: each client brings its own filter type
//! - **Backends**: in-memory (always), Qdrant (`qdrant` feature)
//! - **Embedders**: any [`EmbeddingProvider`], OpenAI (`openai` feature)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_vectorstore::{FieldFilter, InMemoryClient, StoreConfig, VectorStoreAdapter};
//!
//! let config = StoreConfig::builder("Docs").metadata_key("foo").build()?;
//! let store = VectorStoreAdapter::from_texts(
//!     Arc::new(InMemoryClient::new()),
//!     embedder,
//!     &["hello world", "hi there"],
//!     &metadatas,
//!     config,
//! )
//! .await?;
//!
//! let filter = FieldFilter::equal("foo", "baz");
//! let docs = store.similarity_search("hello world", 1, Some(&filter)).await?;
//! ```

pub mod client;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod inmemory;
pub mod metadata;
pub mod mmr;
pub mod store;

#[cfg(feature = "openai")]
pub mod openai;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use client::{CollectionSchema, NearestQuery, Record, Row, VectorClient};
pub use config::{DEFAULT_TEXT_KEY, StoreConfig, StoreConfigBuilder};
pub use document::{Document, Metadata, ScoredDocument};
pub use embedding::EmbeddingProvider;
pub use error::{Result, StoreError};
pub use inmemory::{FieldFilter, InMemoryClient};
pub use metadata::{MetadataSchema, column_name};
pub use store::{DeleteRequest, MmrOptions, VectorStoreAdapter};

#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
#[cfg(feature = "qdrant")]
pub use qdrant::QdrantClient;
