//! The document-level adapter over a [`VectorClient`].
//!
//! [`VectorStoreAdapter`] turns [`Document`]s into collection rows (text
//! column, flattened metadata columns, embedding vector) and back. All
//! persistent state lives in the backing collection; the adapter only holds
//! the client handle, the embedder, and its [`StoreConfig`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_vectorstore::{
//!     DeleteRequest, FieldFilter, InMemoryClient, StoreConfig, VectorStoreAdapter,
//! };
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
//! let docs = store.similarity_search("hello", 1, None).await?;
//! store.delete(DeleteRequest::Filter(FieldFilter::equal("foo", "bar"))).await?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info};

use crate::client::{CollectionSchema, NearestQuery, Record, Row, VectorClient};
use crate::config::StoreConfig;
use crate::document::{Document, Metadata, ScoredDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{Result, StoreError};
use crate::mmr::maximal_marginal_relevance;

/// What [`VectorStoreAdapter::delete`] should remove.
///
/// Ids and filters cannot be combined in one call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteRequest<F> {
    /// Remove exactly these rows. Unknown ids are ignored.
    Ids(Vec<String>),
    /// Remove every row currently matching the filter.
    Filter(F),
}

impl<F> DeleteRequest<F> {
    /// Build an id-based request.
    pub fn ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Ids(ids.into_iter().map(Into::into).collect())
    }
}

/// Parameters for [`VectorStoreAdapter::max_marginal_relevance_search`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MmrOptions {
    /// Number of documents to return.
    pub k: usize,
    /// Number of nearest candidates to choose from.
    pub fetch_k: usize,
    /// Trade-off between relevance (1.0) and diversity (0.0).
    pub lambda: f32,
}

impl Default for MmrOptions {
    fn default() -> Self {
        Self { k: 4, fetch_k: 20, lambda: 0.5 }
    }
}

/// Maps documents onto a vector collection reached through a [`VectorClient`].
///
/// Cloning is cheap; clones share the client and embedder.
pub struct VectorStoreAdapter<C: VectorClient> {
    client: Arc<C>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: StoreConfig,
}

impl<C: VectorClient> Clone for VectorStoreAdapter<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            embedder: Arc::clone(&self.embedder),
            config: self.config.clone(),
        }
    }
}

impl<C: VectorClient> std::fmt::Debug for VectorStoreAdapter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStoreAdapter")
            .field("config", &self.config)
            .field("embedder", &self.embedder.name())
            .finish_non_exhaustive()
    }
}

impl<C: VectorClient> VectorStoreAdapter<C> {
    /// Bind to a collection without contacting the backend.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if `config` is invalid.
    pub fn new(
        client: Arc<C>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: StoreConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, embedder, config })
    }

    /// Bind to a collection that must already exist.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CollectionNotFound`] if it does not.
    pub async fn from_existing_index(
        client: Arc<C>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: StoreConfig,
    ) -> Result<Self> {
        let store = Self::new(client, embedder, config)?;
        if !store.client.collection_exists(store.collection()).await? {
            return Err(StoreError::CollectionNotFound(store.config.index_name.clone()));
        }
        Ok(store)
    }

    /// Create the collection if needed and insert `texts` with `metadatas`.
    ///
    /// Calling this twice with the same index name adds to the existing
    /// collection rather than replacing it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if the slices differ in length or
    /// the config is invalid; embedder and backend errors are passed through.
    pub async fn from_texts<T: AsRef<str>>(
        client: Arc<C>,
        embedder: Arc<dyn EmbeddingProvider>,
        texts: &[T],
        metadatas: &[Metadata],
        config: StoreConfig,
    ) -> Result<Self> {
        check_lengths("texts", texts.len(), "metadatas", metadatas.len())?;
        let store = Self::new(client, embedder, config)?;
        store.ensure_collection().await?;
        store.add_texts(texts, metadatas).await?;
        Ok(store)
    }

    /// [`from_texts`](Self::from_texts) for documents. Their ids are ignored.
    pub async fn from_documents(
        client: Arc<C>,
        embedder: Arc<dyn EmbeddingProvider>,
        documents: &[Document],
        config: StoreConfig,
    ) -> Result<Self> {
        let store = Self::new(client, embedder, config)?;
        store.ensure_collection().await?;
        store.add_documents(documents, None).await?;
        Ok(store)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    fn collection(&self) -> &str {
        &self.config.index_name
    }

    /// The schema used when creating the backing collection.
    pub fn schema(&self) -> CollectionSchema {
        CollectionSchema {
            name: self.config.index_name.clone(),
            text_key: self.config.text_key.clone(),
            properties: self.config.metadata_keys.columns(),
            dimensions: self.embedder.dimensions(),
        }
    }

    /// Create the backing collection unless it already exists.
    pub async fn ensure_collection(&self) -> Result<()> {
        self.client.create_collection_if_absent(&self.schema()).await.inspect_err(|e| {
            error!(collection = self.collection(), error = %e, "failed to ensure collection");
        })
    }

    /// Delete the backing collection and every row in it.
    pub async fn drop_collection(&self) -> Result<()> {
        self.client.delete_collection(self.collection()).await.inspect_err(|e| {
            error!(collection = self.collection(), error = %e, "failed to drop collection");
        })?;
        info!(collection = self.collection(), "dropped collection");
        Ok(())
    }

    /// Insert texts as new rows. Returns their ids in input order.
    pub async fn add_texts<T: AsRef<str>>(
        &self,
        texts: &[T],
        metadatas: &[Metadata],
    ) -> Result<Vec<String>> {
        check_lengths("texts", texts.len(), "metadatas", metadatas.len())?;
        let texts: Vec<&str> = texts.iter().map(AsRef::as_ref).collect();
        let vectors = self.embed_all(&texts).await?;
        let records = texts
            .iter()
            .zip(metadatas)
            .zip(vectors)
            .map(|((text, metadata), vector)| self.record(text, metadata, vector))
            .collect();
        self.write(records, None).await
    }

    /// Write documents, re-embedding each from its current text.
    ///
    /// With `ids`, each document is upserted under the matching id: an
    /// existing row is replaced whole, a missing one is created. Without
    /// `ids`, every document becomes a new row with a fresh id. Returns the
    /// ids used, in input order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if `ids` and `documents` differ in length.
    pub async fn add_documents(
        &self,
        documents: &[Document],
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        if let Some(ids) = ids {
            check_lengths("ids", ids.len(), "documents", documents.len())?;
        }
        let texts: Vec<&str> = documents.iter().map(|d| d.page_content.as_str()).collect();
        let vectors = self.embed_all(&texts).await?;
        self.add_vectors(vectors, documents, ids).await
    }

    /// Write documents with precomputed vectors. Same id semantics as
    /// [`add_documents`](Self::add_documents).
    pub async fn add_vectors(
        &self,
        vectors: Vec<Vec<f32>>,
        documents: &[Document],
        ids: Option<&[String]>,
    ) -> Result<Vec<String>> {
        check_lengths("vectors", vectors.len(), "documents", documents.len())?;
        if let Some(ids) = ids {
            check_lengths("ids", ids.len(), "documents", documents.len())?;
        }
        let records = documents
            .iter()
            .zip(vectors)
            .map(|(doc, vector)| self.record(&doc.page_content, &doc.metadata, vector))
            .collect();
        self.write(records, ids).await
    }

    /// Return up to `k` documents closest to `query`, closest first.
    ///
    /// Zero matches is an empty result, not an error.
    pub async fn similarity_search(
        &self,
        query: &str,
        k: usize,
        filter: Option<&C::Filter>,
    ) -> Result<Vec<Document>> {
        let hits = self.similarity_search_with_score(query, k, filter).await?;
        Ok(hits.into_iter().map(|hit| hit.document).collect())
    }

    /// Like [`similarity_search`](Self::similarity_search), keeping distances.
    pub async fn similarity_search_with_score(
        &self,
        query: &str,
        k: usize,
        filter: Option<&C::Filter>,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = self.embed_query(query).await?;
        self.similarity_search_by_vector(&vector, k, filter).await
    }

    /// Return up to `k` documents closest to `vector`, closest first.
    pub async fn similarity_search_by_vector(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&C::Filter>,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let rows = self.query(NearestQuery::new(vector, k).filter(filter)).await?;
        let hits: Vec<ScoredDocument> = rows
            .into_iter()
            .take(k)
            .map(|row| {
                let distance = row.distance;
                ScoredDocument { document: self.document(row), distance }
            })
            .collect();

        info!(collection = self.collection(), k, result_count = hits.len(), "similarity search");
        Ok(hits)
    }

    /// Pick `options.k` documents among the `options.fetch_k` nearest,
    /// trading relevance for diversity according to `options.lambda`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if `lambda` is outside `[0, 1]`, and
    /// [`StoreError::BackendError`] if the backend omits stored vectors.
    pub async fn max_marginal_relevance_search(
        &self,
        query: &str,
        options: MmrOptions,
        filter: Option<&C::Filter>,
    ) -> Result<Vec<Document>> {
        if !(0.0..=1.0).contains(&options.lambda) {
            return Err(StoreError::ConfigError(format!(
                "lambda must be within [0, 1], got {}",
                options.lambda
            )));
        }
        if options.k == 0 {
            return Ok(Vec::new());
        }

        let vector = self.embed_query(query).await?;
        let fetch_k = options.fetch_k.max(options.k);
        let rows = self
            .query(NearestQuery::new(&vector, fetch_k).filter(filter).include_vectors(true))
            .await?;

        let candidates = rows
            .iter()
            .map(|row| {
                row.vector.clone().ok_or_else(|| {
                    let message = format!("row '{}' returned without vector", row.id);
                    StoreError::backend("client", message)
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let selected = maximal_marginal_relevance(&vector, &candidates, options.k, options.lambda);
        let mut rows: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
        let documents: Vec<Document> = selected
            .into_iter()
            .filter_map(|i| rows.get_mut(i).and_then(Option::take))
            .map(|row| self.document(row))
            .collect();

        info!(
            collection = self.collection(),
            fetch_k,
            result_count = documents.len(),
            "max marginal relevance search"
        );
        Ok(documents)
    }

    /// Delete rows by id or by filter. Deleting nothing is not an error.
    pub async fn delete(&self, request: DeleteRequest<C::Filter>) -> Result<()> {
        match request {
            DeleteRequest::Ids(ids) => {
                if ids.is_empty() {
                    return Ok(());
                }
                self.client.delete_by_ids(self.collection(), &ids).await.inspect_err(|e| {
                    error!(collection = self.collection(), error = %e, "delete by ids failed");
                })?;
                info!(collection = self.collection(), count = ids.len(), "deleted by ids");
            }
            DeleteRequest::Filter(filter) => {
                self.client.delete_by_filter(self.collection(), &filter).await.inspect_err(
                    |e| {
                        error!(collection = self.collection(), error = %e, "delete by filter");
                    },
                )?;
                info!(collection = self.collection(), "deleted by filter");
            }
        }
        Ok(())
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        self.embedder.embed(query).await.inspect_err(|e| {
            error!(embedder = self.embedder.name(), error = %e, "query embedding failed");
        })
    }

    /// Embed all texts in one batch, checking the provider kept them 1:1.
    async fn embed_all(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.embedder.embed_batch(texts).await.inspect_err(|e| {
            error!(embedder = self.embedder.name(), error = %e, "batch embedding failed");
        })?;
        if vectors.len() != texts.len() {
            return Err(StoreError::embedding(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", texts.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }

    async fn query(&self, query: NearestQuery<'_, C::Filter>) -> Result<Vec<Row>> {
        self.client.query_nearest(self.collection(), query).await.inspect_err(|e| {
            error!(collection = self.collection(), error = %e, "nearest query failed");
        })
    }

    async fn write(&self, records: Vec<Record>, ids: Option<&[String]>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let count = records.len();

        let ids = match ids {
            None => {
                let ids = self.client.insert(self.collection(), records).await.inspect_err(|e| {
                    error!(collection = self.collection(), error = %e, "insert failed");
                })?;
                if ids.len() != count {
                    return Err(StoreError::backend(
                        "client",
                        format!("insert of {count} records returned {} ids", ids.len()),
                    ));
                }
                ids
            }
            Some(ids) => {
                self.client.upsert_many(self.collection(), ids, records).await.inspect_err(
                    |e| {
                        error!(collection = self.collection(), error = %e, "upsert failed");
                    },
                )?;
                ids.to_vec()
            }
        };

        info!(collection = self.collection(), count, "wrote documents");
        Ok(ids)
    }

    fn record(&self, text: &str, metadata: &Metadata, vector: Vec<f32>) -> Record {
        let mut fields = self.config.metadata_keys.flatten(metadata);
        fields.insert(self.config.text_key.clone(), Value::String(text.to_string()));
        Record { fields, vector }
    }

    fn document(&self, row: Row) -> Document {
        let page_content = row
            .fields
            .get(&self.config.text_key)
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_default();
        Document {
            id: Some(row.id),
            page_content,
            metadata: self.config.metadata_keys.unflatten(&row.fields),
        }
    }
}

fn check_lengths(left: &str, left_len: usize, right: &str, right_len: usize) -> Result<()> {
    if left_len != right_len {
        return Err(StoreError::ConfigError(format!(
            "{left} ({left_len}) and {right} ({right_len}) must have the same length"
        )));
    }
    Ok(())
}
