//! The database client seam the adapter writes through.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// Shape of a collection created by [`VectorClient::create_collection_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Column holding the document text.
    pub text_key: String,
    /// Flattened metadata columns, in declaration order.
    pub properties: Vec<String>,
    /// Length of every stored vector.
    pub dimensions: usize,
}

/// A row to be written: scalar fields plus the embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub fields: Map<String, Value>,
    pub vector: Vec<f32>,
}

/// A row returned by [`VectorClient::query_nearest`].
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Identifier assigned when the row was written.
    pub id: String,
    /// Stored scalar fields.
    pub fields: Map<String, Value>,
    /// Distance to the query vector (lower is closer).
    pub distance: f32,
    /// The stored vector, when the query asked for vectors.
    pub vector: Option<Vec<f32>>,
}

/// Parameters for a nearest-neighbour query.
#[derive(Debug)]
pub struct NearestQuery<'a, F> {
    pub vector: &'a [f32],
    pub k: usize,
    pub filter: Option<&'a F>,
    pub include_vectors: bool,
}

impl<'a, F> NearestQuery<'a, F> {
    pub fn new(vector: &'a [f32], k: usize) -> Self {
        Self { vector, k, filter: None, include_vectors: false }
    }

    pub fn filter(mut self, filter: Option<&'a F>) -> Self {
        self.filter = filter;
        self
    }

    pub fn include_vectors(mut self, include: bool) -> Self {
        self.include_vectors = include;
        self
    }
}

/// A vector database client exposing named collections of rows.
///
/// Filters are a backend-specific type built with the backend's own
/// builder; the adapter hands them over without looking inside.
///
/// # Example
///
/// ```rust,ignore
/// use adk_vectorstore::{InMemoryClient, NearestQuery, VectorClient};
///
/// let client = InMemoryClient::new();
/// client.create_collection_if_absent(&schema).await?;
/// let ids = client.insert("Docs", records).await?;
/// let rows = client.query_nearest("Docs", NearestQuery::new(&query, 5)).await?;
/// ```
#[async_trait]
pub trait VectorClient: Send + Sync {
    /// Predicate type accepted by [`query_nearest`](Self::query_nearest) and
    /// [`delete_by_filter`](Self::delete_by_filter).
    type Filter: Send + Sync;

    /// Whether a collection with this name exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create the collection. No-op if it already exists.
    async fn create_collection_if_absent(&self, schema: &CollectionSchema) -> Result<()>;

    /// Delete a collection and all its rows.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert rows under freshly assigned ids, returned in input order.
    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<Vec<String>>;

    /// Replace the row with this id, or create it if absent.
    async fn upsert(&self, collection: &str, id: &str, record: Record) -> Result<()>;

    /// Upsert `records` under the matching `ids`.
    ///
    /// The default upserts one row at a time, so a failure part-way leaves
    /// earlier rows written. Backends that can check every row up front, or
    /// write a batch in one request, should override it so a rejected batch
    /// writes nothing.
    async fn upsert_many(
        &self,
        collection: &str,
        ids: &[String],
        records: Vec<Record>,
    ) -> Result<()> {
        for (id, record) in ids.iter().zip(records) {
            self.upsert(collection, id, record).await?;
        }
        Ok(())
    }

    /// Delete rows by id. Unknown ids are ignored.
    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<()>;

    /// Delete every row matching the filter.
    async fn delete_by_filter(&self, collection: &str, filter: &Self::Filter) -> Result<()>;

    /// Return at most `query.k` rows ordered by ascending distance.
    async fn query_nearest(
        &self,
        collection: &str,
        query: NearestQuery<'_, Self::Filter>,
    ) -> Result<Vec<Row>>;
}
