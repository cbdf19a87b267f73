//! In-memory vector client using cosine distance.
//!
//! [`InMemoryClient`] keeps collections in a `HashMap` behind a
//! `tokio::sync::RwLock`. It implements the full [`VectorClient`] contract,
//! including filtering through [`FieldFilter`], and is suitable for
//! development, testing, and small data sets.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::client::{CollectionSchema, NearestQuery, Record, Row, VectorClient};
use crate::error::{Result, StoreError};
use crate::mmr::cosine_distance;

const BACKEND: &str = "InMemory";

/// Predicate over stored columns, evaluated by [`InMemoryClient`].
///
/// # Example
///
/// ```rust,ignore
/// use adk_vectorstore::FieldFilter;
///
/// let filter = FieldFilter::equal("foo", "bar").or(FieldFilter::equal("foo", "baz"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FieldFilter {
    /// The column is present and equal to the value.
    Equal { column: String, value: Value },
    /// Every inner filter matches. An empty list matches everything.
    And(Vec<FieldFilter>),
    /// At least one inner filter matches. An empty list matches nothing.
    Or(Vec<FieldFilter>),
}

impl FieldFilter {
    /// Match rows whose `column` equals `value`.
    pub fn equal(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Equal { column: column.into(), value: value.into() }
    }

    /// Match rows matching every filter.
    pub fn all(filters: impl IntoIterator<Item = FieldFilter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Match rows matching any filter.
    pub fn any(filters: impl IntoIterator<Item = FieldFilter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    /// Combine with `other` so both must match.
    pub fn and(self, other: FieldFilter) -> Self {
        match self {
            Self::And(mut filters) => {
                filters.push(other);
                Self::And(filters)
            }
            first => Self::And(vec![first, other]),
        }
    }

    /// Combine with `other` so either may match.
    pub fn or(self, other: FieldFilter) -> Self {
        match self {
            Self::Or(mut filters) => {
                filters.push(other);
                Self::Or(filters)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Evaluate against a row's fields.
    pub fn matches(&self, fields: &Map<String, Value>) -> bool {
        match self {
            Self::Equal { column, value } => fields.get(column) == Some(value),
            Self::And(filters) => filters.iter().all(|f| f.matches(fields)),
            Self::Or(filters) => filters.iter().any(|f| f.matches(fields)),
        }
    }
}

#[derive(Debug, Clone)]
struct StoredRow {
    fields: Map<String, Value>,
    vector: Vec<f32>,
}

#[derive(Debug)]
struct Collection {
    schema: CollectionSchema,
    rows: HashMap<String, StoredRow>,
}

impl Collection {
    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.schema.dimensions {
            return Err(StoreError::backend(
                BACKEND,
                format!(
                    "vector has {} dimensions, collection '{}' expects {}",
                    vector.len(),
                    self.schema.name,
                    self.schema.dimensions
                ),
            ));
        }
        Ok(())
    }
}

/// An in-memory [`VectorClient`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use adk_vectorstore::{InMemoryClient, StoreConfig, VectorStoreAdapter};
///
/// let client = Arc::new(InMemoryClient::new());
/// let store = VectorStoreAdapter::from_texts(client, embedder, &texts, &metadatas, config).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryClient {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryClient {
    /// Create a new empty in-memory client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows in a collection, or `None` if it does not exist.
    pub async fn row_count(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(|c| c.rows.len())
    }

    /// The schema a collection was created with.
    pub async fn schema(&self, collection: &str) -> Option<CollectionSchema> {
        self.collections.read().await.get(collection).map(|c| c.schema.clone())
    }
}

fn not_found(collection: &str) -> StoreError {
    StoreError::CollectionNotFound(collection.to_string())
}

#[async_trait]
impl VectorClient for InMemoryClient {
    type Filter = FieldFilter;

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn create_collection_if_absent(&self, schema: &CollectionSchema) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&schema.name) {
            debug!(collection = %schema.name, "collection already exists, skipping creation");
            return Ok(());
        }
        collections.insert(
            schema.name.clone(),
            Collection { schema: schema.clone(), rows: HashMap::new() },
        );
        debug!(collection = %schema.name, dimensions = schema.dimensions, "created collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        debug!(collection = name, "deleted collection");
        Ok(())
    }

    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<Vec<String>> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        for record in &records {
            store.check_dimensions(&record.vector)?;
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            let id = Uuid::new_v4().to_string();
            store
                .rows
                .insert(id.clone(), StoredRow { fields: record.fields, vector: record.vector });
            ids.push(id);
        }
        debug!(collection, count = ids.len(), "inserted rows");
        Ok(ids)
    }

    async fn upsert(&self, collection: &str, id: &str, record: Record) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        store.check_dimensions(&record.vector)?;
        store
            .rows
            .insert(id.to_string(), StoredRow { fields: record.fields, vector: record.vector });
        debug!(collection, id, "upserted row");
        Ok(())
    }

    async fn upsert_many(
        &self,
        collection: &str,
        ids: &[String],
        records: Vec<Record>,
    ) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        for record in &records {
            store.check_dimensions(&record.vector)?;
        }

        for (id, record) in ids.iter().zip(records) {
            store
                .rows
                .insert(id.clone(), StoredRow { fields: record.fields, vector: record.vector });
        }
        debug!(collection, count = ids.len(), "upserted rows");
        Ok(())
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        let removed = ids.iter().filter(|id| store.rows.remove(id.as_str()).is_some()).count();
        debug!(collection, requested = ids.len(), removed, "deleted rows by id");
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &FieldFilter) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| not_found(collection))?;
        let before = store.rows.len();
        store.rows.retain(|_, row| !filter.matches(&row.fields));
        debug!(collection, removed = before - store.rows.len(), "deleted rows by filter");
        Ok(())
    }

    async fn query_nearest(
        &self,
        collection: &str,
        query: NearestQuery<'_, FieldFilter>,
    ) -> Result<Vec<Row>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| not_found(collection))?;
        store.check_dimensions(query.vector)?;

        let mut rows: Vec<Row> = store
            .rows
            .iter()
            .filter(|(_, row)| query.filter.is_none_or(|f| f.matches(&row.fields)))
            .map(|(id, row)| Row {
                id: id.clone(),
                fields: row.fields.clone(),
                distance: cosine_distance(query.vector, &row.vector),
                vector: query.include_vectors.then(|| row.vector.clone()),
            })
            .collect();

        rows.sort_by(|a, b| a.distance.total_cmp(&b.distance).then_with(|| a.id.cmp(&b.id)));
        rows.truncate(query.k);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn filter_combinators() {
        let row = fields(json!({ "foo": "bar", "n": 1 }));

        assert!(FieldFilter::equal("foo", "bar").matches(&row));
        assert!(!FieldFilter::equal("foo", "baz").matches(&row));
        assert!(!FieldFilter::equal("missing", Value::Null).matches(&row));
        assert!(FieldFilter::equal("foo", "bar").and(FieldFilter::equal("n", 1)).matches(&row));
        assert!(!FieldFilter::equal("foo", "bar").and(FieldFilter::equal("n", 2)).matches(&row));
        assert!(FieldFilter::equal("foo", "baz").or(FieldFilter::equal("n", 1)).matches(&row));
        assert!(FieldFilter::all([]).matches(&row));
        assert!(!FieldFilter::any([]).matches(&row));
    }

    #[test]
    fn chained_and_stays_flat() {
        let filter = FieldFilter::equal("a", 1)
            .and(FieldFilter::equal("b", 2))
            .and(FieldFilter::equal("c", 3));
        assert!(matches!(filter, FieldFilter::And(ref inner) if inner.len() == 3));
    }

    fn schema(name: &str) -> CollectionSchema {
        CollectionSchema {
            name: name.to_string(),
            text_key: "text".to_string(),
            properties: vec!["foo".to_string()],
            dimensions: 2,
        }
    }

    fn record(foo: &str, vector: [f32; 2]) -> Record {
        Record { fields: fields(json!({ "text": foo, "foo": foo })), vector: vector.to_vec() }
    }

    #[tokio::test]
    async fn missing_collection_is_reported() {
        let client = InMemoryClient::new();
        let err = client.insert("nope", vec![record("a", [1.0, 0.0])]).await.unwrap_err();
        assert!(matches!(err, StoreError::CollectionNotFound(name) if name == "nope"));
        assert!(!client.collection_exists("nope").await.unwrap());
    }

    #[tokio::test]
    async fn create_is_idempotent_and_keeps_rows() {
        let client = InMemoryClient::new();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        client.insert("c", vec![record("a", [1.0, 0.0])]).await.unwrap();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        assert_eq!(client.row_count("c").await, Some(1));
    }

    #[tokio::test]
    async fn rejects_wrong_dimensions() {
        let client = InMemoryClient::new();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        let bad = Record { fields: Map::new(), vector: vec![1.0, 0.0, 0.0] };
        assert!(matches!(
            client.insert("c", vec![bad]).await,
            Err(StoreError::BackendError { .. })
        ));
    }

    #[tokio::test]
    async fn query_orders_by_distance_and_applies_filter() {
        let client = InMemoryClient::new();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        let ids = client
            .insert(
                "c",
                vec![
                    record("far", [0.0, 1.0]),
                    record("near", [1.0, 0.0]),
                    record("mid", [1.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);

        let rows = client.query_nearest("c", NearestQuery::new(&[1.0, 0.0], 10)).await.unwrap();
        let order: Vec<&str> = rows.iter().map(|r| r.fields["foo"].as_str().unwrap()).collect();
        assert_eq!(order, ["near", "mid", "far"]);
        assert!(rows.iter().all(|r| r.vector.is_none()));

        let filter = FieldFilter::equal("foo", "far");
        let query = NearestQuery::new(&[1.0, 0.0], 10).filter(Some(&filter)).include_vectors(true);
        let rows = client.query_nearest("c", query).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, ids[0]);
        assert_eq!(rows[0].vector.as_deref(), Some(&[0.0, 1.0][..]));
    }

    #[tokio::test]
    async fn upsert_replaces_whole_row() {
        let client = InMemoryClient::new();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        client.upsert("c", "x", record("old", [1.0, 0.0])).await.unwrap();
        let replacement =
            Record { fields: fields(json!({ "text": "new" })), vector: vec![0.0, 1.0] };
        client.upsert("c", "x", replacement).await.unwrap();

        let rows = client.query_nearest("c", NearestQuery::new(&[0.0, 1.0], 5)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields, fields(json!({ "text": "new" })));
        assert!(rows[0].distance.abs() < 1e-6);
    }

    #[tokio::test]
    async fn upsert_many_with_a_bad_vector_writes_nothing() {
        let client = InMemoryClient::new();
        client.create_collection_if_absent(&schema("c")).await.unwrap();
        client.upsert("c", "a", record("old", [1.0, 0.0])).await.unwrap();

        let ids = vec!["a".to_string(), "b".to_string()];
        let bad = Record { fields: Map::new(), vector: vec![1.0, 0.0, 0.0] };
        let err = client
            .upsert_many("c", &ids, vec![record("new", [0.0, 1.0]), bad])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::BackendError { .. }));

        let rows = client.query_nearest("c", NearestQuery::new(&[1.0, 0.0], 5)).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].fields["foo"], "old");
    }
}
