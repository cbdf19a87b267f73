//! Qdrant vector client.
//!
//! Provides [`QdrantClient`] which implements [`VectorClient`] using the
//! [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. Columns
//! become payload keys, row ids are UUIDs, and filters are native
//! [`Filter`]s built with [`Condition`].
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_vectorstore::qdrant::{Condition, Filter, QdrantClient};
//!
//! let client = Arc::new(QdrantClient::new("http://localhost:6334")?);
//! let store = VectorStoreAdapter::from_texts(client, embedder, &texts, &metadatas, config).await?;
//! let filter = Filter::must([Condition::matches("foo", "baz".to_string())]);
//! let docs = store.similarity_search("hello world", 1, Some(&filter)).await?;
//! ```

use async_trait::async_trait;
use qdrant_client::qdrant::point_id::PointIdOptions;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::vectors_output::VectorsOptions;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, PointId, PointStruct, PointsIdsList,
    ScoredPoint, SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
    VectorParamsBuilder,
};
use qdrant_client::{Payload, Qdrant};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::client::{CollectionSchema, NearestQuery, Record, Row, VectorClient};
use crate::error::{Result, StoreError};

pub use qdrant_client::qdrant::{Condition, Filter};

const BACKEND: &str = "qdrant";

/// A [`VectorClient`] backed by [Qdrant](https://qdrant.tech/).
///
/// Collections use cosine distance; reported distances are `1 - score`.
pub struct QdrantClient {
    client: Qdrant,
}

impl QdrantClient {
    /// Create a new client connecting to the given gRPC URL.
    pub fn new(url: &str) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(Self::map_err)?;
        Ok(Self { client })
    }

    /// Create a new client for `http://localhost:6334`.
    pub fn default_url() -> Result<Self> {
        Self::new("http://localhost:6334")
    }

    /// Wrap an existing [`Qdrant`] client.
    pub fn from_client(client: Qdrant) -> Self {
        Self { client }
    }

    fn map_err(e: qdrant_client::QdrantError) -> StoreError {
        StoreError::backend(BACKEND, e.to_string())
    }

    /// Qdrant only accepts UUID (or integer) point ids.
    fn check_id(id: &str) -> Result<()> {
        Uuid::parse_str(id).map(drop).map_err(|e| {
            StoreError::backend(BACKEND, format!("point id '{id}' is not a UUID: {e}"))
        })
    }

    fn point(id: String, record: Record) -> Result<PointStruct> {
        let payload = Payload::try_from(Value::Object(record.fields)).map_err(Self::map_err)?;
        Ok(PointStruct::new(id, record.vector, payload))
    }

    /// Build every point before anything is sent, so one bad id or payload
    /// rejects the whole batch.
    fn batch_points(ids: &[String], records: Vec<Record>) -> Result<Vec<PointStruct>> {
        ids.iter()
            .zip(records)
            .map(|(id, record)| {
                Self::check_id(id)?;
                Self::point(id.clone(), record)
            })
            .collect()
    }

    fn point_id_string(id: Option<&PointId>) -> String {
        id.and_then(|pid| match &pid.point_id_options {
            Some(PointIdOptions::Uuid(s)) => Some(s.clone()),
            Some(PointIdOptions::Num(n)) => Some(n.to_string()),
            None => None,
        })
        .unwrap_or_default()
    }

    fn row(scored: ScoredPoint) -> Row {
        let id = Self::point_id_string(scored.id.as_ref());
        let fields: Map<String, Value> =
            scored.payload.iter().map(|(k, v)| (k.clone(), to_json(v))).collect();
        let vector = scored.vectors.and_then(|v| match v.vectors_options {
            Some(VectorsOptions::Vector(dense)) => Some(dense.data),
            _ => None,
        });
        Row { id, fields, distance: 1.0 - scored.score, vector }
    }
}

/// Convert a Qdrant payload value into JSON.
fn to_json(value: &QdrantValue) -> Value {
    match &value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(*b),
        Some(Kind::IntegerValue(i)) => Value::from(*i),
        Some(Kind::DoubleValue(d)) => {
            serde_json::Number::from_f64(*d).map(Value::Number).unwrap_or(Value::Null)
        }
        Some(Kind::StringValue(s)) => Value::String(s.clone()),
        Some(Kind::ListValue(list)) => Value::Array(list.values.iter().map(to_json).collect()),
        Some(Kind::StructValue(s)) => {
            Value::Object(s.fields.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        }
    }
}

#[async_trait]
impl VectorClient for QdrantClient {
    type Filter = Filter;

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client.collection_exists(name).await.map_err(Self::map_err)
    }

    async fn create_collection_if_absent(&self, schema: &CollectionSchema) -> Result<()> {
        if self.collection_exists(&schema.name).await? {
            debug!(collection = %schema.name, "qdrant collection already exists, skipping");
            return Ok(());
        }

        self.client
            .create_collection(
                CreateCollectionBuilder::new(schema.name.as_str()).vectors_config(
                    VectorParamsBuilder::new(schema.dimensions as u64, Distance::Cosine),
                ),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(
            collection = %schema.name,
            dimensions = schema.dimensions,
            "created qdrant collection"
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client.delete_collection(name).await.map_err(Self::map_err)?;
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn insert(&self, collection: &str, records: Vec<Record>) -> Result<Vec<String>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = records.iter().map(|_| Uuid::new_v4().to_string()).collect();
        let points = ids
            .iter()
            .cloned()
            .zip(records)
            .map(|(id, record)| Self::point(id, record))
            .collect::<Result<Vec<_>>>()?;

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "inserted points into qdrant");
        Ok(ids)
    }

    async fn upsert(&self, collection: &str, id: &str, record: Record) -> Result<()> {
        Self::check_id(id)?;
        let point = Self::point(id.to_string(), record)?;
        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, vec![point]).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, id, "upserted point into qdrant");
        Ok(())
    }

    async fn upsert_many(
        &self,
        collection: &str,
        ids: &[String],
        records: Vec<Record>,
    ) -> Result<()> {
        let points = Self::batch_points(ids, records)?;
        if points.is_empty() {
            return Ok(());
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "upserted points into qdrant");
        Ok(())
    }

    async fn delete_by_ids(&self, collection: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let point_ids: Vec<PointId> = ids.iter().map(|id| id.clone().into()).collect();

        self.client
            .delete_points(
                DeletePointsBuilder::new(collection)
                    .points(PointsIdsList { ids: point_ids })
                    .wait(true),
            )
            .await
            .map_err(Self::map_err)?;

        debug!(collection, count = ids.len(), "deleted points from qdrant");
        Ok(())
    }

    async fn delete_by_filter(&self, collection: &str, filter: &Filter) -> Result<()> {
        self.client
            .delete_points(DeletePointsBuilder::new(collection).points(filter.clone()).wait(true))
            .await
            .map_err(Self::map_err)?;

        debug!(collection, "deleted points from qdrant by filter");
        Ok(())
    }

    async fn query_nearest(
        &self,
        collection: &str,
        query: NearestQuery<'_, Filter>,
    ) -> Result<Vec<Row>> {
        let mut request =
            SearchPointsBuilder::new(collection, query.vector.to_vec(), query.k as u64)
                .with_payload(true)
                .with_vectors(query.include_vectors);
        if let Some(filter) = query.filter {
            request = request.filter(filter.clone());
        }

        let response = self.client.search_points(request).await.map_err(Self::map_err)?;
        let rows: Vec<Row> = response.result.into_iter().map(Self::row).collect();

        debug!(collection, result_count = rows.len(), "searched qdrant");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use qdrant_client::qdrant::{ListValue, Struct};
    use serde_json::json;

    use super::*;

    fn value(kind: Kind) -> QdrantValue {
        QdrantValue { kind: Some(kind) }
    }

    #[test]
    fn payload_values_convert_to_json() {
        let nested = Struct {
            fields: HashMap::from([
                ("string".to_string(), value(Kind::StringValue("s".into()))),
                ("n".to_string(), value(Kind::IntegerValue(3))),
            ]),
        };
        let list = ListValue {
            values: vec![value(Kind::BoolValue(true)), value(Kind::DoubleValue(0.5))],
        };

        assert_eq!(to_json(&value(Kind::StructValue(nested))), json!({ "string": "s", "n": 3 }));
        assert_eq!(to_json(&value(Kind::ListValue(list))), json!([true, 0.5]));
        assert_eq!(to_json(&value(Kind::NullValue(0))), Value::Null);
        assert_eq!(to_json(&QdrantValue { kind: None }), Value::Null);
    }

    #[test]
    fn point_ids_render_as_strings() {
        let uuid = PointId { point_id_options: Some(PointIdOptions::Uuid("abc".into())) };
        let num = PointId { point_id_options: Some(PointIdOptions::Num(7)) };
        assert_eq!(QdrantClient::point_id_string(Some(&uuid)), "abc");
        assert_eq!(QdrantClient::point_id_string(Some(&num)), "7");
        assert_eq!(QdrantClient::point_id_string(None), "");
    }

    #[test]
    fn batch_with_a_non_uuid_id_is_rejected_whole() {
        let record = || Record { fields: Map::new(), vector: vec![1.0, 0.0] };
        let good = Uuid::new_v4().to_string();

        let ids = vec![good.clone(), "doc-a".to_string()];
        let err = QdrantClient::batch_points(&ids, vec![record(), record()]).unwrap_err();
        assert!(matches!(
            err,
            StoreError::BackendError { ref message, .. } if message.contains("doc-a")
        ));

        let points = QdrantClient::batch_points(&[good], vec![record()]).unwrap();
        assert_eq!(points.len(), 1);
    }
}
