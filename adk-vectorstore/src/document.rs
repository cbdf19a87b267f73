//! Data types for documents and scored search hits.

use serde::{Deserialize, Serialize};

/// Arbitrarily nested JSON metadata attached to a [`Document`].
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// A piece of text with metadata, as seen by the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Identifier of the stored row. `None` until the document has been written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// The text content of the document.
    pub page_content: String,
    /// Nested metadata. Only paths declared in the store's metadata schema survive storage.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Create a document with no id and empty metadata.
    pub fn new(page_content: impl Into<String>) -> Self {
        Self { id: None, page_content: page_content.into(), metadata: Metadata::new() }
    }

    /// Attach metadata. Non-object values are ignored.
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        if let serde_json::Value::Object(map) = metadata {
            self.metadata = map;
        }
        self
    }

    /// Set the identifier.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A retrieved [`Document`] paired with its distance to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredDocument {
    /// The reconstructed document.
    pub document: Document,
    /// Distance to the query vector (lower is closer).
    pub distance: f32,
}
