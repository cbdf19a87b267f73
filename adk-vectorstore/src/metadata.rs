//! Projection of nested document metadata onto flat collection columns.
//!
//! A [`MetadataSchema`] is an ordered list of dotted key paths such as
//! `"deep.deepdeep.string"`. Each path is stored in its own column named by
//! replacing `.` with `_` (`deep_deepdeep_string`). Paths that are not
//! declared are dropped when a document is written, so they can never come
//! back from a search.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::document::Metadata;
use crate::error::{Result, StoreError};

/// Separator between segments of a metadata key path.
const PATH_SEPARATOR: char = '.';

/// Return the column name used to store the metadata at `path`.
pub fn column_name(path: &str) -> String {
    path.replace(PATH_SEPARATOR, "_")
}

/// The declared set of metadata paths that are persisted and returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataSchema {
    paths: Vec<String>,
}

impl MetadataSchema {
    /// Build a schema from dotted key paths, validating it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if a path is empty, has an empty
    /// segment, is declared twice, maps to the same column as another path,
    /// or is a strict prefix of another path.
    pub fn new<I, S>(paths: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let schema = Self { paths: paths.into_iter().map(Into::into).collect() };
        schema.validate()?;
        Ok(schema)
    }

    /// The declared paths, in declaration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Column names for every declared path, in declaration order.
    pub fn columns(&self) -> Vec<String> {
        self.paths.iter().map(|p| column_name(p)).collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        let mut seen_paths = HashSet::new();
        let mut seen_columns = HashSet::new();

        for path in &self.paths {
            if path.is_empty() {
                return Err(StoreError::ConfigError("metadata key must not be empty".into()));
            }
            if path.split(PATH_SEPARATOR).any(str::is_empty) {
                return Err(StoreError::ConfigError(format!(
                    "metadata key '{path}' contains an empty segment"
                )));
            }
            if !seen_paths.insert(path.as_str()) {
                return Err(StoreError::ConfigError(format!(
                    "metadata key '{path}' is declared more than once"
                )));
            }
            let column = column_name(path);
            if !seen_columns.insert(column.clone()) {
                return Err(StoreError::ConfigError(format!(
                    "metadata key '{path}' maps to column '{column}' which is already in use"
                )));
            }
        }

        for path in &self.paths {
            let prefix = format!("{path}{PATH_SEPARATOR}");
            if let Some(nested) = self.paths.iter().find(|other| other.starts_with(&prefix)) {
                return Err(StoreError::ConfigError(format!(
                    "metadata key '{path}' is a prefix of '{nested}'"
                )));
            }
        }

        Ok(())
    }

    /// Project nested metadata onto flat columns.
    ///
    /// Only declared paths are copied. A path that is missing from
    /// `metadata` (or runs through a non-object value) produces no column.
    pub fn flatten(&self, metadata: &Metadata) -> Map<String, Value> {
        self.paths
            .iter()
            .filter_map(|path| lookup(metadata, path).map(|v| (column_name(path), v.clone())))
            .collect()
    }

    /// Rebuild nested metadata from the declared columns present in `fields`.
    ///
    /// Columns that are not part of the schema are ignored.
    pub fn unflatten(&self, fields: &Map<String, Value>) -> Metadata {
        let mut metadata = Metadata::new();
        for path in &self.paths {
            if let Some(value) = fields.get(&column_name(path)) {
                insert_path(&mut metadata, path, value.clone());
            }
        }
        metadata
    }
}

fn lookup<'a>(metadata: &'a Metadata, path: &str) -> Option<&'a Value> {
    let mut segments = path.split(PATH_SEPARATOR);
    let mut current = metadata.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

fn insert_path(metadata: &mut Metadata, path: &str, value: Value) {
    let segments: Vec<&str> = path.split(PATH_SEPARATOR).collect();
    let Some((last, parents)) = segments.split_last() else {
        return;
    };

    let mut current = metadata;
    for segment in parents {
        let entry =
            current.entry((*segment).to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Some(next) = entry.as_object_mut() else {
            return;
        };
        current = next;
    }
    current.insert((*last).to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn column_names_replace_dots() {
        assert_eq!(column_name("deep.deepdeep.string"), "deep_deepdeep_string");
        assert_eq!(column_name("foo"), "foo");
    }

    #[test]
    fn flatten_keeps_only_declared_paths() {
        let schema = MetadataSchema::new(["foo", "deep.deepdeep.string"]).unwrap();
        let metadata = meta(json!({
            "foo": "bar",
            "unlisted": 1,
            "deep": { "deepdeep": { "string": "s", "other": true } }
        }));

        let fields = schema.flatten(&metadata);

        assert_eq!(fields.len(), 2);
        assert_eq!(fields["foo"], json!("bar"));
        assert_eq!(fields["deep_deepdeep_string"], json!("s"));
    }

    #[test]
    fn flatten_skips_missing_and_non_object_paths() {
        let schema = MetadataSchema::new(["a.b", "c"]).unwrap();
        let fields = schema.flatten(&meta(json!({ "a": "scalar" })));
        assert!(fields.is_empty());
    }

    #[test]
    fn unflatten_rebuilds_nesting_and_ignores_unknown_columns() {
        let schema = MetadataSchema::new(["deep.deepdeep.string", "deep.number", "foo"]).unwrap();
        let fields = meta(json!({
            "deep_deepdeep_string": "s",
            "deep_number": 7,
            "text": "ignored",
            "stray": "ignored"
        }));

        let metadata = schema.unflatten(&fields);

        assert_eq!(
            Value::Object(metadata),
            json!({ "deep": { "deepdeep": { "string": "s" }, "number": 7 } })
        );
    }

    #[test]
    fn nested_values_are_stored_whole() {
        let schema = MetadataSchema::new(["tags", "pos"]).unwrap();
        let metadata = meta(json!({ "tags": ["a", "b"], "pos": { "x": 1, "y": null } }));

        let restored = schema.unflatten(&schema.flatten(&metadata));

        assert_eq!(restored, metadata);
    }

    #[test]
    fn rejects_invalid_schemas() {
        assert!(MetadataSchema::new([""]).is_err());
        assert!(MetadataSchema::new(["a..b"]).is_err());
        assert!(MetadataSchema::new(["a", "a"]).is_err());
        assert!(MetadataSchema::new(["a.b", "a_b"]).is_err());
        assert!(MetadataSchema::new(["a", "a.b"]).is_err());
        assert!(MetadataSchema::new(["ab", "a.b"]).is_ok());
    }
}
