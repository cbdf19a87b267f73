//! Configuration binding an adapter to a collection.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::metadata::{MetadataSchema, column_name};

/// The default name of the column holding document text.
pub const DEFAULT_TEXT_KEY: &str = "text";

/// Which collection to use and how documents map onto its columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Name of the backing collection.
    pub index_name: String,
    /// Column that holds the raw document text.
    pub text_key: String,
    /// Dotted metadata paths projected into their own columns.
    pub metadata_keys: MetadataSchema,
}

impl StoreConfig {
    /// Create a new builder for constructing a [`StoreConfig`].
    pub fn builder(index_name: impl Into<String>) -> StoreConfigBuilder {
        StoreConfigBuilder::new(index_name)
    }

    /// Check that the configuration is usable.
    ///
    /// Configs built through [`StoreConfigBuilder`] are already valid; this is
    /// for configs that were deserialized or assembled by hand.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConfigError`] if:
    /// - `index_name` or `text_key` is empty
    /// - the metadata schema is invalid
    /// - a metadata column has the same name as `text_key`
    pub fn validate(&self) -> Result<()> {
        if self.index_name.trim().is_empty() {
            return Err(StoreError::ConfigError("index_name must not be empty".to_string()));
        }
        if self.text_key.trim().is_empty() {
            return Err(StoreError::ConfigError("text_key must not be empty".to_string()));
        }
        self.metadata_keys.validate()?;
        if let Some(path) =
            self.metadata_keys.paths().iter().find(|p| column_name(p) == self.text_key)
        {
            return Err(StoreError::ConfigError(format!(
                "metadata key '{path}' collides with text_key '{}'",
                self.text_key
            )));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct StoreConfigBuilder {
    index_name: String,
    text_key: String,
    metadata_keys: Vec<String>,
}

impl StoreConfigBuilder {
    fn new(index_name: impl Into<String>) -> Self {
        Self {
            index_name: index_name.into(),
            text_key: DEFAULT_TEXT_KEY.to_string(),
            metadata_keys: Vec::new(),
        }
    }

    /// Set the column that holds the raw document text.
    pub fn text_key(mut self, key: impl Into<String>) -> Self {
        self.text_key = key.into();
        self
    }

    /// Declare a single metadata path to persist.
    pub fn metadata_key(mut self, path: impl Into<String>) -> Self {
        self.metadata_keys.push(path.into());
        self
    }

    /// Declare several metadata paths to persist, in order.
    pub fn metadata_keys<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata_keys.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Build the [`StoreConfig`], validating it.
    ///
    /// # Errors
    ///
    /// See [`StoreConfig::validate`].
    pub fn build(self) -> Result<StoreConfig> {
        let config = StoreConfig {
            index_name: self.index_name,
            text_key: self.text_key,
            metadata_keys: MetadataSchema::new(self.metadata_keys)?,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_text_key() {
        let config = StoreConfig::builder("Docs").metadata_key("foo").build().unwrap();
        assert_eq!(config.text_key, DEFAULT_TEXT_KEY);
        assert_eq!(config.metadata_keys.paths(), ["foo".to_string()]);
    }

    #[test]
    fn rejects_empty_names() {
        assert!(matches!(StoreConfig::builder("").build(), Err(StoreError::ConfigError(_))));
        assert!(matches!(
            StoreConfig::builder("Docs").text_key(" ").build(),
            Err(StoreError::ConfigError(_))
        ));
    }

    #[test]
    fn rejects_metadata_column_shadowing_text() {
        let err = StoreConfig::builder("Docs").text_key("body").metadata_key("body").build();
        assert!(matches!(err, Err(StoreError::ConfigError(_))));
    }

    #[test]
    fn deserialized_config_is_validated() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"index_name":"Docs","text_key":"text","metadata_keys":["a","a.b"]}"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }
}
