//! # Collection Catalog Error Types
//!
//! Errors raised while loading, validating and converting collection
//! definitions into an in-memory catalog snapshot.
//!
//! ## Error Categories
//!
//! - **Definition Errors**: duplicate names/ids, unknown relation targets
//! - **Configuration Errors**: file I/O and YAML parsing issues
//!
//! ## Usage Patterns
//!
//! ```ignore
//! CatalogError::config_error_with_context(
//!     "collections.yaml",
//!     "While loading collection definitions at startup"
//! )
//! ```

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CatalogError {
    #[error("No collection found for `{name_or_id}`")]
    Collection { name_or_id: String },
    #[error("Duplicate collection {key} `{value}`")]
    DuplicateCollection { key: &'static str, value: String },
    #[error("Duplicate field `{field}` in collection `{collection}`")]
    DuplicateField { collection: String, field: String },
    #[error("Relation field `{collection}.{field}` targets unknown collection `{target}`")]
    UnknownRelationTarget {
        collection: String,
        field: String,
        target: String,
    },
    #[error("Relation field `{collection}.{field}` has no target collection")]
    MissingRelationTarget { collection: String, field: String },
    #[error("Failed to read configuration file: {error}")]
    ConfigReadError { error: String },
    #[error("Failed to parse configuration: {error}")]
    ConfigParseError { error: String },
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CatalogError {
    /// Create a Collection lookup error with context information
    pub fn collection_error_with_context(
        name_or_id: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        CatalogError::Collection {
            name_or_id: format!("{}\n  Context: {}", name_or_id.into(), context.into()),
        }
    }

    /// Create a configuration error with context information
    pub fn config_error_with_context(
        config_path: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        CatalogError::InvalidConfig {
            message: format!(
                "Configuration error in '{}': failed to load\n  Context: {}",
                config_path.into(),
                context.into()
            ),
        }
    }
}
