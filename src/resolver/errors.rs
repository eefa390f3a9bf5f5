use thiserror::Error;

/// Field resolution failures. All of them are caused by the filter input.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ResolverError {
    #[error("Unknown or not allowed field: {0}")]
    UnknownField(String),

    #[error("Invalid field path format: {0:?}")]
    InvalidPathFormat(String),

    #[error("Max relation depth of {max} exceeded in field path: {path}")]
    MaxRelationDepthExceeded { path: String, max: usize },

    #[error("Invalid modifier ':{modifier}' for field: {field}")]
    InvalidModifier { modifier: String, field: String },

    #[error("Ambiguous table alias '{0}': already used for a different join")]
    AmbiguousAlias(String),
}

impl ResolverError {
    pub fn invalid_modifier(modifier: impl Into<String>, field: impl Into<String>) -> Self {
        ResolverError::InvalidModifier {
            modifier: modifier.into(),
            field: field.into(),
        }
    }
}
