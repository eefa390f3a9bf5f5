pub mod config;
pub mod errors;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use config::{CatalogConfig, CollectionDefinition, FieldDefinition, FieldType};
pub use errors::CatalogError;
pub use schema::{
    Collection, CollectionCatalog, CollectionLookup, CollectionType, Field, FieldKind,
    RelationOptions,
};
pub use store::CatalogStore;
