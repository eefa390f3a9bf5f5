use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use super::errors::CatalogError;

pub const FIELD_NAME_ID: &str = "id";
pub const FIELD_NAME_EMAIL: &str = "email";
pub const FIELD_NAME_EMAIL_VISIBILITY: &str = "emailVisibility";
pub const FIELD_NAME_VERIFIED: &str = "verified";
pub const FIELD_NAME_PASSWORD: &str = "password";
pub const FIELD_NAME_TOKEN_KEY: &str = "tokenKey";
pub const FIELD_NAME_COLLECTION_ID: &str = "collectionId";
pub const FIELD_NAME_COLLECTION_NAME: &str = "collectionName";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    #[default]
    Base,
    Auth,
    View,
}

impl fmt::Display for CollectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionType::Base => write!(f, "base"),
            CollectionType::Auth => write!(f, "auth"),
            CollectionType::View => write!(f, "view"),
        }
    }
}

/// Options carried by a relation field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationOptions {
    /// Id of the target collection
    pub collection_id: String,
    pub multiple: bool,
    pub cascade_delete: bool,
    /// Whether the column has a single-column unique index
    pub unique: bool,
}

/// Closed set of field kinds understood by the resolver.
///
/// Only select, file and relation fields can hold more than one value; they are
/// the kinds that accept the `:each` and `:length` modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Number,
    Bool,
    Url,
    Email,
    Date,
    AutoDate,
    Select { multiple: bool },
    Json,
    File { multiple: bool },
    Relation(RelationOptions),
}

impl FieldKind {
    /// Kinds stored as a JSON array (or a plain value normalised to one).
    pub fn is_multi_valuer(&self) -> bool {
        matches!(
            self,
            FieldKind::Select { .. } | FieldKind::File { .. } | FieldKind::Relation(_)
        )
    }

    pub fn is_multiple(&self) -> bool {
        match self {
            FieldKind::Select { multiple } | FieldKind::File { multiple } => *multiple,
            FieldKind::Relation(options) => options.multiple,
            _ => false,
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldKind::Date | FieldKind::AutoDate)
    }

    pub fn as_relation(&self) -> Option<&RelationOptions> {
        match self {
            FieldKind::Relation(options) => Some(options),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub hidden: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Field {
            name: name.into(),
            kind,
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub collection_type: CollectionType,
    /// Ordered field list; names are unique within the collection
    pub fields: Vec<Field>,
}

impl Collection {
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn is_auth(&self) -> bool {
        self.collection_type == CollectionType::Auth
    }
}

/// Read-only access to collection metadata.
///
/// This is the only way the resolver reaches the schema, so any snapshot
/// representation can back it.
pub trait CollectionLookup {
    fn find_collection_by_name_or_id(&self, name_or_id: &str) -> Option<&Collection>;
}

/// Immutable in-memory catalog snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionCatalog {
    collections: Vec<Collection>,
    by_id: HashMap<String, usize>,
    by_name: HashMap<String, usize>,
}

impl CollectionCatalog {
    pub fn new(collections: Vec<Collection>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::new();
        let mut by_name = HashMap::new();

        for (idx, collection) in collections.iter().enumerate() {
            if by_id.insert(collection.id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateCollection {
                    key: "id",
                    value: collection.id.clone(),
                });
            }
            if by_name.insert(collection.name.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateCollection {
                    key: "name",
                    value: collection.name.clone(),
                });
            }
        }

        Ok(CollectionCatalog {
            collections,
            by_id,
            by_name,
        })
    }

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    /// Lookup that reports a missing collection as an error.
    pub fn get(&self, name_or_id: &str) -> Result<&Collection, CatalogError> {
        self.find_collection_by_name_or_id(name_or_id)
            .ok_or_else(|| CatalogError::Collection {
                name_or_id: name_or_id.to_string(),
            })
    }
}

impl CollectionLookup for CollectionCatalog {
    fn find_collection_by_name_or_id(&self, name_or_id: &str) -> Option<&Collection> {
        // ids win over names, same as the record lookups in the API layer
        self.by_id
            .get(name_or_id)
            .or_else(|| self.by_name.get(name_or_id))
            .map(|idx| &self.collections[*idx])
    }
}
