/// Collection catalog configuration management.
///
/// Collections are defined in YAML with the following structure:
///
/// ```yaml
/// collections:
///   - id: pbc_posts          # optional, defaults to the name
///     name: posts
///     type: base             # base | auth | view
///     fields:
///       - name: title
///         type: text
///       - name: author
///         type: relation
///         collection: users  # target name or id
///         multiple: false
///         cascade_delete: true
///         unique: false
/// ```
///
/// Every collection gets an implicit `id` field. Auth collections also get the
/// `email`, `emailVisibility`, `verified`, `password` and `tokenKey` system
/// fields when they are not declared explicitly.
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::errors::CatalogError;
use super::schema::{
    Collection, CollectionCatalog, CollectionType, Field, FieldKind, RelationOptions,
    FIELD_NAME_EMAIL, FIELD_NAME_EMAIL_VISIBILITY, FIELD_NAME_ID, FIELD_NAME_PASSWORD,
    FIELD_NAME_TOKEN_KEY, FIELD_NAME_VERIFIED,
};

lazy_static! {
    // collection and field names double as SQL identifiers and path segments
    static ref NAME_REGEX: Regex = Regex::new(r"^\w+$").unwrap();
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub collections: Vec<CollectionDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionDefinition {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default)]
    pub collection_type: CollectionType,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl CollectionDefinition {
    fn resolved_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Number,
    Bool,
    Url,
    Email,
    Date,
    AutoDate,
    Select,
    Json,
    File,
    Relation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub multiple: bool,
    /// Relation target (collection name or id)
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub cascade_delete: bool,
    #[serde(default)]
    pub unique: bool,
}

impl CatalogConfig {
    /// Load catalog configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|e| CatalogError::ConfigReadError {
            error: e.to_string(),
        })?;

        Self::from_yaml_str(&contents)
    }

    /// Parse catalog configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CatalogError> {
        serde_yaml::from_str(yaml).map_err(|e| CatalogError::ConfigParseError {
            error: e.to_string(),
        })
    }

    /// Structural validation of the definitions
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.collections.is_empty() {
            return Err(CatalogError::InvalidConfig {
                message: "Catalog must contain at least one collection definition".to_string(),
            });
        }

        let mut seen_names = HashSet::new();
        let mut seen_ids = HashSet::new();
        for collection in &self.collections {
            if !NAME_REGEX.is_match(&collection.name) {
                return Err(CatalogError::InvalidConfig {
                    message: format!(
                        "Invalid collection name '{}': only letters, digits and underscores are allowed",
                        collection.name
                    ),
                });
            }
            if !seen_names.insert(collection.name.as_str()) {
                return Err(CatalogError::DuplicateCollection {
                    key: "name",
                    value: collection.name.clone(),
                });
            }
            if !seen_ids.insert(collection.resolved_id()) {
                return Err(CatalogError::DuplicateCollection {
                    key: "id",
                    value: collection.resolved_id().to_string(),
                });
            }

            let mut seen_fields = HashSet::new();
            for field in &collection.fields {
                if !NAME_REGEX.is_match(&field.name) {
                    return Err(CatalogError::InvalidConfig {
                        message: format!(
                            "Invalid field name '{}.{}': only letters, digits and underscores are allowed",
                            collection.name, field.name
                        ),
                    });
                }
                if !seen_fields.insert(field.name.as_str()) {
                    return Err(CatalogError::DuplicateField {
                        collection: collection.name.clone(),
                        field: field.name.clone(),
                    });
                }
            }
        }

        self.validate_relation_targets()
    }

    fn validate_relation_targets(&self) -> Result<(), CatalogError> {
        let known: HashSet<&str> = self
            .collections
            .iter()
            .flat_map(|c| [c.name.as_str(), c.resolved_id()])
            .collect();

        for collection in &self.collections {
            for field in &collection.fields {
                if field.field_type != FieldType::Relation {
                    continue;
                }
                let target = field.collection.as_deref().ok_or_else(|| {
                    CatalogError::MissingRelationTarget {
                        collection: collection.name.clone(),
                        field: field.name.clone(),
                    }
                })?;
                if !known.contains(target) {
                    return Err(CatalogError::UnknownRelationTarget {
                        collection: collection.name.clone(),
                        field: field.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Validate and convert the definitions into a catalog snapshot
    pub fn to_catalog(&self) -> Result<CollectionCatalog, CatalogError> {
        self.validate()?;

        // relation targets may be written as names or ids
        let mut target_ids: HashMap<&str, &str> = HashMap::new();
        for collection in &self.collections {
            target_ids.insert(collection.name.as_str(), collection.resolved_id());
            target_ids.insert(collection.resolved_id(), collection.resolved_id());
        }

        let mut collections = Vec::with_capacity(self.collections.len());
        for definition in &self.collections {
            let mut fields = Vec::with_capacity(definition.fields.len() + 1);

            if !definition.fields.iter().any(|f| f.name == FIELD_NAME_ID) {
                fields.push(Field::new(FIELD_NAME_ID, FieldKind::Text));
            }

            for field in &definition.fields {
                let kind = field_kind(definition, field, &target_ids)?;
                fields.push(Field {
                    name: field.name.clone(),
                    kind,
                    hidden: field.hidden,
                });
            }

            if definition.collection_type == CollectionType::Auth {
                add_auth_system_fields(&mut fields);
            }

            log::trace!(
                "Collection '{}' ({}) with {} fields",
                definition.name,
                definition.collection_type,
                fields.len()
            );

            collections.push(Collection {
                id: definition.resolved_id().to_string(),
                name: definition.name.clone(),
                collection_type: definition.collection_type,
                fields,
            });
        }

        log::debug!("Loaded collection catalog with {} collections", collections.len());

        CollectionCatalog::new(collections)
    }
}

fn field_kind(
    collection: &CollectionDefinition,
    field: &FieldDefinition,
    target_ids: &HashMap<&str, &str>,
) -> Result<FieldKind, CatalogError> {
    let kind = match field.field_type {
        FieldType::Text => FieldKind::Text,
        FieldType::Number => FieldKind::Number,
        FieldType::Bool => FieldKind::Bool,
        FieldType::Url => FieldKind::Url,
        FieldType::Email => FieldKind::Email,
        FieldType::Date => FieldKind::Date,
        FieldType::AutoDate => FieldKind::AutoDate,
        FieldType::Json => FieldKind::Json,
        FieldType::Select => FieldKind::Select {
            multiple: field.multiple,
        },
        FieldType::File => FieldKind::File {
            multiple: field.multiple,
        },
        FieldType::Relation => {
            let target = field.collection.as_deref().unwrap_or_default();
            let collection_id = target_ids.get(target).ok_or_else(|| {
                CatalogError::UnknownRelationTarget {
                    collection: collection.name.clone(),
                    field: field.name.clone(),
                    target: target.to_string(),
                }
            })?;
            FieldKind::Relation(RelationOptions {
                collection_id: collection_id.to_string(),
                multiple: field.multiple,
                cascade_delete: field.cascade_delete,
                unique: field.unique,
            })
        }
    };

    Ok(kind)
}

fn add_auth_system_fields(fields: &mut Vec<Field>) {
    let system_fields = [
        Field::new(FIELD_NAME_EMAIL, FieldKind::Email),
        Field::new(FIELD_NAME_EMAIL_VISIBILITY, FieldKind::Bool),
        Field::new(FIELD_NAME_VERIFIED, FieldKind::Bool),
        Field::new(FIELD_NAME_PASSWORD, FieldKind::Text).hidden(),
        Field::new(FIELD_NAME_TOKEN_KEY, FieldKind::Text).hidden(),
    ];

    for system_field in system_fields {
        if !fields.iter().any(|f| f.name == system_field.name) {
            fields.push(system_field);
        }
    }
}
