//! Read-only snapshot of the request a rule is evaluated for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::collection_catalog::schema::{
    Collection, FIELD_NAME_COLLECTION_ID, FIELD_NAME_COLLECTION_NAME, FIELD_NAME_ID,
};

/// A raw JSON document submitted as a body value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJson {
    pub raw_json: String,
}

impl RawJson {
    pub fn new(raw: impl Into<String>) -> Self {
        RawJson {
            raw_json: raw.into(),
        }
    }

    /// Parse the document; malformed input is treated as absent.
    pub fn parse(&self) -> Option<Value> {
        serde_json::from_str(&self.raw_json).ok()
    }
}

/// A submitted body value.
///
/// In JSON input a raw document is written as `{"raw_json": "..."}`; anything
/// else is a plain value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BodyValue {
    Raw(RawJson),
    Plain(Value),
}

impl From<Value> for BodyValue {
    fn from(value: Value) -> Self {
        BodyValue::Plain(value)
    }
}

impl BodyValue {
    /// Items of an array-like value as unique, non-empty strings in submission order.
    pub fn unique_strings(&self) -> Vec<String> {
        match self {
            BodyValue::Raw(raw) => match raw.parse() {
                Some(value) => unique_strings(&value),
                None => Vec::new(),
            },
            BodyValue::Plain(value) => unique_strings(value),
        }
    }
}

/// Normalise a value into a list of unique strings.
///
/// A string holding a JSON array is decoded first, so multipart-style
/// submissions behave like JSON ones.
pub fn unique_strings(value: &Value) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    let mut push = |item: String| {
        if !item.is_empty() && !items.contains(&item) {
            items.push(item);
        }
    };

    match value {
        Value::Null => {}
        Value::String(s) => match serde_json::from_str::<Vec<Value>>(s) {
            Ok(decoded) if s.trim_start().starts_with('[') => {
                for item in &decoded {
                    push(value_to_string(item));
                }
            }
            _ => push(s.clone()),
        },
        Value::Array(arr) => {
            for item in arr {
                push(value_to_string(item));
            }
        }
        other => push(value_to_string(other)),
    }

    items
}

/// Plain string form of a value (strings are not quoted, null is empty).
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The authenticated record of the request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRecord {
    pub collection_id: String,
    pub id: String,
    /// Field values keyed by field name
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl AuthRecord {
    /// Export of the record with every field visible.
    ///
    /// Hidden fields and the email are included regardless of `emailVisibility`;
    /// the export is only used for request-scoped rule values.
    pub fn export(&self, collection: Option<&Collection>) -> Map<String, Value> {
        let mut exported = self.data.clone();
        exported.insert(FIELD_NAME_ID.to_string(), Value::String(self.id.clone()));
        exported.insert(
            FIELD_NAME_COLLECTION_ID.to_string(),
            Value::String(self.collection_id.clone()),
        );
        if let Some(collection) = collection {
            exported.insert(
                FIELD_NAME_COLLECTION_NAME.to_string(),
                Value::String(collection.name.clone()),
            );
        }
        exported
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RequestInfo {
    #[serde(default)]
    pub context: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub query: HashMap<String, String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: HashMap<String, BodyValue>,
    #[serde(default)]
    pub auth: Option<AuthRecord>,
}

impl RequestInfo {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
