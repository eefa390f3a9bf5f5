//! `@request.*` paths.
//!
//! Most request values are static: they are bound as parameters (or `NULL`
//! when absent) and need no join. Only `@request.auth.*` fields outside the
//! plain set, `@request.body.<relation>.*` and `@request.body.<field>:each`
//! join other tables.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::collection_catalog::schema::{
    Field, FieldKind, RelationOptions, FIELD_NAME_COLLECTION_ID, FIELD_NAME_COLLECTION_NAME,
    FIELD_NAME_EMAIL, FIELD_NAME_EMAIL_VISIBILITY, FIELD_NAME_ID, FIELD_NAME_VERIFIED,
};
use crate::request_info::{value_to_string, BodyValue, RequestInfo};
use crate::sql::{columnify, json_each, placeholder, quote_column, Join};

use super::errors::ResolverError;
use super::modifiers::{split_modifier, Modifier};
use super::result::ResolverResult;
use super::runner::PathRunner;

/// Auth record fields resolved from the request itself, without a join.
const STATIC_AUTH_FIELDS: [&str; 6] = [
    FIELD_NAME_ID,
    FIELD_NAME_COLLECTION_ID,
    FIELD_NAME_COLLECTION_NAME,
    FIELD_NAME_EMAIL,
    FIELD_NAME_EMAIL_VISIBILITY,
    FIELD_NAME_VERIFIED,
];

const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3fZ";

impl<'r, 'a> PathRunner<'r, 'a> {
    pub(super) fn resolve_request_field(mut self, props: &[String]) -> Result<ResolverResult, ResolverError> {
        // system filters: hidden fields are fine, missing ones become NULL
        self.allow_hidden_fields = true;
        self.nullify_missing_field = true;

        let Some(last) = props.last() else {
            return Err(self.invalid_format());
        };
        let (_, modifier) = split_modifier(last)?;

        let Some(info) = self.resolver.request_info else {
            log::debug!("No request info, '{}' resolves to NULL", self.field_name);
            return Ok(absent_value(modifier));
        };

        match props.get(1).map(String::as_str) {
            Some("auth") => self.resolve_auth_field(info, props, modifier),
            Some("body") => self.resolve_body_field(info, props, modifier),
            Some("context" | "method" | "query" | "headers") => {
                let segments = static_segments(&props[1..])?;
                let value = lookup_static_value(info, &segments);
                self.static_result(value, modifier, None)
            }
            _ => Err(self.invalid_format()),
        }
    }

    fn resolve_auth_field(
        &mut self,
        info: &'a RequestInfo,
        props: &[String],
        modifier: Option<Modifier>,
    ) -> Result<ResolverResult, ResolverError> {
        if props.len() < 3 {
            return Err(self.invalid_format());
        }

        let Some(auth) = info.auth.as_ref() else {
            log::debug!("Unauthenticated request, '{}' resolves to NULL", self.field_name);
            return Ok(absent_value(modifier));
        };

        let collection = self
            .catalog()
            .find_collection_by_name_or_id(&auth.collection_id);

        let (name, _) = split_modifier(&props[2])?;
        if modifier == Some(Modifier::IsSet)
            || (props.len() == 3 && STATIC_AUTH_FIELDS.contains(&name))
        {
            let exported = Value::Object(auth.export(collection));
            let segments = static_segments(&props[2..])?;
            let value = traverse(&exported, &segments).cloned();
            return self.static_result(value, modifier, None);
        }

        let Some(collection) = collection else {
            log::debug!(
                "Auth collection '{}' is not in the catalog, '{}' resolves to NULL",
                auth.collection_id,
                self.field_name
            );
            return Ok(ResolverResult::null());
        };

        let alias = format!("__auth_{}", columnify(&collection.name));
        let multi_match_alias = format!("__mm_{}", alias);
        let param = self
            .resolver
            .params
            .bind_named(format!("{}__id", alias), Value::String(auth.id.clone()));

        let on = format!("{} = {}", quote_column(&alias, FIELD_NAME_ID), placeholder(&param));
        let multi_match_on = format!(
            "{} = {}",
            quote_column(&multi_match_alias, FIELD_NAME_ID),
            placeholder(&param)
        );

        self.enter_join(
            collection,
            Join::table(&collection.name, alias, Some(on)),
            Join::table(&collection.name, multi_match_alias, Some(multi_match_on)),
        )?;

        self.active_props = props[2..].to_vec();
        self.process_active_props()
    }

    fn resolve_body_field(
        &mut self,
        info: &'a RequestInfo,
        props: &[String],
        modifier: Option<Modifier>,
    ) -> Result<ResolverResult, ResolverError> {
        if props.len() < 3 {
            return Err(self.invalid_format());
        }

        let (key, key_modifier) = if props.len() == 3 {
            split_modifier(&props[2])?
        } else {
            (props[2].as_str(), None)
        };

        let field = self.resolver.base_collection.field(key);

        let joinable = field.filter(|_| modifier != Some(Modifier::IsSet));
        if let Some(field) = joinable {
            if props.len() > 3 {
                if let Some(options) = field.kind.as_relation() {
                    return self.join_body_relation(info, key, options, props);
                }
            } else if field.kind.is_multi_valuer() {
                match key_modifier {
                    Some(Modifier::Each) => return self.join_body_each(info, key, field),
                    Some(Modifier::Length) => {
                        let count = info
                            .body
                            .get(key)
                            .map(|v| v.unique_strings().len())
                            .unwrap_or(0);
                        return Ok(ResolverResult::new(count.to_string()));
                    }
                    _ => {}
                }
            }
        }

        let segments = static_segments(&props[1..])?;
        let value = lookup_static_value(info, &segments);
        let kind = if props.len() == 3 {
            field.map(|f| &f.kind)
        } else {
            None
        };

        self.static_result(value, modifier, kind)
    }

    /// Join the relation target on the submitted id(s), whether or not the
    /// record already references them.
    fn join_body_relation(
        &mut self,
        info: &'a RequestInfo,
        key: &str,
        options: &RelationOptions,
        props: &[String],
    ) -> Result<ResolverResult, ResolverError> {
        let Some(target) = self
            .catalog()
            .find_collection_by_name_or_id(&options.collection_id)
        else {
            return Ok(ResolverResult::null());
        };

        let ids = info
            .body
            .get(key)
            .map(BodyValue::unique_strings)
            .unwrap_or_default();
        if ids.is_empty() {
            log::debug!("No ids submitted for '{}', '{}' resolves to NULL", key, self.field_name);
            return Ok(ResolverResult::null());
        }

        let alias = format!("__data_{}_{}", columnify(&target.name), columnify(key));
        let multi_match_alias = format!("__data_mm_{}_{}", columnify(&target.name), columnify(key));

        let placeholders: Vec<String> = ids
            .into_iter()
            .enumerate()
            .map(|(i, id)| {
                let name = self
                    .resolver
                    .params
                    .bind_named(format!("{}__{}", alias, i), Value::String(id));
                placeholder(&name)
            })
            .collect();

        let condition = |table_alias: &str| {
            let id_column = quote_column(table_alias, FIELD_NAME_ID);
            match placeholders.as_slice() {
                [single] => format!("{} = {}", id_column, single),
                many => format!("{} IN ({})", id_column, many.join(", ")),
            }
        };
        let on = condition(&alias);
        let multi_match_on = condition(&multi_match_alias);

        if options.multiple {
            self.with_multi_match = true;
        }
        self.enter_join(
            target,
            Join::table(&target.name, alias, Some(on)),
            Join::table(&target.name, multi_match_alias, Some(multi_match_on)),
        )?;

        self.active_props = props[3..].to_vec();
        self.process_active_props()
    }

    /// `@request.body.<field>:each`: one row per submitted item.
    fn join_body_each(
        &mut self,
        info: &'a RequestInfo,
        key: &str,
        field: &Field,
    ) -> Result<ResolverResult, ResolverError> {
        let items = info
            .body
            .get(key)
            .map(BodyValue::unique_strings)
            .unwrap_or_default();

        let alias = format!("__dataEach_{}_je", columnify(key));
        let multi_match_alias = format!("__mm_{}", alias);
        let param = self
            .resolver
            .params
            .bind_named(format!("{}__items", alias), Value::String(Value::from(items).to_string()));

        self.resolver
            .joins
            .register(Join::expression(json_each(&placeholder(&param)), alias.clone(), None))?;
        self.multi_match.joins.push(Join::expression(
            json_each(&placeholder(&param)),
            multi_match_alias.clone(),
            None,
        ));

        if field.kind.is_multiple() {
            self.with_multi_match = true;
        }

        // the submitted items are known, so the comparison needs no coalescing
        let mut result = self.finish(
            quote_column(&alias, "value"),
            quote_column(&multi_match_alias, "value"),
        );
        result.params.push(param);
        Ok(result)
    }

    /// Bind a static request value.
    fn static_result(
        &mut self,
        value: Option<Value>,
        modifier: Option<Modifier>,
        kind: Option<&FieldKind>,
    ) -> Result<ResolverResult, ResolverError> {
        match modifier {
            Some(Modifier::IsSet) => return Ok(ResolverResult::bool_literal(value.is_some())),
            Some(m @ (Modifier::Each | Modifier::Length)) => {
                return Err(ResolverError::invalid_modifier(m.as_str(), self.field_name));
            }
            _ => {}
        }

        let value = match value {
            None | Some(Value::Null) => {
                log::debug!("Request value '{}' is not set, using NULL", self.field_name);
                return Ok(ResolverResult::null());
            }
            Some(value) => normalize_request_value(value, kind),
        };

        if modifier == Some(Modifier::Lower) {
            let name = self.resolver.params.bind(Value::String(value_to_string(&value)));
            let identifier = format!("LOWER({})", placeholder(&name));
            return Ok(ResolverResult::param(name, identifier));
        }

        let name = self.resolver.params.bind(value);
        let identifier = placeholder(&name);
        Ok(ResolverResult::param(name, identifier))
    }
}

/// Result for a request value that does not exist.
fn absent_value(modifier: Option<Modifier>) -> ResolverResult {
    if modifier == Some(Modifier::IsSet) {
        ResolverResult::bool_literal(false)
    } else {
        ResolverResult::null()
    }
}

/// Path segments with the modifier of the last one removed.
fn static_segments(props: &[String]) -> Result<Vec<&str>, ResolverError> {
    let mut segments: Vec<&str> = props.iter().map(String::as_str).collect();
    if let Some(last) = segments.last_mut() {
        *last = split_modifier(*last)?.0;
    }
    Ok(segments)
}

/// Look up `context`, `method`, `query.K`, `headers.K` or `body.K[.sub...]`.
///
/// `None` means the key is absent; a present key holding null is `Some(Null)`.
fn lookup_static_value(info: &RequestInfo, segments: &[&str]) -> Option<Value> {
    match segments {
        ["context"] => Some(Value::String(info.context.clone())),
        ["method"] => Some(Value::String(info.method.clone())),
        ["query", key] => info.query.get(*key).cloned().map(Value::String),
        ["headers", key] => info.headers.get(*key).cloned().map(Value::String),
        ["body", key, rest @ ..] => match info.body.get(*key)? {
            BodyValue::Plain(value) => traverse(value, rest).cloned(),
            BodyValue::Raw(raw) if rest.is_empty() => Some(Value::String(raw.raw_json.clone())),
            BodyValue::Raw(raw) => traverse(&raw.parse()?, rest).cloned(),
        },
        _ => None,
    }
}

fn traverse<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    segments.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(*segment),
        Value::Array(items) => items.get(segment.parse::<usize>().ok()?),
        _ => None,
    })
}

/// Coerce a request value to the kind of the field it is compared with.
///
/// Strings aimed at number fields are parsed (unparsable input becomes `0`),
/// strings aimed at date fields are reformatted to the stored datetime format,
/// and nested objects/arrays are bound as their JSON text.
fn normalize_request_value(value: Value, kind: Option<&FieldKind>) -> Value {
    match (value, kind) {
        (Value::String(s), Some(FieldKind::Number)) => number_value(s.trim().parse::<f64>().unwrap_or(0.0)),
        (Value::String(s), Some(kind)) if kind.is_date() => match normalize_datetime(&s) {
            Some(normalized) => Value::String(normalized),
            None => Value::String(s),
        },
        (value @ (Value::Object(_) | Value::Array(_)), _) => Value::String(encode_json(&value)),
        (value, _) => value,
    }
}

fn encode_json(value: &Value) -> String {
    match serde_json::to_string(value) {
        Ok(encoded) => encoded,
        Err(_) => value.to_string(),
    }
}

/// Integral values are kept as integers so they bind as such.
pub(crate) fn number_value(n: f64) -> Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

fn normalize_datetime(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).format(DATETIME_OUTPUT_FORMAT).to_string());
    }

    for format in [
        "%Y-%m-%d %H:%M:%S%.fZ",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().format(DATETIME_OUTPUT_FORMAT).to_string());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().format(DATETIME_OUTPUT_FORMAT).to_string())
}
