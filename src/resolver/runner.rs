//! Single path resolution pass.
//!
//! A `PathRunner` walks the segments of one path, registering joins on the
//! owning resolver as it crosses relations. In parallel it builds the
//! `__mm_` prefixed copy of those joins that a multi-match rewrite needs.

use crate::collection_catalog::schema::{
    Collection, CollectionLookup, Field, FieldKind, RelationOptions, FIELD_NAME_EMAIL,
    FIELD_NAME_ID,
};
use crate::sql::{
    columnify, json_array_length, json_each, json_extract, quote_column, quote_identifier, Join,
};

use super::errors::ResolverError;
use super::modifiers::{split_modifier, Modifier};
use super::result::{AfterBuild, MultiMatchSubquery, ResolverResult};
use super::RecordFieldResolver;

pub(super) const REQUEST_PREFIX: &str = "@request";
pub(super) const COLLECTION_PREFIX: &str = "@collection";

const BACK_RELATION_SEPARATOR: &str = "_via_";

/// Outcome of crossing one relation segment.
enum Traversal {
    Joined,
    /// The segment does not name a usable relation
    Missing,
}

pub(super) struct PathRunner<'r, 'a> {
    pub(super) resolver: &'r mut RecordFieldResolver<'a>,
    pub(super) field_name: &'r str,
    pub(super) active_props: Vec<String>,
    pub(super) active_collection: &'a Collection,
    pub(super) active_table_alias: String,
    pub(super) allow_hidden_fields: bool,
    pub(super) nullify_missing_field: bool,
    pub(super) with_multi_match: bool,
    pub(super) multi_match_active_table_alias: String,
    pub(super) multi_match: MultiMatchSubquery,
    relation_hops: usize,
}

impl<'r, 'a> PathRunner<'r, 'a> {
    pub(super) fn new(resolver: &'r mut RecordFieldResolver<'a>, field_name: &'r str) -> Self {
        let base = resolver.base_collection;
        let base_alias = columnify(&base.name);
        let multi_match_alias = format!("__mm_{}", base_alias);
        let allow_hidden_fields = resolver.allow_hidden_fields;

        PathRunner {
            resolver,
            field_name,
            active_props: Vec::new(),
            active_collection: base,
            active_table_alias: base_alias.clone(),
            allow_hidden_fields,
            nullify_missing_field: false,
            with_multi_match: false,
            multi_match_active_table_alias: multi_match_alias.clone(),
            multi_match: MultiMatchSubquery {
                base_table_alias: base_alias,
                from_table_name: base.name.clone(),
                from_table_alias: multi_match_alias,
                value_identifier: String::new(),
                joins: Vec::new(),
            },
            relation_hops: 0,
        }
    }

    pub(super) fn run(mut self) -> Result<ResolverResult, ResolverError> {
        let props: Vec<String> = self.field_name.split('.').map(str::to_string).collect();
        if props.iter().any(|p| p.is_empty()) {
            return Err(self.invalid_format());
        }

        match props.first().map(String::as_str) {
            Some(REQUEST_PREFIX) => self.resolve_request_field(&props),
            Some(COLLECTION_PREFIX) => self.resolve_collection_field(&props),
            _ => {
                self.active_props = props;
                self.process_active_props()
            }
        }
    }

    pub(super) fn catalog(&self) -> &'a dyn CollectionLookup {
        self.resolver.catalog
    }

    pub(super) fn unknown_field(&self) -> ResolverError {
        ResolverError::UnknownField(self.field_name.to_string())
    }

    pub(super) fn invalid_format(&self) -> ResolverError {
        ResolverError::InvalidPathFormat(self.field_name.to_string())
    }

    /// `NULL` under `@request`, an error everywhere else.
    pub(super) fn missing_field(&self) -> Result<ResolverResult, ResolverError> {
        if self.nullify_missing_field {
            log::debug!("'{}' does not resolve to a field, using NULL", self.field_name);
            Ok(ResolverResult::null())
        } else {
            Err(self.unknown_field())
        }
    }

    /// Register a join on the main query and its counterpart in the
    /// multi-match subquery, then make the joined table the active one.
    pub(super) fn enter_join(
        &mut self,
        collection: &'a Collection,
        main: Join,
        multi_match: Join,
    ) -> Result<(), ResolverError> {
        self.active_table_alias = main.alias.clone();
        self.multi_match_active_table_alias = multi_match.alias.clone();
        self.active_collection = collection;

        self.resolver.joins.register(main)?;
        self.multi_match.joins.push(multi_match);
        Ok(())
    }

    /// Build the result, attaching the multi-match subquery when needed.
    pub(super) fn finish(&self, identifier: String, multi_match_value: String) -> ResolverResult {
        let mut result = ResolverResult::new(identifier);
        if self.with_multi_match {
            let mut subquery = self.multi_match.clone();
            subquery.value_identifier = multi_match_value;
            result.multi_match = Some(subquery);
        }
        result
    }

    fn resolve_collection_field(mut self, props: &[String]) -> Result<ResolverResult, ResolverError> {
        if props.len() < 3 {
            return Err(self.invalid_format());
        }

        let (name, alias) = match props[1].split_once(':') {
            Some((name, alias)) => (name, Some(alias)),
            None => (props[1].as_str(), None),
        };

        let collection = self
            .catalog()
            .find_collection_by_name_or_id(name)
            .ok_or_else(|| self.unknown_field())?;

        let table_alias = match alias {
            Some(alias) => format!("__collection_alias_{}", columnify(alias)),
            None => format!("__collection_{}", columnify(&collection.name)),
        };
        let multi_match_alias = format!("__mm_{}", table_alias);

        // system filters may reference hidden fields of other collections
        self.allow_hidden_fields = true;
        self.with_multi_match = true;
        self.enter_join(
            collection,
            Join::table(&collection.name, table_alias, None),
            Join::table(&collection.name, multi_match_alias, None),
        )?;

        self.active_props = props[2..].to_vec();
        self.process_active_props()
    }

    pub(super) fn process_active_props(&mut self) -> Result<ResolverResult, ResolverError> {
        let total = self.active_props.len();
        if total == 0 {
            return Err(self.invalid_format());
        }
        if self.active_props[..total - 1].iter().any(|p| p.contains(':')) {
            return Err(self.invalid_format());
        }

        for i in 0..total {
            let prop = self.active_props[i].clone();

            if i == total - 1 {
                return self.process_last_prop(&prop);
            }

            let collection = self.active_collection;
            let Some(field) = collection.field(&prop) else {
                match self.join_back_relation(&prop)? {
                    Traversal::Joined => continue,
                    Traversal::Missing => return self.missing_field(),
                }
            };

            if field.hidden && !self.allow_hidden_fields {
                return Err(self.unknown_field());
            }

            match &field.kind {
                FieldKind::Json => return self.process_json_path(field, i),
                FieldKind::Relation(options) => {
                    // `rel.id` of a single relation is the relation column itself
                    if !options.multiple && i == total - 2 && self.active_props[i + 1] == FIELD_NAME_ID {
                        return Ok(self.finish(
                            quote_column(&self.active_table_alias, &field.name),
                            quote_column(&self.multi_match_active_table_alias, &field.name),
                        ));
                    }

                    match self.join_relation(field, options)? {
                        Traversal::Joined => continue,
                        Traversal::Missing => return self.missing_field(),
                    }
                }
                _ => return self.missing_field(),
            }
        }

        Err(self.invalid_format())
    }

    fn enter_relation_hop(&mut self) -> Result<(), ResolverError> {
        if self.relation_hops >= self.resolver.max_relation_depth {
            return Err(ResolverError::MaxRelationDepthExceeded {
                path: self.field_name.to_string(),
                max: self.resolver.max_relation_depth,
            });
        }
        self.relation_hops += 1;
        Ok(())
    }

    fn join_relation(
        &mut self,
        field: &Field,
        options: &RelationOptions,
    ) -> Result<Traversal, ResolverError> {
        let Some(target) = self
            .catalog()
            .find_collection_by_name_or_id(&options.collection_id)
        else {
            log::debug!(
                "Relation field '{}' targets unknown collection '{}'",
                field.name,
                options.collection_id
            );
            return Ok(Traversal::Missing);
        };

        self.enter_relation_hop()?;

        let prop = columnify(&field.name);
        let alias = format!("{}_{}", self.active_table_alias, prop);
        let multi_match_alias = format!("{}_{}", self.multi_match_active_table_alias, prop);

        if options.multiple {
            let each_alias = format!("{}_je", alias);
            let multi_match_each_alias = format!("{}_je", multi_match_alias);

            self.resolver.joins.register(Join::expression(
                json_each(&quote_column(&self.active_table_alias, &field.name)),
                each_alias.clone(),
                None,
            ))?;
            self.multi_match.joins.push(Join::expression(
                json_each(&quote_column(&self.multi_match_active_table_alias, &field.name)),
                multi_match_each_alias.clone(),
                None,
            ));

            let on = relation_target_condition(&alias, &quote_column(&each_alias, "value"));
            let multi_match_on = relation_target_condition(
                &multi_match_alias,
                &quote_column(&multi_match_each_alias, "value"),
            );

            self.with_multi_match = true;
            self.enter_join(
                target,
                Join::table(&target.name, alias, Some(on)),
                Join::table(&target.name, multi_match_alias, Some(multi_match_on)),
            )?;
        } else {
            let on = relation_target_condition(
                &alias,
                &quote_column(&self.active_table_alias, &field.name),
            );
            let multi_match_on = relation_target_condition(
                &multi_match_alias,
                &quote_column(&self.multi_match_active_table_alias, &field.name),
            );

            self.enter_join(
                target,
                Join::table(&target.name, alias, Some(on)),
                Join::table(&target.name, multi_match_alias, Some(multi_match_on)),
            )?;
        }

        Ok(Traversal::Joined)
    }

    /// `<collection>_via_<relationField>`: rows of another collection that
    /// reference the active one.
    fn join_back_relation(&mut self, prop: &str) -> Result<Traversal, ResolverError> {
        let Some((collection_name, field_name)) = parse_back_relation(prop) else {
            return Ok(Traversal::Missing);
        };

        let Some(back_collection) = self
            .catalog()
            .find_collection_by_name_or_id(collection_name)
        else {
            return Ok(Traversal::Missing);
        };

        let Some(back_field) = back_collection.field(field_name) else {
            return Ok(Traversal::Missing);
        };

        let Some(options) = back_field.kind.as_relation() else {
            log::debug!("'{}.{}' is not a relation field", collection_name, field_name);
            return Ok(Traversal::Missing);
        };

        if options.collection_id != self.active_collection.id {
            log::debug!(
                "'{}.{}' does not reference '{}'",
                collection_name,
                field_name,
                self.active_collection.name
            );
            return Ok(Traversal::Missing);
        }

        if back_field.hidden && !self.allow_hidden_fields {
            return Ok(Traversal::Missing);
        }

        self.enter_relation_hop()?;

        let prop = columnify(prop);
        let alias = format!("{}_{}", self.active_table_alias, prop);
        let multi_match_alias = format!("{}_{}", self.multi_match_active_table_alias, prop);

        // a unique single relation references each parent at most once
        let direct = options.unique && !options.multiple;

        let main = back_relation_join(
            &back_collection.name,
            &back_field.name,
            &alias,
            &self.active_table_alias,
            direct,
        );
        let multi_match = back_relation_join(
            &back_collection.name,
            &back_field.name,
            &multi_match_alias,
            &self.multi_match_active_table_alias,
            direct,
        );

        if !direct {
            self.with_multi_match = true;
        }
        self.enter_join(back_collection, main, multi_match)?;

        Ok(Traversal::Joined)
    }

    /// Remaining segments after a JSON field are extraction path segments.
    fn process_json_path(&mut self, field: &Field, index: usize) -> Result<ResolverResult, ResolverError> {
        let rest = &self.active_props[index + 1..];
        let Some((last, middle)) = rest.split_last() else {
            return Err(self.invalid_format());
        };
        let (last, modifier) = split_modifier(last)?;

        let mut path = String::new();
        for segment in middle.iter().map(String::as_str).chain(std::iter::once(last)) {
            if segment.chars().all(|c| c.is_ascii_digit()) {
                path.push_str(&format!("[{}]", segment));
            } else {
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(segment);
            }
        }

        let column = quote_column(&self.active_table_alias, &field.name);
        let multi_match_column = quote_column(&self.multi_match_active_table_alias, &field.name);
        let mut identifier = json_extract(&column, &path);
        let mut multi_match_value = json_extract(&multi_match_column, &path);

        match modifier {
            None => {}
            Some(Modifier::Lower) => {
                identifier = format!("LOWER({})", identifier);
                multi_match_value = format!("LOWER({})", multi_match_value);
            }
            Some(other) => return Err(ResolverError::invalid_modifier(other.as_str(), self.field_name)),
        }

        let mut result = self.finish(identifier, multi_match_value);
        result.no_coalesce = true;
        Ok(result)
    }

    fn process_last_prop(&mut self, prop: &str) -> Result<ResolverResult, ResolverError> {
        let (name, modifier) = split_modifier(prop)?;

        let collection = self.active_collection;
        let Some(field) = collection.field(name) else {
            return self.missing_field();
        };

        if field.hidden && !self.allow_hidden_fields {
            return Err(self.unknown_field());
        }

        let column = quote_column(&self.active_table_alias, &field.name);
        let multi_match_column = quote_column(&self.multi_match_active_table_alias, &field.name);
        let mut no_coalesce = false;

        let (mut identifier, mut multi_match_value) = match modifier {
            Some(Modifier::IsSet) => {
                return Err(ResolverError::invalid_modifier(Modifier::IsSet.as_str(), self.field_name));
            }
            Some(m @ (Modifier::Length | Modifier::Each)) if !field.kind.is_multi_valuer() => {
                return Err(ResolverError::invalid_modifier(m.as_str(), self.field_name));
            }
            Some(Modifier::Length) => (
                json_array_length(&column),
                json_array_length(&multi_match_column),
            ),
            Some(Modifier::Each) => {
                let prop = columnify(&field.name);
                let each_alias = format!("{}_{}_je", self.active_table_alias, prop);
                let multi_match_each_alias =
                    format!("{}_{}_je", self.multi_match_active_table_alias, prop);

                self.resolver.joins.register(Join::expression(
                    json_each(&column),
                    each_alias.clone(),
                    None,
                ))?;
                self.multi_match.joins.push(Join::expression(
                    json_each(&multi_match_column),
                    multi_match_each_alias.clone(),
                    None,
                ));

                if field.kind.is_multiple() {
                    self.with_multi_match = true;
                }

                (
                    quote_column(&each_alias, "value"),
                    quote_column(&multi_match_each_alias, "value"),
                )
            }
            _ if field.kind == FieldKind::Json => {
                no_coalesce = true;
                (
                    json_extract(&column, ""),
                    json_extract(&multi_match_column, ""),
                )
            }
            _ => (column, multi_match_column),
        };

        if modifier == Some(Modifier::Lower) {
            identifier = format!("LOWER({})", identifier);
            multi_match_value = format!("LOWER({})", multi_match_value);
        }

        let mut result = self.finish(identifier, multi_match_value);
        result.no_coalesce = no_coalesce;

        if field.name == FIELD_NAME_EMAIL && collection.is_auth() && !self.allow_hidden_fields {
            result.after_build = Some(AfterBuild::RequireEmailVisibility {
                table_alias: self.active_table_alias.clone(),
            });
        }

        Ok(result)
    }
}

fn relation_target_condition(target_alias: &str, source_value: &str) -> String {
    format!("{} = {}", quote_column(target_alias, FIELD_NAME_ID), source_value)
}

fn back_relation_join(
    back_collection: &str,
    back_field: &str,
    alias: &str,
    parent_alias: &str,
    direct: bool,
) -> Join {
    let on = if direct {
        format!(
            "{} = {}",
            quote_column(alias, back_field),
            quote_column(parent_alias, FIELD_NAME_ID)
        )
    } else {
        let each_alias = format!("{}_je", alias);
        format!(
            "{} IN (SELECT {} FROM {} {})",
            quote_column(parent_alias, FIELD_NAME_ID),
            quote_column(&each_alias, "value"),
            json_each(&quote_column(alias, back_field)),
            quote_identifier(&each_alias)
        )
    };

    Join::table(back_collection, alias, Some(on))
}

/// Split `<collection>_via_<field>`.
fn parse_back_relation(prop: &str) -> Option<(&str, &str)> {
    let (collection, field) = prop.split_once(BACK_RELATION_SEPARATOR)?;
    if collection.is_empty() || field.is_empty() || field.contains(BACK_RELATION_SEPARATOR) {
        return None;
    }
    Some((collection, field))
}
