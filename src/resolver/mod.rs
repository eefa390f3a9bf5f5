//! Record field resolver.
//!
//! Turns a dotted field path (`title`, `author.name`, `tags:each`,
//! `@request.auth.id`, `@collection.posts.title`, ...) into a SQL fragment and
//! records the joins and parameters the fragment depends on. One resolver is
//! created per filter evaluation and dropped afterwards; it is not shared.
//!
//! ```text
//! filter AST --> resolve(path) --> ResolverResult (identifier, multi-match, ...)
//!                    |
//!                    +--> JoinRegistry / ParamRegistry --> update_query(query)
//! ```

pub mod errors;
pub mod join_registry;
pub mod modifiers;
mod request_fields;
pub mod result;
mod runner;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use crate::collection_catalog::schema::{Collection, CollectionLookup};
use crate::config::ResolverConfig;
use crate::request_info::RequestInfo;
use crate::sql::{Join, ParamRegistry, SelectQuery};

pub use errors::ResolverError;
pub use join_registry::JoinRegistry;
pub use modifiers::Modifier;
pub use result::{AfterBuild, MultiMatchSubquery, ResolverResult};

pub(crate) use request_fields::number_value;
use runner::PathRunner;

/// Hard upper bound of relation hops in a single path.
pub const MAX_RELATION_DEPTH: usize = 6;

/// Allowed-fields entry that accepts every well-formed path.
pub const ALLOW_ALL_FIELDS: &str = "*";

/// Well-formed path patterns; also the default allowed fields.
pub const DEFAULT_ALLOWED_FIELDS: [&str; 8] = [
    r"^\w+[\w\.:]*$",
    r"^@request\.context$",
    r"^@request\.method$",
    r"^@request\.auth\.[\w\.:]*\w+$",
    r"^@request\.body\.[\w\.:]*\w+$",
    r"^@request\.query\.[\w\.:]*\w+$",
    r"^@request\.headers\.[\w\.:]*\w+$",
    r"^@collection\.\w+(:\w+)?\.[\w\.:]*\w+$",
];

lazy_static! {
    static ref WELL_FORMED_PATH_REGEXES: Vec<Regex> = DEFAULT_ALLOWED_FIELDS
        .iter()
        .map(|pattern| Regex::new(pattern).unwrap())
        .collect();
}

/// An allowed-fields entry: matched literally or as an anchored pattern.
#[derive(Debug, Clone)]
struct AllowedField {
    raw: String,
    matcher: Option<Regex>,
}

impl AllowedField {
    fn new(raw: String) -> Self {
        let matcher = Regex::new(&format!("^(?:{})$", raw)).ok();
        if matcher.is_none() {
            log::debug!("Allowed field entry '{}' is not a valid pattern, matching it literally", raw);
        }
        AllowedField { raw, matcher }
    }

    fn matches(&self, field_name: &str) -> bool {
        self.raw == ALLOW_ALL_FIELDS
            || self.raw == field_name
            || self
                .matcher
                .as_ref()
                .is_some_and(|re| re.is_match(field_name))
    }
}

pub struct RecordFieldResolver<'a> {
    catalog: &'a dyn CollectionLookup,
    base_collection: &'a Collection,
    request_info: Option<&'a RequestInfo>,
    allowed_fields: Vec<AllowedField>,
    allow_hidden_fields: bool,
    max_relation_depth: usize,
    joins: JoinRegistry,
    params: ParamRegistry,
}

impl<'a> RecordFieldResolver<'a> {
    pub fn new(
        catalog: &'a dyn CollectionLookup,
        base_collection: &'a Collection,
        request_info: Option<&'a RequestInfo>,
        allow_hidden_fields: bool,
    ) -> Self {
        RecordFieldResolver {
            catalog,
            base_collection,
            request_info,
            allowed_fields: DEFAULT_ALLOWED_FIELDS
                .iter()
                .map(|f| AllowedField::new(f.to_string()))
                .collect(),
            allow_hidden_fields,
            max_relation_depth: MAX_RELATION_DEPTH,
            joins: JoinRegistry::new(),
            params: ParamRegistry::new(),
        }
    }

    /// Apply the depth budget and hidden field flag of `config`.
    ///
    /// The depth budget can only be lowered; [`MAX_RELATION_DEPTH`] stays the
    /// upper bound.
    pub fn with_config(mut self, config: &ResolverConfig) -> Self {
        self.max_relation_depth = config.max_relation_depth.clamp(1, MAX_RELATION_DEPTH);
        self.allow_hidden_fields = self.allow_hidden_fields || config.allow_hidden_fields;
        self
    }

    /// Copy of the allowed field entries.
    pub fn allowed_fields(&self) -> Vec<String> {
        self.allowed_fields.iter().map(|f| f.raw.clone()).collect()
    }

    /// Restrict the resolvable paths. Entries are literal paths, anchored
    /// regular expressions or `*`.
    pub fn set_allowed_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_fields = fields
            .into_iter()
            .map(|f| AllowedField::new(f.into()))
            .collect();
    }

    pub fn allow_hidden_fields(&self) -> bool {
        self.allow_hidden_fields
    }

    pub fn set_allow_hidden_fields(&mut self, allow: bool) {
        self.allow_hidden_fields = allow;
    }

    pub fn max_relation_depth(&self) -> usize {
        self.max_relation_depth
    }

    /// Joins registered so far, in registration order.
    pub fn joins(&self) -> &[Join] {
        self.joins.joins()
    }

    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Bind a literal value and return its parameter name.
    pub fn bind_param(&mut self, value: Value) -> String {
        self.params.bind(value)
    }

    pub fn update_param(&mut self, name: &str, value: Value) -> bool {
        self.params.update_value(name, value)
    }

    /// Resolve a field path into a SQL fragment.
    ///
    /// Joins and parameters registered by a failed resolution are discarded.
    pub fn resolve(&mut self, field_name: &str) -> Result<ResolverResult, ResolverError> {
        self.check_field_name(field_name)?;

        let joins_len = self.joins.len();
        let params_checkpoint = self.params.checkpoint();

        let result = PathRunner::new(self, field_name).run();

        if let Err(err) = &result {
            log::debug!("Failed to resolve field '{}': {}", field_name, err);
            self.joins.truncate(joins_len);
            self.params.rollback_to(params_checkpoint);
        }

        result
    }

    /// Append the registered joins and parameters to `query`.
    ///
    /// Joins already present under the same alias are skipped when identical.
    /// The query is made DISTINCT when at least one join was registered.
    pub fn update_query(&self, query: &mut SelectQuery) -> Result<(), ResolverError> {
        for join in self.joins.joins() {
            match query.find_join(&join.alias) {
                Some(existing) if existing == join => continue,
                Some(_) => {
                    log::warn!("Query already has a different join aliased '{}'", join.alias);
                    return Err(ResolverError::AmbiguousAlias(join.alias.clone()));
                }
                None => {
                    query.left_join(join.clone());
                }
            }
        }

        for (name, value) in self.params.iter() {
            query.bind(name, value.clone());
        }

        if !self.joins.is_empty() {
            query.distinct(true);
        }

        Ok(())
    }

    fn check_field_name(&self, field_name: &str) -> Result<(), ResolverError> {
        if !WELL_FORMED_PATH_REGEXES
            .iter()
            .any(|re| re.is_match(field_name))
        {
            return Err(ResolverError::InvalidPathFormat(field_name.to_string()));
        }

        if !self.allowed_fields.iter().any(|f| f.matches(field_name)) {
            return Err(ResolverError::UnknownField(field_name.to_string()));
        }

        Ok(())
    }
}
