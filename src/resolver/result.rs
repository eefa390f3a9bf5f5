use crate::sql::{quote_column, quote_identifier, Join, ToSql};

/// Output of one field resolution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolverResult {
    /// SQL fragment standing for the field value
    pub identifier: String,

    /// Parameters referenced directly by `identifier`.
    ///
    /// Static request values, literals and submitted `:each` items populate
    /// this; parameters used only by join conditions are not listed.
    pub params: Vec<String>,

    /// The value is a JSON extraction; equality must not be coalesced to `''`.
    pub no_coalesce: bool,

    /// Set when the path went through a multi-valued join.
    pub multi_match: Option<MultiMatchSubquery>,

    /// Wrapper applied to the final comparison expression.
    pub after_build: Option<AfterBuild>,
}

impl ResolverResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        ResolverResult {
            identifier: identifier.into(),
            ..Default::default()
        }
    }

    pub fn null() -> Self {
        Self::new("NULL")
    }

    pub fn bool_literal(value: bool) -> Self {
        Self::new(if value { "TRUE" } else { "FALSE" })
    }

    /// A value bound to a single parameter.
    pub fn param(name: String, identifier: impl Into<String>) -> Self {
        ResolverResult {
            identifier: identifier.into(),
            params: vec![name],
            ..Default::default()
        }
    }
}

/// Post-processing of a built comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AfterBuild {
    /// The email of an auth record is only visible when the record allows it.
    RequireEmailVisibility { table_alias: String },
}

impl AfterBuild {
    pub fn apply(&self, expr: &str) -> String {
        match self {
            AfterBuild::RequireEmailVisibility { table_alias } => format!(
                "(({}) AND ({} = TRUE))",
                expr,
                quote_column(table_alias, "emailVisibility")
            ),
        }
    }
}

/// Correlated subquery listing every value a multi-valued path can take for
/// the current base row.
///
/// It mirrors the joins of the main query under `__mm_` prefixed aliases and
/// is used to rewrite strict comparisons into "no element violates it".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiMatchSubquery {
    pub base_table_alias: String,
    pub from_table_name: String,
    pub from_table_alias: String,
    pub value_identifier: String,
    pub joins: Vec<Join>,
}

pub const MULTI_MATCH_VALUE_COLUMN: &str = "multiMatchValue";

impl ToSql for MultiMatchSubquery {
    fn to_sql(&self) -> String {
        let mut sql = format!(
            "SELECT {} AS {} FROM {} {}",
            self.value_identifier,
            quote_identifier(MULTI_MATCH_VALUE_COLUMN),
            quote_identifier(&self.from_table_name),
            quote_identifier(&self.from_table_alias),
        );

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        sql.push_str(&format!(
            " WHERE {} = {}",
            quote_column(&self.from_table_alias, "id"),
            quote_column(&self.base_table_alias, "id")
        ));

        sql
    }
}
