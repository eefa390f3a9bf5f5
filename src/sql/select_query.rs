use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

use super::errors::SqlError;
use super::identifiers::quote_identifier;
use super::params::ParamRegistry;
use super::ToSql;

lazy_static! {
    static ref PLACEHOLDER_REGEX: Regex = Regex::new(r"\{:(\w+)\}").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinSource {
    /// Plain table, quoted on render
    Table(String),
    /// Table valued expression rendered as is, e.g. `pb_json_each(...)`
    Expression(String),
}

/// A `LEFT JOIN`; a missing condition renders as `ON TRUE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub source: JoinSource,
    pub alias: String,
    pub on: Option<String>,
}

impl Join {
    pub fn table(table: impl Into<String>, alias: impl Into<String>, on: Option<String>) -> Self {
        Join {
            source: JoinSource::Table(table.into()),
            alias: alias.into(),
            on,
        }
    }

    pub fn expression(expr: impl Into<String>, alias: impl Into<String>, on: Option<String>) -> Self {
        Join {
            source: JoinSource::Expression(expr.into()),
            alias: alias.into(),
            on,
        }
    }
}

impl ToSql for Join {
    fn to_sql(&self) -> String {
        let source = match &self.source {
            JoinSource::Table(table) => quote_identifier(table),
            JoinSource::Expression(expr) => expr.clone(),
        };
        format!(
            "LEFT JOIN {} {} ON {}",
            source,
            quote_identifier(&self.alias),
            self.on.as_deref().unwrap_or("TRUE")
        )
    }
}

/// `SELECT "table".* FROM "table"` with left joins, AND-ed conditions and
/// named parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    table: String,
    distinct: bool,
    joins: Vec<Join>,
    conditions: Vec<String>,
    params: ParamRegistry,
}

impl SelectQuery {
    pub fn for_table(table: impl Into<String>) -> Self {
        SelectQuery {
            table: table.into(),
            distinct: false,
            joins: Vec::new(),
            conditions: Vec::new(),
            params: ParamRegistry::new(),
        }
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn left_join(&mut self, join: Join) -> &mut Self {
        self.joins.push(join);
        self
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn find_join(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    pub fn has_join(&self, alias: &str) -> bool {
        self.find_join(alias).is_some()
    }

    /// Add a condition; multiple conditions are combined with AND.
    pub fn and_where(&mut self, condition: impl Into<String>) -> &mut Self {
        let condition = condition.into();
        if !condition.trim().is_empty() {
            self.conditions.push(condition);
        }
        self
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.params.bind_named(name, value);
        self
    }

    pub fn params(&self) -> &ParamRegistry {
        &self.params
    }

    /// Render with PostgreSQL `$n` placeholders, returning the values in
    /// placeholder order. A name used more than once shares one position.
    pub fn to_positional(&self) -> Result<(String, Vec<Value>), SqlError> {
        let sql = self.to_sql();
        let mut rendered = String::with_capacity(sql.len());
        let mut names: Vec<&str> = Vec::new();
        let mut values = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_REGEX.captures_iter(&sql) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let name = name.as_str();

            let position = match names.iter().position(|n| *n == name) {
                Some(idx) => idx + 1,
                None => {
                    let value = self
                        .params
                        .get(name)
                        .ok_or_else(|| SqlError::UnboundParameter(name.to_string()))?;
                    names.push(name);
                    values.push(value.clone());
                    names.len()
                }
            };

            rendered.push_str(&sql[last..whole.start()]);
            rendered.push_str(&format!("${}", position));
            last = whole.end();
        }
        rendered.push_str(&sql[last..]);

        Ok((rendered, values))
    }
}

impl ToSql for SelectQuery {
    fn to_sql(&self) -> String {
        let table = quote_identifier(&self.table);
        let mut sql = format!(
            "SELECT {}{}.* FROM {}",
            if self.distinct { "DISTINCT " } else { "" },
            table,
            table
        );

        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql());
        }

        match self.conditions.len() {
            0 => {}
            1 => {
                sql.push_str(" WHERE ");
                sql.push_str(&self.conditions[0]);
            }
            _ => {
                let conditions: Vec<String> =
                    self.conditions.iter().map(|c| format!("({})", c)).collect();
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }
        }

        sql
    }
}
