//! Comparison AST to WHERE fragment.

use serde_json::Value;

use crate::request_info::value_to_string;
use crate::resolver::result::MULTI_MATCH_VALUE_COLUMN;
use crate::resolver::{number_value, MultiMatchSubquery, RecordFieldResolver, ResolverResult};
use crate::sql::{placeholder, quote_column, quote_identifier, ParamRegistry, ToSql};

use super::ast::{ComparisonOp, FilterExpr, Operand};
use super::errors::FilterBuildError;

/// Build the WHERE fragment of `expr`, registering joins and parameters on
/// `resolver`.
pub fn build_filter_expr(
    expr: &FilterExpr,
    resolver: &mut RecordFieldResolver<'_>,
) -> Result<String, FilterBuildError> {
    FilterBuilder::new(resolver).build(expr)
}

pub struct FilterBuilder<'r, 'a> {
    resolver: &'r mut RecordFieldResolver<'a>,
    /// Suffix source for multi-match subquery aliases
    subquery_counter: usize,
}

impl<'r, 'a> FilterBuilder<'r, 'a> {
    pub fn new(resolver: &'r mut RecordFieldResolver<'a>) -> Self {
        FilterBuilder {
            resolver,
            subquery_counter: 0,
        }
    }

    pub fn build(&mut self, expr: &FilterExpr) -> Result<String, FilterBuildError> {
        match expr {
            FilterExpr::Comparison { left, op, right } => self.build_comparison(left, *op, right),
            FilterExpr::Group { join, items } => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(self.build(item)?);
                }

                match parts.len() {
                    0 => Err(FilterBuildError::EmptyGroup),
                    1 => Ok(parts.remove(0)),
                    _ => Ok(format!("({})", parts.join(&format!(" {} ", join.as_sql())))),
                }
            }
        }
    }

    fn build_comparison(
        &mut self,
        left: &Operand,
        op: ComparisonOp,
        right: &Operand,
    ) -> Result<String, FilterBuildError> {
        let left = self.resolve_operand(left)?;
        let right = self.resolve_operand(right)?;

        let mut expr = self.compare(&left, op, &right);

        if !op.is_any() {
            expr = self.multi_match(expr, &left, op, &right);
        }

        for after_build in [&left.after_build, &right.after_build].into_iter().flatten() {
            expr = after_build.apply(&expr);
        }

        Ok(expr)
    }

    fn resolve_operand(&mut self, operand: &Operand) -> Result<ResolverResult, FilterBuildError> {
        let result = match operand {
            Operand::Field(path) => self.resolver.resolve(path)?,
            Operand::Text(text) => self.bind(Value::String(text.clone())),
            Operand::Number(n) => match number_value(*n) {
                Value::Null => ResolverResult::null(),
                value => self.bind(value),
            },
            Operand::Bool(b) => ResolverResult::bool_literal(*b),
            Operand::Null => ResolverResult::null(),
        };
        Ok(result)
    }

    fn bind(&mut self, value: Value) -> ResolverResult {
        let name = self.resolver.bind_param(value);
        let identifier = placeholder(&name);
        ResolverResult::param(name, identifier)
    }

    /// Plain comparison of two resolved operands.
    fn compare(&mut self, left: &ResolverResult, op: ComparisonOp, right: &ResolverResult) -> String {
        let params = self.resolver.params();
        match op.strict() {
            ComparisonOp::Eq => equality(true, left, right, params),
            ComparisonOp::Neq => equality(false, left, right, params),
            ComparisonOp::Like => self.like(false, left, right),
            ComparisonOp::NotLike => self.like(true, left, right),
            ordering => format!(
                "{} {} {}",
                left.identifier,
                ordering.as_str(),
                right.identifier
            ),
        }
    }

    fn like(&mut self, negate: bool, left: &ResolverResult, right: &ResolverResult) -> String {
        let keyword = if negate { "NOT LIKE" } else { "LIKE" };

        // a column (or NULL) on the right is matched as a substring
        if right.params.is_empty() {
            return format!(
                "{}::text {} ('%' || {} || '%') ESCAPE '\\'",
                left.identifier, keyword, right.identifier
            );
        }

        for name in &right.params {
            self.wrap_like_param(name);
        }

        format!(
            "{}::text {} {} ESCAPE '\\'",
            left.identifier, keyword, right.identifier
        )
    }

    /// Turn a bound value into a "contains" pattern unless it already carries
    /// its own `%` wildcard.
    fn wrap_like_param(&mut self, name: &str) {
        let Some(value) = self.resolver.param(name) else {
            return;
        };

        let pattern = value_to_string(value);
        if contains_unescaped(&pattern, '%') {
            return;
        }

        let wrapped = format!("%{}%", escape_unescaped(&pattern, &['\\', '%', '_']));
        self.resolver.update_param(name, Value::String(wrapped));
    }

    /// Add the "every element" guard to a comparison over multi-valued operands.
    fn multi_match(
        &mut self,
        expr: String,
        left: &ResolverResult,
        op: ComparisonOp,
        right: &ResolverResult,
    ) -> String {
        match (&left.multi_match, &right.multi_match) {
            (Some(left_subquery), Some(right_subquery)) => {
                self.subquery_counter += 1;
                let left_alias = format!("__ml{}", self.subquery_counter);
                let right_alias = format!("__mr{}", self.subquery_counter);

                let inner = self.compare(
                    &multi_match_value(&left_alias, left.no_coalesce),
                    op,
                    &multi_match_value(&right_alias, right.no_coalesce),
                );

                format!(
                    "(({}) AND (NOT EXISTS (SELECT 1 FROM ({}) {} LEFT JOIN ({}) {} ON TRUE WHERE NOT ({}))))",
                    expr,
                    left_subquery.to_sql(),
                    quote_identifier(&left_alias),
                    right_subquery.to_sql(),
                    quote_identifier(&right_alias),
                    inner
                )
            }
            (Some(subquery), None) => self.many_vs_one(expr, subquery, left.no_coalesce, op, right, false),
            (None, Some(subquery)) => self.many_vs_one(expr, subquery, right.no_coalesce, op, left, true),
            (None, None) => expr,
        }
    }

    fn many_vs_one(
        &mut self,
        expr: String,
        subquery: &MultiMatchSubquery,
        no_coalesce: bool,
        op: ComparisonOp,
        other: &ResolverResult,
        inverse: bool,
    ) -> String {
        self.subquery_counter += 1;
        let alias = format!("__sm{}", self.subquery_counter);

        let value = multi_match_value(&alias, no_coalesce);
        let other = ResolverResult {
            identifier: other.identifier.clone(),
            params: other.params.clone(),
            ..Default::default()
        };

        let inner = if inverse {
            self.compare(&other, op, &value)
        } else {
            self.compare(&value, op, &other)
        };

        format!(
            "(({}) AND (NOT EXISTS (SELECT 1 FROM ({}) {} WHERE NOT ({}))))",
            expr,
            subquery.to_sql(),
            quote_identifier(&alias),
            inner
        )
    }
}

fn multi_match_value(alias: &str, no_coalesce: bool) -> ResolverResult {
    ResolverResult {
        identifier: quote_column(alias, MULTI_MATCH_VALUE_COLUMN),
        no_coalesce,
        ..Default::default()
    }
}

/// `=` / `!=` with NULL and `''` treated as the same value.
fn equality(
    equal: bool,
    left: &ResolverResult,
    right: &ResolverResult,
    params: &ParamRegistry,
) -> String {
    let (op, null_safe_op, concat, null_check) = if equal {
        ("=", "IS NOT DISTINCT FROM", "OR", "IS NULL")
    } else {
        ("IS DISTINCT FROM", "IS DISTINCT FROM", "AND", "IS NOT NULL")
    };

    // JSON extractions keep NULL distinct from ''
    if left.no_coalesce || right.no_coalesce {
        return format!("{} {} {}", left.identifier, null_safe_op, right.identifier);
    }

    let left_empty = is_empty_value(left, params);
    let right_empty = is_empty_value(right, params);

    if left_empty && right_empty {
        return format!("'' {} ''", op);
    }

    if is_known_non_empty(left, params) || is_known_non_empty(right, params) {
        let l = if left_empty { "''" } else { left.identifier.as_str() };
        let r = if right_empty { "''" } else { right.identifier.as_str() };
        return format!("{} {} {}", l, op, r);
    }

    if left_empty {
        return format!(
            "('' {op} {r} {concat} {r} {null_check})",
            op = op,
            r = right.identifier,
            concat = concat,
            null_check = null_check
        );
    }

    if right_empty {
        return format!(
            "({l} {op} '' {concat} {l} {null_check})",
            l = left.identifier,
            op = op,
            concat = concat,
            null_check = null_check
        );
    }

    format!(
        "COALESCE({}, '') {} COALESCE({}, '')",
        left.identifier, op, right.identifier
    )
}

fn is_empty_identifier(result: &ResolverResult) -> bool {
    matches!(
        result.identifier.to_lowercase().as_str(),
        "" | "null" | "''" | "\"\"" | "``"
    )
}

fn is_empty_value(result: &ResolverResult, params: &ParamRegistry) -> bool {
    is_empty_identifier(result) || has_empty_param(result, params)
}

/// Whether one of the values bound for `result` is NULL or `''`.
fn has_empty_param(result: &ResolverResult, params: &ParamRegistry) -> bool {
    result.params.iter().any(|name| match params.get(name) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    })
}

fn is_known_non_empty(result: &ResolverResult, params: &ParamRegistry) -> bool {
    if matches!(
        result.identifier.to_lowercase().as_str(),
        "1" | "0" | "true" | "false"
    ) {
        return true;
    }
    !result.params.is_empty() && !has_empty_param(result, params) && !is_empty_identifier(result)
}

/// Whether `s` contains `ch` not preceded by a backslash.
fn contains_unescaped(s: &str, ch: char) -> bool {
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ch {
            return true;
        }
    }
    false
}

/// Backslash-escape every occurrence of `chars` that is not escaped already.
fn escape_unescaped(s: &str, chars: &[char]) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    let mut iter = s.chars().peekable();

    while let Some(c) = iter.next() {
        if c == '\\' {
            match iter.peek() {
                Some(next) if chars.contains(next) => {
                    out.push(c);
                    out.push(*next);
                    iter.next();
                }
                _ => out.push_str("\\\\"),
            }
        } else if chars.contains(&c) {
            out.push('\\');
            out.push(c);
        } else {
            out.push(c);
        }
    }

    out
}
