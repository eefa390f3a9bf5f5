//! WHERE clause generation from an already parsed comparison AST.

pub mod ast;
pub mod builder;
pub mod errors;

pub use ast::{ComparisonOp, FilterExpr, LogicalOp, Operand};
pub use builder::{build_filter_expr, FilterBuilder};
pub use errors::FilterBuildError;

use crate::resolver::RecordFieldResolver;
use crate::sql::SelectQuery;

/// Build `expr`, add the joins and parameters it needs to `query` and AND it
/// into the query's WHERE clause.
pub fn apply_filter(
    query: &mut SelectQuery,
    expr: &FilterExpr,
    resolver: &mut RecordFieldResolver<'_>,
) -> Result<(), FilterBuildError> {
    let condition = build_filter_expr(expr, resolver)?;
    resolver.update_query(query)?;
    query.and_where(condition);
    Ok(())
}
