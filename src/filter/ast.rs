//! Comparison AST consumed by the WHERE builder.
//!
//! Filters arrive already parsed. The JSON form is
//!
//! ```json
//! {"type": "group", "join": "or", "items": [
//!     {"type": "comparison", "left": {"field": "title"}, "op": "~", "right": {"text": "abc"}},
//!     {"type": "comparison", "left": {"field": "tags:length"}, "op": ">", "right": {"number": 2}}
//! ]}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::FilterBuildError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterExpr {
    Comparison {
        left: Operand,
        op: ComparisonOp,
        right: Operand,
    },
    Group {
        join: LogicalOp,
        items: Vec<FilterExpr>,
    },
}

impl FilterExpr {
    pub fn comparison(left: Operand, op: ComparisonOp, right: Operand) -> Self {
        FilterExpr::Comparison { left, op, right }
    }

    pub fn and(items: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            join: LogicalOp::And,
            items,
        }
    }

    pub fn or(items: Vec<FilterExpr>) -> Self {
        FilterExpr::Group {
            join: LogicalOp::Or,
            items,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// One side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Field path, resolved through the record field resolver
    Field(String),
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl Operand {
    pub fn field(path: impl Into<String>) -> Self {
        Operand::Field(path.into())
    }

    pub fn text(value: impl Into<String>) -> Self {
        Operand::Text(value.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Neq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "~")]
    Like,
    #[serde(rename = "!~")]
    NotLike,
    #[serde(rename = "?=")]
    AnyEq,
    #[serde(rename = "?!=")]
    AnyNeq,
    #[serde(rename = "?>")]
    AnyGt,
    #[serde(rename = "?>=")]
    AnyGte,
    #[serde(rename = "?<")]
    AnyLt,
    #[serde(rename = "?<=")]
    AnyLte,
    #[serde(rename = "?~")]
    AnyLike,
    #[serde(rename = "?!~")]
    AnyNotLike,
}

impl ComparisonOp {
    pub const ALL: [ComparisonOp; 16] = [
        ComparisonOp::Eq,
        ComparisonOp::Neq,
        ComparisonOp::Gt,
        ComparisonOp::Gte,
        ComparisonOp::Lt,
        ComparisonOp::Lte,
        ComparisonOp::Like,
        ComparisonOp::NotLike,
        ComparisonOp::AnyEq,
        ComparisonOp::AnyNeq,
        ComparisonOp::AnyGt,
        ComparisonOp::AnyGte,
        ComparisonOp::AnyLt,
        ComparisonOp::AnyLte,
        ComparisonOp::AnyLike,
        ComparisonOp::AnyNotLike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Like => "~",
            ComparisonOp::NotLike => "!~",
            ComparisonOp::AnyEq => "?=",
            ComparisonOp::AnyNeq => "?!=",
            ComparisonOp::AnyGt => "?>",
            ComparisonOp::AnyGte => "?>=",
            ComparisonOp::AnyLt => "?<",
            ComparisonOp::AnyLte => "?<=",
            ComparisonOp::AnyLike => "?~",
            ComparisonOp::AnyNotLike => "?!~",
        }
    }

    /// `?` operators match when at least one element satisfies them.
    pub fn is_any(&self) -> bool {
        self.as_str().starts_with('?')
    }

    /// The operator without its `?` prefix.
    pub fn strict(&self) -> ComparisonOp {
        match self {
            ComparisonOp::AnyEq => ComparisonOp::Eq,
            ComparisonOp::AnyNeq => ComparisonOp::Neq,
            ComparisonOp::AnyGt => ComparisonOp::Gt,
            ComparisonOp::AnyGte => ComparisonOp::Gte,
            ComparisonOp::AnyLt => ComparisonOp::Lt,
            ComparisonOp::AnyLte => ComparisonOp::Lte,
            ComparisonOp::AnyLike => ComparisonOp::Like,
            ComparisonOp::AnyNotLike => ComparisonOp::NotLike,
            strict => *strict,
        }
    }
}

impl FromStr for ComparisonOp {
    type Err = FilterBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ComparisonOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| FilterBuildError::InvalidOperator(s.to_string()))
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
