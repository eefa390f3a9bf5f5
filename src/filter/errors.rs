use thiserror::Error;

use crate::resolver::ResolverError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FilterBuildError {
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("Filter group has no expressions")]
    EmptyGroup,

    #[error("Unsupported comparison operator '{0}'")]
    InvalidOperator(String),
}
