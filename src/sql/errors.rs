use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SqlError {
    #[error("No value bound for placeholder {{:{0}}}")]
    UnboundParameter(String),
}
