//! PostgreSQL text generation shared by the resolver and the filter builder.
//!
//! Every caller-supplied value reaches SQL text through a named `{:name}`
//! placeholder; identifiers go through [`identifiers::quote_identifier`].

pub mod errors;
pub mod identifiers;
pub mod params;
pub mod select_query;

pub use errors::SqlError;
pub use identifiers::{
    columnify, json_array_length, json_each, json_extract, placeholder, quote_column,
    quote_identifier,
};
pub use params::{ParamCheckpoint, ParamRegistry};
pub use select_query::{Join, JoinSource, SelectQuery};

pub trait ToSql {
    fn to_sql(&self) -> String;
}
