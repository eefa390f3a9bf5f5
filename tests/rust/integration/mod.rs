//! Integration tests - resolver and filter builder against a YAML catalog
//!
//! These tests compile full filters into SQL using the fixture catalog in
//! `tests/fixtures/collections.yaml`. No database is involved.

mod common;
mod filter_sql_tests;
mod request_field_tests;
