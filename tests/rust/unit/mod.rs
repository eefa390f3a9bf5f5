//! Unit tests - public API checks that need no fixture catalog
//!
//! Catalog loading, request info parsing and SQL rendering helpers.

mod catalog_loading_tests;
mod query_rendering_tests;
