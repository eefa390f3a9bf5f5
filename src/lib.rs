//! rulesql - collection filter and access rule compiler for PostgreSQL
//!
//! This crate turns filters over dynamically defined collections into SQL:
//! - Collection catalog snapshots loaded from YAML
//! - Record field resolution (relations, back-relations, JSON paths, `@request.*`, `@collection.*`)
//! - WHERE clause generation with multi-valued comparison semantics
//! - Named and positional parameter binding

pub mod collection_catalog;
pub mod config;
pub mod filter;
pub mod request_info;
pub mod resolver;
pub mod sql;
