//! Per-evaluation registry of the joins a filter needs.
//!
//! Aliases are derived from the traversed path (`demo4_self_rel_many`,
//! `__auth_users`, `__data_demo3_rel_one`, ...), so the alias doubles as the
//! canonical path key: resolving the same path twice finds the existing entry
//! and registers nothing new.

use crate::sql::Join;

use super::errors::ResolverError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinRegistry {
    joins: Vec<Join>,
}

impl JoinRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a join unless an identical one exists.
    ///
    /// Returns `true` when the join was added.
    pub fn register(&mut self, join: Join) -> Result<bool, ResolverError> {
        match self.get(&join.alias) {
            Some(existing) if *existing == join => Ok(false),
            Some(_) => {
                log::warn!("Table alias '{}' is already used by another join", join.alias);
                Err(ResolverError::AmbiguousAlias(join.alias))
            }
            None => {
                log::trace!("Registering join {}", join.alias);
                self.joins.push(join);
                Ok(true)
            }
        }
    }

    pub fn get(&self, alias: &str) -> Option<&Join> {
        self.joins.iter().find(|j| j.alias == alias)
    }

    /// Joins in first-registration order.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.joins.truncate(len);
    }
}
