//! Shared catalog snapshot.
//!
//! Readers take an `Arc` of the current catalog and keep it for the duration of
//! one filter evaluation. A refresh builds a new catalog and swaps the pointer;
//! snapshots already handed out are never mutated.

use std::path::Path;
use std::sync::{Arc, RwLock};

use super::config::CatalogConfig;
use super::errors::CatalogError;
use super::schema::CollectionCatalog;

#[derive(Debug, Default)]
pub struct CatalogStore {
    current: RwLock<Arc<CollectionCatalog>>,
}

impl CatalogStore {
    pub fn new(catalog: CollectionCatalog) -> Self {
        CatalogStore {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let catalog = CatalogConfig::from_yaml_file(path)?.to_catalog()?;
        Ok(Self::new(catalog))
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<CollectionCatalog> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Atomically replace the snapshot, returning the previous one.
    pub fn replace(&self, catalog: CollectionCatalog) -> Arc<CollectionCatalog> {
        let next = Arc::new(catalog);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log::info!("Replacing collection catalog ({} collections)", next.len());
        std::mem::replace(&mut *guard, next)
    }

    /// Reload from YAML; the current snapshot stays in place when loading fails.
    pub fn reload_from_yaml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CatalogError> {
        let catalog = CatalogConfig::from_yaml_file(path)?.to_catalog()?;
        self.replace(catalog);
        Ok(())
    }
}
