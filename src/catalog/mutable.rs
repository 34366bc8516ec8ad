//! In-memory catalog implementation.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::catalog::{Catalog, Index, IndexRef, Table, TableRef};
use crate::statistics::{StatisticsProvider, TableStatistics};

/// A [catalog](super::Catalog) that stores tables, indexes and table statistics in memory
/// and allows a caller to register new objects at any time.
#[derive(Debug)]
pub struct MutableCatalog {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<String, TableRef>,
    indexes: HashMap<String, IndexRef>,
    statistics: HashMap<String, Arc<TableStatistics>>,
}

impl MutableCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        MutableCatalog {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Registers the given table in this catalog. An existing table with the same name is replaced.
    pub fn add_table(&self, table: Table) {
        let mut inner = self.inner.write().unwrap();
        inner.tables.insert(table.name().into(), Arc::new(table));
    }

    /// Registers the given index in this catalog. An existing index with the same name is replaced.
    pub fn add_index(&self, index: Index) {
        let mut inner = self.inner.write().unwrap();
        inner.indexes.insert(index.name().into(), Arc::new(index));
    }

    /// Sets statistics for the table with the given name.
    pub fn set_statistics(&self, table: &str, statistics: TableStatistics) {
        let mut inner = self.inner.write().unwrap();
        inner.statistics.insert(table.into(), Arc::new(statistics));
    }
}

impl Default for MutableCatalog {
    fn default() -> Self {
        MutableCatalog::new()
    }
}

impl Catalog for MutableCatalog {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn get_table(&self, name: &str) -> Option<TableRef> {
        let inner = self.inner.read().unwrap();
        inner.tables.get(name).cloned()
    }

    fn get_index(&self, name: &str) -> Option<IndexRef> {
        let inner = self.inner.read().unwrap();
        inner.indexes.get(name).cloned()
    }

    fn get_indexes(&self, table: &str) -> Vec<IndexRef> {
        let inner = self.inner.read().unwrap();
        let mut indexes: Vec<_> = inner.indexes.values().filter(|i| i.table() == table).cloned().collect();
        // HashMap iteration order is unspecified, keep the result stable.
        indexes.sort_by(|a, b| a.name().cmp(b.name()));
        indexes
    }
}

impl StatisticsProvider for MutableCatalog {
    fn table_statistics(&self, table: &str) -> Option<Arc<TableStatistics>> {
        let inner = self.inner.read().unwrap();
        inner.statistics.get(table).cloned()
    }
}
