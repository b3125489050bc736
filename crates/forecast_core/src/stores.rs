//! Store attribute lookup table

use crate::errors::{ArtifactError, Result};
use salescast_types::StoreAttributes;
use std::collections::HashMap;

/// Immutable `Store` -> attributes index, built once at startup
#[derive(Debug, Clone, Default)]
pub struct StoreTable {
    by_store: HashMap<i64, StoreAttributes>,
}

impl StoreTable {
    /// Index the rows by store id. Duplicate ids make the join ambiguous and
    /// are rejected.
    pub fn from_rows(rows: Vec<StoreAttributes>) -> Result<Self> {
        let mut by_store = HashMap::with_capacity(rows.len());
        for row in rows {
            let store = row.store;
            if by_store.insert(store, row).is_some() {
                return Err(ArtifactError::Inconsistent(format!(
                    "store {store} appears more than once in the store table"
                )));
            }
        }
        Ok(Self { by_store })
    }

    pub fn get(&self, store: i64) -> Option<&StoreAttributes> {
        self.by_store.get(&store)
    }

    pub fn contains(&self, store: i64) -> bool {
        self.by_store.contains_key(&store)
    }

    pub fn len(&self) -> usize {
        self.by_store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_store.is_empty()
    }
}
