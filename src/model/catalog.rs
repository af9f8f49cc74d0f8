//! Per-item ownership and usage aggregates across the whole collection.

use std::collections::HashMap;

use super::UserRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub id: String,
    pub name: String,
    /// Owning identifiers, in collection order, without duplicates.
    pub owners: Vec<String>,
    pub total_playtime: u64,
    pub avg_playtime: f64,
}

/// Read-only catalog built once from the full collection.
///
/// Entries keep the order in which items first appear in the collection;
/// that order is what recommendation ranking falls back on for ties.
#[derive(Debug, Clone, Default)]
pub struct GameCatalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

impl GameCatalog {
    pub fn build(records: &[UserRecord]) -> Self {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for record in records {
            for item in record.items() {
                if item.id.is_empty() {
                    continue;
                }
                let slot = *index.entry(item.id.clone()).or_insert_with(|| {
                    entries.push(CatalogEntry {
                        id: item.id.clone(),
                        name: item.name.clone(),
                        owners: Vec::new(),
                        total_playtime: 0,
                        avg_playtime: 0.0,
                    });
                    entries.len() - 1
                });

                let entry = &mut entries[slot];
                // A record listing the same item twice still owns it once.
                if entry.owners.last() == Some(&record.identifier) {
                    continue;
                }
                entry.owners.push(record.identifier.clone());
                entry.total_playtime += item.playtime_minutes;
            }
        }

        for entry in &mut entries {
            if !entry.owners.is_empty() {
                entry.avg_playtime = entry.total_playtime as f64 / entry.owners.len() as f64;
            }
        }

        Self { entries, index }
    }

    pub fn get(&self, item_id: &str) -> Option<&CatalogEntry> {
        self.index.get(item_id).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
