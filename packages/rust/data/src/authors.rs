//! Authors registry: a read-only map from author id to raw author record.

use std::collections::BTreeMap;

use serde_yaml::{Mapping, Value};
use tracing::warn;

/// Raw author entries keyed by integer id.
///
/// Records are kept unvalidated; validation happens when a material's
/// author is resolved so that a bad record fails that material only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuthorRegistry {
    entries: BTreeMap<u64, Mapping>,
}

impl AuthorRegistry {
    /// Build from the `authors` domain map.
    ///
    /// The id is the entry's `id` field, falling back to the map key.
    /// Entries with neither are skipped.
    pub fn from_domain(items: &Mapping) -> Self {
        let mut entries = BTreeMap::new();
        for (key, value) in items {
            let Some(record) = value.as_mapping() else {
                warn!(?key, "author entry is not a mapping, skipping");
                continue;
            };
            let id = record
                .get("id")
                .and_then(Value::as_u64)
                .or_else(|| key_as_id(key));
            match id {
                Some(id) => {
                    entries.insert(id, record.clone());
                }
                None => warn!(?key, "author entry has no integer id, skipping"),
            }
        }
        Self { entries }
    }

    pub fn get(&self, id: u64) -> Option<&Mapping> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key_as_id(key: &Value) -> Option<u64> {
    match key {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
