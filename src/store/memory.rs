//! In-memory macro source
//!
//! Holds lookup records and objects in memory and notifies listeners when
//! records are saved or removed. Records can be loaded from YAML:
//!
//! ```yaml
//! macros:
//!   - archetype: lookup.macro
//!     code: "@today"
//!     name: Today
//!     expression: "date:today()"
//!   - archetype: lookup.macroReport
//!     code: "@summary"
//!     expression: "."
//!     report: { archetype: entity.documentTemplate, id: "summary" }
//! objects:
//!   - reference: { archetype: entity.documentTemplate, id: "summary" }
//!     value: { name: Summary, document: { archetype: document.other, id: "summary" } }
//!   - reference: { archetype: document.other, id: "summary" }
//!     value: { name: summary.hbs, mimeType: text/plain, content: "Patient: {{name}}" }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{
    read_lock, write_lock, ListenerId, LookupListener, LookupRecord, LookupSource, ObjectResolver,
    Reference, StoreError,
};

type Listeners = Vec<(ListenerId, Arc<dyn LookupListener>)>;

/// In-memory [`LookupSource`] and [`ObjectResolver`]
#[derive(Default)]
pub struct InMemoryLookupStore {
    /// Records by archetype, in insertion order
    lookups: RwLock<HashMap<String, Vec<LookupRecord>>>,

    objects: RwLock<HashMap<Reference, Value>>,

    /// Listeners by archetype
    listeners: RwLock<HashMap<String, Listeners>>,

    next_listener: AtomicU64,

    /// Held from a change until its listeners are notified, so listeners see
    /// changes in the order they were made
    changes: Mutex<()>,
}

/// Layout of a macro YAML file
#[derive(Debug, Deserialize)]
struct MacroFile {
    #[serde(default)]
    macros: Vec<LookupRecord>,

    #[serde(default)]
    objects: Vec<StoredObject>,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    reference: Reference,
    value: Value,
}

impl InMemoryLookupStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a YAML file, or from every YAML file under a directory
    pub fn load_from_path(path: &Path) -> Result<Self, StoreError> {
        let store = Self::new();

        if path.is_dir() {
            store.load_dir_recursive(path)?;
        } else {
            store.load_file(path)?;
        }

        info!(
            "Loaded {} macro records from {:?}",
            read_lock(&store.lookups).values().map(Vec::len).sum::<usize>(),
            path
        );
        Ok(store)
    }

    fn load_dir_recursive(&self, dir: &Path) -> Result<(), StoreError> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();

            if path.is_dir() {
                self.load_dir_recursive(&path)?;
            } else if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                match self.load_file(&path) {
                    Ok(count) => debug!("Loaded {} macros from {:?}", count, path),
                    Err(e) => warn!("Failed to load macros from {:?}: {}", path, e),
                }
            }
        }
        Ok(())
    }

    /// Load records and objects from a YAML file. Returns the number of records
    pub fn load_file(&self, path: &Path) -> Result<usize, StoreError> {
        let content = std::fs::read_to_string(path)?;
        let file: MacroFile = serde_yaml::from_str(&content).map_err(|e| StoreError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        for object in file.objects {
            self.insert_object(object.reference, object.value);
        }
        let count = file.macros.len();
        for record in file.macros {
            self.save(record);
        }
        Ok(count)
    }

    /// Create or update a record, then notify listeners of its archetype.
    ///
    /// Listeners must not change the store from their callbacks.
    pub fn save(&self, record: LookupRecord) {
        let _changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        {
            let mut lookups = write_lock(&self.lookups);
            let records = lookups.entry(record.archetype.clone()).or_default();
            match records.iter_mut().find(|r| r.code == record.code) {
                Some(existing) => *existing = record.clone(),
                None => records.push(record.clone()),
            }
        }
        for listener in self.listeners_for(&record.archetype) {
            listener.saved(&record);
        }
    }

    /// Delete a record, then notify listeners of its archetype
    pub fn remove(&self, archetype: &str, code: &str) -> Option<LookupRecord> {
        let _changes = self.changes.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = {
            let mut lookups = write_lock(&self.lookups);
            let records = lookups.get_mut(archetype)?;
            let index = records.iter().position(|r| r.code == code)?;
            records.remove(index)
        };
        for listener in self.listeners_for(archetype) {
            listener.removed(&removed);
        }
        Some(removed)
    }

    /// Get a record by archetype and code
    pub fn get(&self, archetype: &str, code: &str) -> Option<LookupRecord> {
        read_lock(&self.lookups)
            .get(archetype)
            .and_then(|records| records.iter().find(|r| r.code == code).cloned())
    }

    /// Store an object for [`ObjectResolver::resolve`]
    pub fn insert_object(&self, reference: Reference, value: Value) {
        write_lock(&self.objects).insert(reference, value);
    }

    /// Number of listeners registered for `archetype`
    pub fn listener_count(&self, archetype: &str) -> usize {
        read_lock(&self.listeners)
            .get(archetype)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Snapshot the listeners so none are invoked with the listener lock held
    fn listeners_for(&self, archetype: &str) -> Vec<Arc<dyn LookupListener>> {
        read_lock(&self.listeners)
            .get(archetype)
            .map(|listeners| listeners.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default()
    }
}

impl LookupSource for InMemoryLookupStore {
    fn lookups(&self, archetype: &str) -> Result<Vec<LookupRecord>, StoreError> {
        Ok(read_lock(&self.lookups)
            .get(archetype)
            .cloned()
            .unwrap_or_default())
    }

    fn add_listener(&self, archetype: &str, listener: Arc<dyn LookupListener>) -> ListenerId {
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        write_lock(&self.listeners)
            .entry(archetype.to_string())
            .or_default()
            .push((id, listener));
        id
    }

    fn remove_listener(&self, archetype: &str, id: ListenerId) {
        if let Some(listeners) = write_lock(&self.listeners).get_mut(archetype) {
            listeners.retain(|(existing, _)| *existing != id);
        }
    }
}

impl ObjectResolver for InMemoryLookupStore {
    fn resolve(&self, reference: &Reference) -> Result<Option<Value>, StoreError> {
        Ok(read_lock(&self.objects).get(reference).cloned())
    }
}
