//! Identity map deduplicating live model instances.

use std::collections::HashMap;

use crate::model::Model;
use crate::value::Value;

/// Multi-index map from key values to live models.
///
/// The identity attribute is always the first index. A model is present in
/// every index for which it holds a non-empty value.
#[derive(Debug)]
pub struct Store {
    id_attribute: String,
    indexes: Vec<String>,
    caches: HashMap<String, HashMap<String, Model>>,
}

impl Store {
    pub fn new(id_attribute: impl Into<String>) -> Self {
        let id_attribute = id_attribute.into();
        let mut store = Store {
            id_attribute: id_attribute.clone(),
            indexes: Vec::new(),
            caches: HashMap::new(),
        };
        store.index(id_attribute);
        store
    }

    /// Adds a secondary index. Models already stored are not back-filled.
    pub fn index(&mut self, name: impl Into<String>) {
        let name = name.into();
        if self.caches.contains_key(&name) {
            return;
        }
        self.caches.insert(name.clone(), HashMap::new());
        self.indexes.push(name);
    }

    pub fn indexes(&self) -> &[String] {
        &self.indexes
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    pub fn clear(&mut self) {
        for cache in self.caches.values_mut() {
            cache.clear();
        }
    }

    pub fn get(&self, id: &str) -> Option<Model> {
        self.get_by(&self.id_attribute, id)
    }

    pub fn get_by(&self, index: &str, key: &str) -> Option<Model> {
        self.caches
            .get(index)
            .and_then(|cache| cache.get(key))
            .cloned()
    }

    pub fn add(&mut self, model: &Model) {
        for index in &self.indexes {
            if let Some(key) = model.get_value(index).key() {
                if let Some(cache) = self.caches.get_mut(index) {
                    log::trace!("store: {} {}={}", model.cid(), index, key);
                    cache.insert(key, model.clone());
                }
            }
        }
    }

    /// Removes `model` from every index it occupies.
    pub fn remove(&mut self, model: &Model) {
        for cache in self.caches.values_mut() {
            cache.retain(|_, stored| !stored.ptr_eq(model));
        }
    }

    /// Moves `model` from `old` to `new` in `index` after one of its indexed
    /// values changed.
    pub(crate) fn reindex(&mut self, model: &Model, index: &str, old: &Value, new: &Value) {
        let Some(cache) = self.caches.get_mut(index) else {
            return;
        };
        if let Some(old) = old.key() {
            if cache.get(&old).is_some_and(|stored| stored.ptr_eq(model)) {
                cache.remove(&old);
            }
        }
        if let Some(new) = new.key() {
            cache.insert(new, model.clone());
        }
    }

    /// Number of models keyed by identity.
    pub fn len(&self) -> usize {
        self.caches.get(&self.id_attribute).map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
