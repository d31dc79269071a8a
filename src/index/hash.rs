//! The hash index: a field-to-value mapping per key.

use std::collections::HashMap;

#[derive(Default)]
pub struct HashIndex {
    record: HashMap<Vec<u8>, HashMap<Vec<u8>, Vec<u8>>>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, returning true when the field did not exist before.
    pub fn hset(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> bool {
        self.record
            .entry(key.to_vec())
            .or_default()
            .insert(field.to_vec(), value)
            .is_none()
    }

    /// Sets a field only when it is absent. Returns whether the set happened.
    pub fn hsetnx(&mut self, key: &[u8], field: &[u8], value: Vec<u8>) -> bool {
        let fields = self.record.entry(key.to_vec()).or_default();
        if fields.contains_key(field) {
            return false;
        }
        fields.insert(field.to_vec(), value);
        true
    }

    pub fn hget(&self, key: &[u8], field: &[u8]) -> Option<Vec<u8>> {
        self.record.get(key)?.get(field).cloned()
    }

    /// All field/value pairs of the hash.
    pub fn hgetall(&self, key: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.record.get(key).map_or_else(Vec::new, |fields| {
            fields.iter().map(|(f, v)| (f.clone(), v.clone())).collect()
        })
    }

    /// Deletes a field, returning whether it existed.
    pub fn hdel(&mut self, key: &[u8], field: &[u8]) -> bool {
        self.record
            .get_mut(key)
            .is_some_and(|fields| fields.remove(field).is_some())
    }

    pub fn hexists(&self, key: &[u8], field: &[u8]) -> bool {
        self.record
            .get(key)
            .is_some_and(|fields| fields.contains_key(field))
    }

    pub fn hlen(&self, key: &[u8]) -> usize {
        self.record.get(key).map_or(0, |fields| fields.len())
    }

    pub fn hkeys(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record.get(key).map_or_else(Vec::new, |fields| {
            fields.keys().cloned().collect()
        })
    }

    pub fn hvals(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.record.get(key).map_or_else(Vec::new, |fields| {
            fields.values().cloned().collect()
        })
    }
}
