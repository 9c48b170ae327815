//! Materialized-object cache.
//!
//! Keyed by object number. Unbounded by default; with a capacity it keeps
//! the most recently used objects. `release` is explicit and idempotent.

use crate::model::PDFObject;
use indexmap::IndexMap;
use std::cell::{Cell, RefCell};
use std::sync::Arc;

struct Slots {
    capacity: Option<usize>,
    map: IndexMap<u32, Arc<PDFObject>>,
}

impl Slots {
    fn get(&mut self, objid: u32) -> Option<Arc<PDFObject>> {
        let index = self.map.get_index_of(&objid)?;
        let value = Arc::clone(self.map.get_index(index)?.1);
        if self.capacity.is_some() && index + 1 != self.map.len() {
            self.map.move_index(index, self.map.len() - 1);
        }
        Some(value)
    }

    fn insert(&mut self, objid: u32, value: Arc<PDFObject>) {
        if self.capacity == Some(0) {
            return;
        }
        self.map.shift_remove(&objid);
        self.map.insert(objid, value);
        if let Some(capacity) = self.capacity
            && self.map.len() > capacity
        {
            self.map.shift_remove_index(0);
        }
    }
}

/// Object cache plus parse instrumentation for one document.
pub struct ObjectCache {
    slots: RefCell<Slots>,
    parses: Cell<u64>,
}

impl ObjectCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            slots: RefCell::new(Slots {
                capacity,
                map: IndexMap::new(),
            }),
            parses: Cell::new(0),
        }
    }

    pub fn get(&self, objid: u32) -> Option<Arc<PDFObject>> {
        self.slots.borrow_mut().get(objid)
    }

    pub fn insert(&self, objid: u32, value: Arc<PDFObject>) {
        self.slots.borrow_mut().insert(objid, value);
    }

    /// Drop the cached value for `objid`. Returns whether one was present.
    pub fn release(&self, objid: u32) -> bool {
        let removed = self.slots.borrow_mut().map.shift_remove(&objid).is_some();
        tracing::trace!(objid, removed, "release");
        removed
    }

    pub fn contains(&self, objid: u32) -> bool {
        self.slots.borrow().map.contains_key(&objid)
    }

    pub fn len(&self) -> usize {
        self.slots.borrow().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.slots.borrow_mut().map.clear();
    }

    /// Count one materialization from file bytes.
    pub fn record_parse(&self) {
        self.parses.set(self.parses.get() + 1);
    }

    /// Materializations so far.
    pub fn parse_count(&self) -> u64 {
        self.parses.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_evicts_oldest() {
        let cache = ObjectCache::new(Some(2));
        cache.insert(1, Arc::new(PDFObject::Int(1)));
        cache.insert(2, Arc::new(PDFObject::Int(2)));
        assert!(cache.get(1).is_some());
        cache.insert(3, Arc::new(PDFObject::Int(3)));
        assert!(cache.contains(1));
        assert!(!cache.contains(2));
        assert!(cache.contains(3));
    }

    #[test]
    fn unbounded_keeps_everything() {
        let cache = ObjectCache::new(None);
        for i in 0..500 {
            cache.insert(i, Arc::new(PDFObject::Int(i64::from(i))));
        }
        assert_eq!(cache.len(), 500);
    }

    #[test]
    fn release_is_idempotent() {
        let cache = ObjectCache::new(None);
        cache.insert(4, Arc::new(PDFObject::Null));
        assert!(cache.release(4));
        assert!(!cache.release(4));
        assert!(!cache.release(99));
    }

    #[test]
    fn zero_capacity_caches_nothing() {
        let cache = ObjectCache::new(Some(0));
        cache.insert(1, Arc::new(PDFObject::Null));
        assert!(cache.is_empty());
    }
}
