//! Insertion-ordered record storage shared by the three Face tables.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Identifier of a table record. Monotonically allocated, never zero, never
/// reused within one container.
pub type RecordId = u64;

/// A mapping from [`RecordId`] to records with insertion-ordered iteration
/// and an `on_empty` notification that fires exactly when the last entry is
/// removed.
///
/// Iteration happens over id snapshots, so callbacks running mid-iteration
/// may freely insert into or remove from the same container: concurrent
/// insertions are not visited, and concurrent removals are tolerated.
pub struct RecordContainer<T> {
    // ids are monotonic, so BTreeMap order is insertion order
    records: RefCell<BTreeMap<RecordId, Rc<T>>>,
    last_id: Cell<RecordId>,
    on_empty: RefCell<Option<Box<dyn Fn()>>>,
}

impl<T> RecordContainer<T> {
    pub fn new() -> Self {
        Self {
            records: RefCell::new(BTreeMap::new()),
            last_id: Cell::new(0),
            on_empty: RefCell::new(None),
        }
    }

    /// Installs the callback fired when the container becomes empty.
    pub fn set_on_empty(&self, callback: Box<dyn Fn()>) {
        *self.on_empty.borrow_mut() = Some(callback);
    }

    /// Allocates the next record id.
    pub fn allocate_id(&self) -> RecordId {
        let id = self.last_id.get() + 1;
        self.last_id.set(id);
        id
    }

    /// Inserts a record under a previously allocated id and returns a stable
    /// reference to it.
    pub fn insert(&self, id: RecordId, record: T) -> Rc<T> {
        let record = Rc::new(record);
        self.records.borrow_mut().insert(id, record.clone());
        record
    }

    /// Allocates an id and inserts in one step.
    pub fn put(&self, record: T) -> (RecordId, Rc<T>) {
        let id = self.allocate_id();
        let record = self.insert(id, record);
        (id, record)
    }

    pub fn get(&self, id: RecordId) -> Option<Rc<T>> {
        self.records.borrow().get(&id).cloned()
    }

    /// Removes a record. Fires `on_empty` if this removed the last entry.
    pub fn erase(&self, id: RecordId) -> Option<Rc<T>> {
        let (removed, now_empty) = {
            let mut records = self.records.borrow_mut();
            let removed = records.remove(&id);
            (removed, records.is_empty())
        };
        if removed.is_some() && now_empty {
            self.notify_empty();
        }
        removed
    }

    /// Removes every record without visiting them. Fires `on_empty` if the
    /// container was not already empty.
    pub fn clear(&self) {
        let had_records = {
            let mut records = self.records.borrow_mut();
            let had = !records.is_empty();
            records.clear();
            had
        };
        if had_records {
            self.notify_empty();
        }
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    /// Ids currently present, in insertion order.
    pub fn ids(&self) -> Vec<RecordId> {
        self.records.borrow().keys().copied().collect()
    }

    /// Insertion-ordered snapshot of the current entries.
    pub fn snapshot(&self) -> Vec<(RecordId, Rc<T>)> {
        self.records
            .borrow()
            .iter()
            .map(|(id, record)| (*id, record.clone()))
            .collect()
    }

    /// Visits each record present when the call started; the predicate
    /// returning true removes that record after the visit.
    pub fn remove_if(&self, mut predicate: impl FnMut(&Rc<T>) -> bool) {
        for id in self.ids() {
            let record = self.get(id);
            if let Some(record) = record {
                if predicate(&record) {
                    self.erase(id);
                }
            }
        }
    }

    fn notify_empty(&self) {
        if let Some(callback) = self.on_empty.borrow().as_ref() {
            callback();
        }
    }
}

impl<T> Default for RecordContainer<T> {
    fn default() -> Self {
        Self::new()
    }
}
