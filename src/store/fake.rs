use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use super::{Mutation, RecordStore, StoreError};
use crate::records::{AnyRecord, EntityKind, Record};

/// In-memory store for pipeline tests.
#[derive(Default)]
pub struct FakeStore {
    records: RefCell<Vec<AnyRecord>>,
    failures: RefCell<HashMap<String, String>>,
    fail_fetch: Cell<bool>,
    fetches: Cell<usize>,
    mutations: Cell<usize>,
}

impl FakeStore {
    pub fn with_records(records: Vec<AnyRecord>) -> Self {
        Self {
            records: RefCell::new(records),
            ..Self::default()
        }
    }

    /// Every mutation of `id` fails with `reason`.
    pub fn fail_on(&self, id: &str, reason: &str) {
        self.failures
            .borrow_mut()
            .insert(id.to_string(), reason.to_string());
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.set(fail);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .map(|r| r.id().to_string())
            .collect()
    }
}

impl RecordStore for FakeStore {
    fn fetch_records(
        &self,
        kind: EntityKind,
        _school_id: &str,
    ) -> Result<Vec<AnyRecord>, StoreError> {
        self.fetches.set(self.fetches.get() + 1);
        if self.fail_fetch.get() {
            return Err(StoreError::Conflict("backend unavailable".into()));
        }
        Ok(self
            .records
            .borrow()
            .iter()
            .filter(|r| r.kind() == kind)
            .cloned()
            .collect())
    }

    fn create_record(
        &self,
        _kind: EntityKind,
        _school_id: &str,
        _payload: &serde_json::Value,
    ) -> Result<AnyRecord, StoreError> {
        Err(StoreError::Invalid("fake store does not create".into()))
    }

    fn mutate_record(
        &self,
        kind: EntityKind,
        id: &str,
        mutation: Mutation,
    ) -> Result<(), StoreError> {
        self.mutations.set(self.mutations.get() + 1);
        if let Some(reason) = self.failures.borrow().get(id) {
            return Err(StoreError::Conflict(reason.clone()));
        }
        let mut records = self.records.borrow_mut();
        let Some(pos) = records.iter().position(|r| r.kind() == kind && r.id() == id) else {
            return Err(StoreError::not_found(kind.noun(), id));
        };
        if mutation == Mutation::Delete {
            records.remove(pos);
        }
        Ok(())
    }
}
