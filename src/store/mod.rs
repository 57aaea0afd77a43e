//! Persistence seam for the list pipeline.
//!
//! Pages never talk to SQLite directly; they go through [`RecordStore`] so a
//! fake can stand in under test.

mod sqlite;

#[cfg(test)]
pub mod fake;

pub use sqlite::SqliteStore;

use crate::records::{AnyRecord, EntityKind};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("{0}")]
    Invalid(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error("{op} failed: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: rusqlite::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WriteOp::Insert => "insert",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        })
    }
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: &str) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "not_found",
            StoreError::Invalid(_) => "bad_params",
            StoreError::Conflict(_) => "conflict",
            StoreError::Db(_) => "db_query_failed",
            StoreError::Write { op: WriteOp::Insert, .. } => "db_insert_failed",
            StoreError::Write { op: WriteOp::Update, .. } => "db_update_failed",
            StoreError::Write { op: WriteOp::Delete, .. } => "db_delete_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Partial update; the payload is the entity's patch object.
    Update(serde_json::Value),
    SetStatus(String),
    /// Moves a student into a class, or out of any class with `None`.
    Transfer { class_id: Option<String> },
    Delete,
}

pub trait RecordStore {
    /// All records of `kind` belonging to one school.
    fn fetch_records(&self, kind: EntityKind, school_id: &str)
        -> Result<Vec<AnyRecord>, StoreError>;

    fn create_record(
        &self,
        kind: EntityKind,
        school_id: &str,
        payload: &serde_json::Value,
    ) -> Result<AnyRecord, StoreError>;

    fn mutate_record(&self, kind: EntityKind, id: &str, mutation: Mutation)
        -> Result<(), StoreError>;
}
