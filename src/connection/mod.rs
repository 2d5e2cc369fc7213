// ============================================================================
// Backend Sessions
// ============================================================================
//
// The seam between the manipulator and a concrete document store. A
// `SessionFactory` dials the root session once at startup; every read and
// every transaction then works on a copy of it.
//
// ============================================================================

pub mod config;

use crate::core::Document;
use crate::filter::Query;
use async_trait::async_trait;
use thiserror::Error;

pub use config::StoreConfig;

/// Failures reported by a backend. Never surfaced to manipulator callers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    #[error("E11000 duplicate key error collection: {collection} index: {index} dup key: {key}")]
    DuplicateKey {
        collection: String,
        index: String,
        key: String,
    },

    #[error("session already closed")]
    SessionClosed,

    #[error("no reachable servers: {0}")]
    Dial(String),

    #[error("{0}")]
    Execution(String),
}

impl BackendError {
    /// True for uniqueness-constraint failures.
    pub fn is_dup(&self) -> bool {
        matches!(self, Self::DuplicateKey { .. })
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// One staged write, in the backend's own terms.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkOp {
    /// Insert a document; it carries its `_id`.
    Insert(Document),
    /// Replace the first document matching `selector`.
    Replace { selector: Query, document: Document },
    /// Remove the first document matching the selector.
    Remove(Query),
    /// Remove every document matching the selector.
    RemoveAll(Query),
    /// Add `delta` to `field` on every document matching `selector`.
    IncrementAll {
        selector: Query,
        field: String,
        delta: i64,
    },
}

/// Counters returned by a bulk run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkResult {
    pub inserted: usize,
    pub matched: usize,
    pub modified: usize,
    pub removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Options of a multi-document find.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Vec<SortKey>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Builds sort keys from order specifiers, `-field` sorting descending.
    pub fn with_order(mut self, order: &[String]) -> Self {
        self.sort = order
            .iter()
            .filter(|spec| !spec.is_empty() && spec.as_str() != "-")
            .map(|spec| match spec.strip_prefix('-') {
                Some(field) => SortKey {
                    field: field.to_string(),
                    descending: true,
                },
                None => SortKey {
                    field: spec.clone(),
                    descending: false,
                },
            })
            .collect();
        self
    }

    pub fn with_window(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = Some(limit);
        self
    }
}

/// A live connection to a document store.
#[async_trait]
pub trait Session: Send + Sync {
    /// A new session sharing the same server pool.
    fn copy(&self) -> Box<dyn Session>;

    async fn find(
        &self,
        collection: &str,
        query: &Query,
        options: &FindOptions,
    ) -> BackendResult<Vec<Document>>;

    /// First matching document, `BackendError::NotFound` when none matches.
    async fn find_one(&self, collection: &str, query: &Query) -> BackendResult<Document>;

    async fn count(&self, collection: &str, query: &Query) -> BackendResult<usize>;

    /// Runs `operations` in order, stopping at the first failure.
    async fn run_bulk(&self, collection: &str, operations: &[BulkOp]) -> BackendResult<BulkResult>;

    /// Releases the session. Further calls fail with `SessionClosed`.
    fn close(&mut self);
}

/// Dials root sessions.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn dial(&self, config: &StoreConfig) -> BackendResult<Box<dyn Session>>;
}
