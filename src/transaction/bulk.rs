// ============================================================================
// Bulk Batch
// ============================================================================
//
// Ordered accumulator of pending writes for one object category. Nothing
// reaches the backend until the owning transaction commits; the operations
// then run in staging order.
//
// ============================================================================

use crate::connection::{BackendResult, BulkOp, BulkResult, Session};
use crate::core::{Document, Identity};
use crate::filter::Query;

#[derive(Debug, Clone)]
pub struct BulkBatch {
    identity: Identity,
    operations: Vec<BulkOp>,
}

impl BulkBatch {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            operations: Vec::new(),
        }
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn operations(&self) -> &[BulkOp] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn insert(&mut self, document: Document) {
        self.operations.push(BulkOp::Insert(document));
    }

    pub fn update(&mut self, selector: Query, document: Document) {
        self.operations.push(BulkOp::Replace { selector, document });
    }

    pub fn remove(&mut self, selector: Query) {
        self.operations.push(BulkOp::Remove(selector));
    }

    pub fn remove_all(&mut self, selector: Query) {
        self.operations.push(BulkOp::RemoveAll(selector));
    }

    pub fn increment_all(&mut self, selector: Query, field: impl Into<String>, delta: i64) {
        self.operations.push(BulkOp::IncrementAll {
            selector,
            field: field.into(),
            delta,
        });
    }

    /// Executes the staged operations on the category's collection.
    ///
    /// An empty batch performs no I/O.
    pub async fn run(&self, session: &dyn Session) -> BackendResult<BulkResult> {
        if self.operations.is_empty() {
            return Ok(BulkResult::default());
        }
        session.run_bulk(self.identity.category, &self.operations).await
    }
}
