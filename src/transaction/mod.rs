// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Writes are never sent to the backend as they are issued. They are staged
// into per-category bulk batches owned by a transaction, and the whole
// transaction is executed on commit, batch after batch in creation order.
//
// Design Patterns Used:
// - State Pattern: Transaction state management (Active, Committed, Aborted)
// - Command Pattern: staged bulk operations executed on commit
// - Registry: process-wide id -> transaction map, explicitly constructed
//
// ============================================================================

pub mod bulk;
pub mod registry;
pub mod state;

pub use bulk::BulkBatch;
pub use registry::{RegistryStats, SharedTransaction, TransactionRegistry};
pub use state::{Transaction, TransactionId, TransactionInfo, TransactionState};
