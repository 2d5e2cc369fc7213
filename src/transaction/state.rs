// ============================================================================
// Transaction State Management
// ============================================================================
//
// Implements the State Pattern for transaction lifecycle management.
// Each transaction moves through defined states: Active -> Committed/Aborted
//
// A transaction owns one backend session and one bulk batch per object
// category. Batches are kept in creation order, which is also the order
// they run in at commit.
//
// ============================================================================

use super::BulkBatch;
use crate::connection::{BackendError, Session};
use crate::core::{Identity, ManipError, Result};
use crate::trace::Trace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Unique identifier for a transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(String);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TransactionId {
    fn from(id: &str) -> Self {
        TransactionId(id.to_string())
    }
}

impl From<String> for TransactionId {
    fn from(id: String) -> Self {
        TransactionId(id)
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction state following the State Pattern
///
/// State transitions:
/// ```text
/// Active ──commit──> Committed
///   │
///   └──abort──> Aborted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and accepts staged operations
    Active,

    /// Transaction has been executed against the backend
    Committed,

    /// Transaction has been discarded
    Aborted,
}

impl TransactionState {
    /// Check if transaction can stage operations
    pub fn is_active(&self) -> bool {
        matches!(self, TransactionState::Active)
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionState::Active => write!(f, "ACTIVE"),
            TransactionState::Committed => write!(f, "COMMITTED"),
            TransactionState::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Snapshot of a transaction for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    pub id: TransactionId,
    pub state: TransactionState,
    pub categories: Vec<&'static str>,
    pub staged_operations: usize,
    pub created_at: DateTime<Utc>,
}

/// Staged writes of one caller-visible transaction.
///
/// # Thread Safety
/// A transaction is shared through the registry behind an async mutex; only
/// callers presenting its id reach it.
pub struct Transaction {
    id: TransactionId,
    state: TransactionState,
    session: Box<dyn Session>,
    bulks: Vec<BulkBatch>,
    root_span: Span,
    created_at: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction working on its own copy of a session.
    pub fn new(id: TransactionId, session: Box<dyn Session>, parent: Option<&Span>) -> Self {
        let root = Trace::start(parent, "manipulate.transaction");
        root.tag_transaction(&id);

        Self {
            id,
            state: TransactionState::Active,
            session,
            bulks: Vec::new(),
            root_span: root.span().clone(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn root_span(&self) -> &Span {
        &self.root_span
    }

    pub fn staged_operations(&self) -> usize {
        self.bulks.iter().map(BulkBatch::len).sum()
    }

    /// The batch for `identity`, created on first use.
    ///
    /// # Errors
    /// Returns `TransactionNotFound` once the transaction left the Active
    /// state: a commit or abort already retired it.
    pub fn bulk_for_identity(&mut self, identity: Identity) -> Result<&mut BulkBatch> {
        if !self.state.is_active() {
            return Err(ManipError::TransactionNotFound(format!(
                "transaction {} is {}",
                self.id, self.state
            )));
        }

        let position = match self
            .bulks
            .iter()
            .position(|bulk| bulk.identity().category == identity.category)
        {
            Some(position) => position,
            None => {
                self.bulks.push(BulkBatch::new(identity));
                self.bulks.len() - 1
            }
        };

        Ok(&mut self.bulks[position])
    }

    /// Runs every batch in creation order, stopping at the first failure.
    ///
    /// Batches before the failing one stay applied. The transaction is
    /// Committed afterwards whatever the outcome.
    pub async fn run(&mut self) -> std::result::Result<(), BackendError> {
        if !self.state.is_active() {
            return Err(BackendError::Execution(format!(
                "transaction {} is already {}",
                self.id, self.state
            )));
        }
        self.state = TransactionState::Committed;

        for bulk in &self.bulks {
            bulk.run(self.session.as_ref()).await?;
        }
        Ok(())
    }

    /// Discards every staged operation.
    pub fn abort(&mut self) {
        self.bulks.clear();
        self.state = TransactionState::Aborted;
    }

    pub fn close_session(&mut self) {
        self.session.close();
    }

    pub fn info(&self) -> TransactionInfo {
        TransactionInfo {
            id: self.id.clone(),
            state: self.state,
            categories: self.bulks.iter().map(|b| b.identity().category).collect(),
            staged_operations: self.staged_operations(),
            created_at: self.created_at,
        }
    }
}
