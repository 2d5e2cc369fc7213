// ============================================================================
// Transaction Registry
// ============================================================================

use super::{Transaction, TransactionId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, RwLock};

/// A registered transaction, locked by whichever call is staging into it.
pub type SharedTransaction = Arc<Mutex<Transaction>>;

/// Counters describing registry activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub live: usize,
    pub registered: usize,
    pub unregistered: usize,
}

/// Concurrent map from transaction id to transaction.
///
/// Entries are added on first reference and removed on commit or abort;
/// nothing expires them. Each manipulator receives its registry explicitly,
/// so independent manipulators never see each other's transactions unless
/// they are handed the same `Arc<TransactionRegistry>`.
#[derive(Default)]
pub struct TransactionRegistry {
    transactions: RwLock<HashMap<TransactionId, SharedTransaction>>,
    registered: AtomicUsize,
    unregistered: AtomicUsize,
}

impl TransactionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `transaction` under `id`, replacing any live entry.
    pub async fn register_transaction(
        &self,
        id: TransactionId,
        transaction: Transaction,
    ) -> SharedTransaction {
        let shared = Arc::new(Mutex::new(transaction));
        let mut transactions = self.transactions.write().await;
        transactions.insert(id, Arc::clone(&shared));
        self.registered.fetch_add(1, Ordering::SeqCst);
        shared
    }

    pub async fn transaction_with_id(&self, id: &TransactionId) -> Option<SharedTransaction> {
        let transactions = self.transactions.read().await;
        transactions.get(id).cloned()
    }

    /// Removes the entry for `id`, returning it when it was live.
    pub async fn unregister_transaction(&self, id: &TransactionId) -> Option<SharedTransaction> {
        let mut transactions = self.transactions.write().await;
        let removed = transactions.remove(id);
        if removed.is_some() {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
        removed
    }

    /// Returns the live transaction for `id`, registering `make()` when
    /// there is none. Look-up and insertion happen under one lock, so
    /// concurrent callers presenting the same new id share one transaction.
    pub async fn get_or_register(
        &self,
        id: &TransactionId,
        make: impl FnOnce() -> Transaction,
    ) -> SharedTransaction {
        if let Some(existing) = self.transaction_with_id(id).await {
            return existing;
        }

        let mut transactions = self.transactions.write().await;
        if let Some(existing) = transactions.get(id) {
            return Arc::clone(existing);
        }

        let shared = Arc::new(Mutex::new(make()));
        transactions.insert(id.clone(), Arc::clone(&shared));
        self.registered.fetch_add(1, Ordering::SeqCst);
        shared
    }

    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.transactions.read().await.is_empty()
    }

    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            live: self.len().await,
            registered: self.registered.load(Ordering::SeqCst),
            unregistered: self.unregistered.load(Ordering::SeqCst),
        }
    }
}
