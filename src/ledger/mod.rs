//! Transaction ledger: the durable record of every transaction ever processed.
//!
//! The ledger is the single source of truth for "has this exact transaction
//! already been entitled". Outcomes only move forward (Pending -> Granted),
//! and both `record_pending` and `mark_granted` are idempotent, so a purchase
//! interrupted by a crash can be re-delivered and resumed without a second
//! grant.

pub mod entry;
pub mod file;
pub mod locks;
pub mod store;

pub use entry::{LedgerEntry, LedgerOutcome};
pub use file::FileLedgerStore;
pub use locks::{TransactionLockGuard, TransactionLocks};
pub use store::{LedgerStore, MemoryLedgerStore};

use crate::catalog::Store;
use crate::clock::Clock;
use crate::receipt::ValidatedPurchase;
use crate::PurchaseError;
use std::sync::Arc;

/// Identity of a transaction about to be recorded.
#[derive(Debug, Clone, Copy)]
pub struct PendingTransaction<'a> {
    /// Unique key.
    pub transaction_id: &'a str,
    /// Catalog product.
    pub product_id: &'a str,
    /// First transaction of its renewal chain.
    pub original_transaction_id: &'a str,
    /// Issuing store.
    pub store: Store,
}

impl<'a> From<&'a ValidatedPurchase> for PendingTransaction<'a> {
    fn from(purchase: &'a ValidatedPurchase) -> Self {
        Self {
            transaction_id: purchase.transaction_id(),
            product_id: purchase.product_id(),
            original_transaction_id: purchase.original_transaction_id(),
            store: purchase.store(),
        }
    }
}

/// Idempotent transaction ledger over a pluggable store.
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    locks: TransactionLocks,
}

impl TransactionLedger {
    /// Wrap a store.
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            locks: TransactionLocks::new(),
        }
    }

    /// Hold `transaction_id` exclusively until the guard drops.
    ///
    /// Callers running check-then-act sequences on one id take this first.
    pub fn lock(&self, transaction_id: &str) -> TransactionLockGuard<'_> {
        self.locks.acquire(transaction_id)
    }

    /// Record a transaction as Pending.
    ///
    /// Recording the same id for the same product again is a no-op success.
    ///
    /// # Errors
    /// * `LedgerConflict` - The id is already recorded for another product
    /// * `LedgerIO` - Storage failure
    pub fn record_pending(&self, txn: PendingTransaction<'_>) -> Result<(), PurchaseError> {
        if let Some(existing) = self.store.get(txn.transaction_id)? {
            if existing.product_id == txn.product_id {
                return Ok(());
            }
            return Err(PurchaseError::LedgerConflict {
                transaction_id: txn.transaction_id.to_string(),
                existing_product_id: existing.product_id,
            });
        }

        self.store.put(LedgerEntry {
            transaction_id: txn.transaction_id.to_string(),
            product_id: txn.product_id.to_string(),
            original_transaction_id: txn.original_transaction_id.to_string(),
            store: txn.store,
            first_seen_at: self.clock.now_utc(),
            outcome: LedgerOutcome::Pending,
            granted_at: None,
        })
    }

    /// Move a transaction to Granted. Marking an already granted id is a no-op.
    ///
    /// # Errors
    /// * `LedgerEntryNotFound` - `record_pending` was never called for the id
    /// * `LedgerIO` - Storage failure
    pub fn mark_granted(&self, transaction_id: &str) -> Result<(), PurchaseError> {
        let mut entry =
            self.store
                .get(transaction_id)?
                .ok_or_else(|| PurchaseError::LedgerEntryNotFound {
                    transaction_id: transaction_id.to_string(),
                })?;

        if entry.is_granted() {
            return Ok(());
        }

        entry.outcome = LedgerOutcome::Granted;
        entry.granted_at = Some(self.clock.now_utc());
        self.store.put(entry)
    }

    /// Whether the transaction has been granted.
    ///
    /// Storage failures surface as errors so callers fail closed.
    pub fn is_granted(&self, transaction_id: &str) -> Result<bool, PurchaseError> {
        Ok(self
            .store
            .get(transaction_id)?
            .is_some_and(|e| e.is_granted()))
    }

    /// Look up one entry.
    pub fn entry(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, PurchaseError> {
        self.store.get(transaction_id)
    }

    /// Entries for one product, oldest first.
    pub fn entries_for(
        &self,
        product_id: &str,
    ) -> Result<impl Iterator<Item = LedgerEntry>, PurchaseError> {
        let mut entries = self.store.entries_for_product(product_id)?;
        entries.sort_by(|a, b| {
            a.first_seen_at
                .cmp(&b.first_seen_at)
                .then_with(|| a.transaction_id.cmp(&b.transaction_id))
        });
        Ok(entries.into_iter())
    }

    /// Whether any transaction for the product has been granted.
    pub fn has_granted(&self, product_id: &str) -> Result<bool, PurchaseError> {
        Ok(self
            .store
            .entries_for_product(product_id)?
            .iter()
            .any(LedgerEntry::is_granted))
    }

    /// Entries left Pending, e.g. by a crash before `mark_granted`.
    pub fn pending(&self) -> Result<Vec<LedgerEntry>, PurchaseError> {
        Ok(self
            .store
            .entries()?
            .into_iter()
            .filter(|e| e.outcome == LedgerOutcome::Pending)
            .collect())
    }
}
