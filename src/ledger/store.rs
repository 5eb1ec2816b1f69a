//! Storage backends for the transaction ledger.

use crate::ledger::entry::LedgerEntry;
use crate::PurchaseError;
use std::collections::HashMap;
use std::sync::RwLock;

/// Key-value persistence for ledger entries, keyed by transaction id.
///
/// Implementations only need atomic single-entry writes; the ledger
/// serializes access per transaction id above this layer.
pub trait LedgerStore: Send + Sync {
    /// Load one entry.
    fn get(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, PurchaseError>;

    /// Insert or replace one entry.
    fn put(&self, entry: LedgerEntry) -> Result<(), PurchaseError>;

    /// Snapshot of every entry.
    fn entries(&self) -> Result<Vec<LedgerEntry>, PurchaseError>;

    /// Entries for one product. Backends that can filter without cloning
    /// the whole ledger should override this.
    fn entries_for_product(&self, product_id: &str) -> Result<Vec<LedgerEntry>, PurchaseError> {
        let mut entries = self.entries()?;
        entries.retain(|e| e.product_id == product_id);
        Ok(entries)
    }
}

/// Non-durable store, for tests and hosts that persist elsewhere.
#[derive(Debug, Default)]
pub struct MemoryLedgerStore {
    entries: RwLock<HashMap<String, LedgerEntry>>,
}

impl MemoryLedgerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn get(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard.get(transaction_id).cloned())
    }

    fn put(&self, entry: LedgerEntry) -> Result<(), PurchaseError> {
        let mut guard = self
            .entries
            .write()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        guard.insert(entry.transaction_id.clone(), entry);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    fn entries_for_product(&self, product_id: &str) -> Result<Vec<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }
}
