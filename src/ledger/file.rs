//! File-based ledger backend with atomic writes.
//!
//! Stores every entry in one JSON document under
//! `dirs::data_dir()/<namespace>/ledger.json`. Each write goes to a temp
//! file first and is renamed over the ledger, so a crash mid-write leaves
//! the previous ledger intact.

use crate::ledger::entry::LedgerEntry;
use crate::ledger::store::LedgerStore;
use crate::PurchaseError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const LEDGER_FILE: &str = "ledger.json";
const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Deserialize)]
struct LedgerDocument {
    version: u32,
    entries: BTreeMap<String, LedgerEntry>,
}

/// Durable ledger store.
pub struct FileLedgerStore {
    dir: PathBuf,
    entries: Mutex<BTreeMap<String, LedgerEntry>>,
}

impl FileLedgerStore {
    /// Open (or create) the ledger under the given namespace.
    pub fn new(namespace: &str) -> Result<Self, PurchaseError> {
        let base_dir = dirs::data_dir()
            .ok_or_else(|| PurchaseError::LedgerIO("Could not find data directory".to_string()))?;

        Self::with_path(base_dir.join(namespace))
    }

    /// Open (or create) the ledger in a specific directory.
    pub fn with_path(dir: PathBuf) -> Result<Self, PurchaseError> {
        fs::create_dir_all(&dir)
            .map_err(|e| PurchaseError::LedgerIO(format!("Failed to create ledger dir: {}", e)))?;

        let entries = load_document(&dir.join(LEDGER_FILE))?.entries;

        Ok(Self {
            dir,
            entries: Mutex::new(entries),
        })
    }

    /// Path of the ledger document.
    pub fn path(&self) -> PathBuf {
        self.dir.join(LEDGER_FILE)
    }

    fn persist(&self, entries: &BTreeMap<String, LedgerEntry>) -> Result<(), PurchaseError> {
        let doc = LedgerDocumentRef {
            version: LEDGER_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| PurchaseError::LedgerIO(format!("Failed to serialize ledger: {}", e)))?;

        let temp_path = self.dir.join(format!("{}.tmp", LEDGER_FILE));

        fs::write(&temp_path, json)
            .map_err(|e| PurchaseError::LedgerIO(format!("Failed to write temp file: {}", e)))?;

        fs::rename(&temp_path, self.path())
            .map_err(|e| PurchaseError::LedgerIO(format!("Failed to rename ledger file: {}", e)))
    }
}

#[derive(Serialize)]
struct LedgerDocumentRef<'a> {
    version: u32,
    entries: &'a BTreeMap<String, LedgerEntry>,
}

fn load_document(path: &Path) -> Result<LedgerDocument, PurchaseError> {
    if !path.exists() {
        return Ok(LedgerDocument {
            version: LEDGER_VERSION,
            entries: BTreeMap::new(),
        });
    }

    let json = fs::read_to_string(path)
        .map_err(|e| PurchaseError::LedgerIO(format!("Failed to read ledger: {}", e)))?;

    let doc: LedgerDocument = serde_json::from_str(&json)
        .map_err(|e| PurchaseError::LedgerIO(format!("Failed to parse ledger: {}", e)))?;

    if doc.version != LEDGER_VERSION {
        return Err(PurchaseError::LedgerIO(format!(
            "Unsupported ledger version {}",
            doc.version
        )));
    }

    Ok(doc)
}

impl LedgerStore for FileLedgerStore {
    fn get(&self, transaction_id: &str) -> Result<Option<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard.get(transaction_id).cloned())
    }

    fn put(&self, entry: LedgerEntry) -> Result<(), PurchaseError> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;

        let previous = guard.insert(entry.transaction_id.clone(), entry.clone());

        // Memory must not run ahead of disk: undo on a failed write.
        if let Err(e) = self.persist(&guard) {
            match previous {
                Some(prev) => guard.insert(entry.transaction_id, prev),
                None => guard.remove(&entry.transaction_id),
            };
            return Err(e);
        }
        Ok(())
    }

    fn entries(&self) -> Result<Vec<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard.values().cloned().collect())
    }

    fn entries_for_product(&self, product_id: &str) -> Result<Vec<LedgerEntry>, PurchaseError> {
        let guard = self
            .entries
            .lock()
            .map_err(|_| PurchaseError::LedgerIO("ledger lock poisoned".to_string()))?;
        Ok(guard
            .values()
            .filter(|e| e.product_id == product_id)
            .cloned()
            .collect())
    }
}
