//! Ledger record format.

use crate::catalog::Store;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a transaction stands. Only moves forward: Pending -> Granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerOutcome {
    /// Seen and about to be entitled; a crash here leaves it Pending.
    Pending,
    /// The entitlement sink has applied it.
    Granted,
}

/// One processed transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique key.
    pub transaction_id: String,
    /// Catalog product the transaction paid for.
    pub product_id: String,
    /// First transaction of a renewal chain (same as `transaction_id` otherwise).
    pub original_transaction_id: String,
    /// Issuing store.
    pub store: Store,
    /// When the transaction was first recorded.
    pub first_seen_at: DateTime<Utc>,
    /// Current outcome.
    pub outcome: LedgerOutcome,
    /// When the outcome became Granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
}

impl LedgerEntry {
    /// Whether the entitlement was applied.
    pub fn is_granted(&self) -> bool {
        self.outcome == LedgerOutcome::Granted
    }
}
