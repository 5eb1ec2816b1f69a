//! Entitlement sink: where validated, deduplicated grants are published.

use crate::catalog::Product;
use crate::receipt::ValidatedPurchase;
use crate::PurchaseError;

/// Applies the game-state effect of a purchase (inventory, unlocks, currency).
///
/// Called at most once per transaction id for the lifetime of the ledger.
/// If `grant` returns an error the transaction stays Pending and the next
/// delivery of the same receipt calls `grant` again.
pub trait EntitlementSink: Send + Sync {
    /// Apply the entitlement for `purchase`.
    fn grant(&self, product: &Product, purchase: &ValidatedPurchase) -> Result<(), PurchaseError>;
}
