//! Normalized purchase facts produced by successful validation.

use crate::catalog::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// A purchase whose receipt verified and matched its catalog product.
///
/// Only [`ReceiptValidator`](crate::receipt::ReceiptValidator) constructs these.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedPurchase {
    pub(crate) product_id: String,
    pub(crate) store_product_id: String,
    pub(crate) transaction_id: String,
    pub(crate) original_transaction_id: String,
    pub(crate) purchase_timestamp: DateTime<Utc>,
    pub(crate) store: Store,
    pub(crate) is_subscription_renewal: bool,
    pub(crate) expires_at: Option<DateTime<Utc>>,
    pub(crate) auto_renewing: Option<bool>,
    pub(crate) receipt_fingerprint: String,
}

impl ValidatedPurchase {
    /// Catalog product id.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Product id as the issuing store knows it.
    pub fn store_product_id(&self) -> &str {
        &self.store_product_id
    }

    /// Id unique to this purchase event.
    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    /// Id shared by a subscription and all its renewals.
    pub fn original_transaction_id(&self) -> &str {
        &self.original_transaction_id
    }

    /// When the store says the purchase happened.
    pub fn purchase_timestamp(&self) -> DateTime<Utc> {
        self.purchase_timestamp
    }

    /// Issuing store.
    pub fn store(&self) -> Store {
        self.store
    }

    /// Whether this is a later billing cycle of a subscription.
    pub fn is_subscription_renewal(&self) -> bool {
        self.is_subscription_renewal
    }

    /// Subscription expiry, when the receipt carries one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Store-reported auto-renew flag, when the receipt carries one.
    pub fn auto_renewing(&self) -> Option<bool> {
        self.auto_renewing
    }

    /// SHA-256 of the raw receipt (hex).
    pub fn receipt_fingerprint(&self) -> &str {
        &self.receipt_fingerprint
    }
}
