//! Purchasewarden error types.

use crate::gateway::{InitFailureReason, PurchaseFailureReason};
use thiserror::Error;

/// Errors that can occur while validating and granting purchases.
#[derive(Debug, Error)]
pub enum PurchaseError {
    /// Configuration is invalid.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A product id was registered twice in the catalog.
    #[error("Duplicate product in catalog: {product_id}")]
    DuplicateProduct {
        /// The id that was already present.
        product_id: String,
    },

    /// Catalog lookup missed.
    #[error("Product not found in catalog: {product_id}")]
    ProductNotFound {
        /// The id that was looked up.
        product_id: String,
    },

    /// The storefront gateway has not reported itself ready.
    #[error("Storefront not initialized")]
    NotInitialized,

    /// The storefront gateway refused to initialize.
    #[error("Storefront initialization failed: {0:?}")]
    InitializationFailed(InitFailureReason),

    /// A purchase was requested for a product the catalog does not know.
    #[error("Unknown product: {product_id}")]
    UnknownProduct {
        /// The requested id.
        product_id: String,
    },

    /// Another attempt for the same product is still in flight.
    #[error("Purchase attempt already in flight for {product_id}")]
    AttemptInFlight {
        /// The product with the in-flight attempt.
        product_id: String,
    },

    /// The caller cancelled before the storefront responded.
    #[error("Purchase of {product_id} cancelled before the store responded")]
    Cancelled {
        /// The product whose attempt was discarded.
        product_id: String,
    },

    /// The storefront reported a failed purchase.
    #[error("Purchase of {product_id} failed: {reason:?}")]
    PurchaseFailed {
        /// The product that failed.
        product_id: String,
        /// Store-reported reason.
        reason: PurchaseFailureReason,
    },

    /// Optional store metadata could not be obtained.
    #[error("Store metadata unavailable: {0}")]
    GatewayMetadata(String),

    /// Receipt structure could not be parsed or does not match the product.
    #[error("Malformed receipt: {0}")]
    MalformedReceipt(String),

    /// Receipt signature verification failed.
    #[error("Receipt signature verification failed")]
    SignatureInvalid,

    /// No verify key configured for the store that issued the receipt.
    #[error("No verification key configured for store {store}")]
    MissingCredentials {
        /// Store name from the receipt envelope.
        store: String,
    },

    /// Ledger storage could not be read or written.
    #[error("Ledger I/O error: {0}")]
    LedgerIO(String),

    /// Transaction id already recorded against a different product.
    #[error("Transaction {transaction_id} already recorded for {existing_product_id}")]
    LedgerConflict {
        /// The conflicting transaction id.
        transaction_id: String,
        /// The product it was first recorded for.
        existing_product_id: String,
    },

    /// No ledger entry for the transaction id.
    #[error("Ledger entry not found: {transaction_id}")]
    LedgerEntryNotFound {
        /// The missing transaction id.
        transaction_id: String,
    },

    /// The entitlement sink failed to apply a grant.
    #[error("Entitlement sink error: {0}")]
    EntitlementSink(String),
}

impl PurchaseError {
    /// True for errors produced by receipt validation.
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedReceipt(_) | Self::SignatureInvalid | Self::MissingCredentials { .. }
        )
    }

    /// True when prompting the user to try the purchase again is sensible.
    ///
    /// Nothing here is retried automatically.
    pub fn is_retryable_by_user(&self) -> bool {
        match self {
            Self::AttemptInFlight { .. } | Self::Cancelled { .. } => true,
            Self::PurchaseFailed { reason, .. } => !matches!(
                reason,
                PurchaseFailureReason::ProductUnavailable
            ),
            Self::MalformedReceipt(_) | Self::SignatureInvalid => true,
            _ => false,
        }
    }
}
