//! Storefront gateway: the platform billing SDK seen as an injected capability.
//!
//! The purchase manager drives a gateway; it never talks to a store directly.
//! Hosts implement [`StorefrontGateway`] over their platform SDK and tests
//! implement it over canned events.

use crate::catalog::{Catalog, Product};
use crate::receipt::RawReceipt;
use crate::PurchaseError;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

/// Why the store refused to initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InitFailureReason {
    /// The app is not configured on the publishing platform.
    AppNotRecognized,
    /// None of the catalog's products exist on the store.
    NoProductsAvailable,
    /// Purchasing is disabled or the service is down.
    ServiceUnavailable,
}

/// Why the store failed a purchase. None of these are retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseFailureReason {
    /// The user backed out of the purchase dialog.
    UserCancelled,
    /// The payment method was declined.
    PaymentDeclined,
    /// The product can no longer be bought.
    ProductUnavailable,
    /// Anything the store did not classify.
    Unknown,
}

/// What the store reports for one purchase.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseEvent {
    /// Payment succeeded; the receipt still has to be validated.
    Purchased(RawReceipt),
    /// Waiting on external approval, e.g. parental consent.
    Deferred,
    /// The store failed the purchase.
    Failed(PurchaseFailureReason),
}

/// Store-localized product details reported at initialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    /// Catalog product id.
    pub product_id: String,
    /// Localized title.
    pub localized_title: String,
    /// Localized description.
    pub localized_description: String,
    /// Localized price, e.g. "$0.99".
    pub localized_price_string: String,
    /// Whether the store will currently sell it.
    pub available_to_purchase: bool,
}

/// One previously completed purchase re-delivered by a restore.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredPurchase {
    /// Catalog product id the store says the receipt is for.
    pub product_id: String,
    /// Receipt to validate.
    pub receipt: RawReceipt,
}

/// Abstract storefront.
#[async_trait]
pub trait StorefrontGateway: Send + Sync {
    /// Register the catalog with the store. Called once per successful init.
    async fn initialize(
        &self,
        catalog: &Catalog,
    ) -> Result<Vec<ProductMetadata>, InitFailureReason>;

    /// Start a purchase and wait for the store's verdict.
    async fn initiate(&self, product: &Product) -> PurchaseEvent;

    /// Previously completed purchases.
    ///
    /// Stores that re-deliver restores through the normal purchase channel
    /// keep the default, which yields nothing.
    fn restore(&self) -> BoxStream<'_, RestoredPurchase> {
        stream::empty().boxed()
    }

    /// Introductory-price metadata for a subscription, as the store's JSON.
    ///
    /// `Ok(None)` means the store has no entry for the product.
    async fn introductory_price_info(
        &self,
        _product: &Product,
    ) -> Result<Option<String>, PurchaseError> {
        Ok(None)
    }

    /// Tell the store the transaction is fully processed so it stops
    /// re-delivering it.
    async fn finish_transaction(&self, _product: &Product, _transaction_id: &str) {}
}
