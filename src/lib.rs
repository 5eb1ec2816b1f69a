//! # Purchasewarden
//!
//! **Fail-closed in-app purchase processing for games.**
//!
//! Purchasewarden sits between a platform billing SDK and game state. It
//! takes the store's verdict for a purchase, **cryptographically verifies**
//! the receipt, records the transaction in a durable ledger and only then
//! hands the entitlement to the game, exactly once per transaction.
//!
//! ## Features
//!
//! - **Per-store receipt schemes** - Apple-style JWS and Google-style signed JSON, both Ed25519
//! - **Catalog cross-check** - a valid receipt for a cheaper product never unlocks a dearer one
//! - **Idempotent grants** - re-delivered receipts replay the prior outcome, never grant twice
//! - **Durable ledger** - atomic file writes; a crash mid-grant resumes on the next delivery
//! - **Fail-closed** - missing keys, bad signatures or an unreadable ledger mean no grant
//!
//! ## Quickstart
//!
//! ```no_run
//! use async_trait::async_trait;
//! use purchasewarden::{
//!     Catalog, EntitlementSink, InitFailureReason, Product, ProductKind, ProductMetadata,
//!     PurchaseConfig, PurchaseError, PurchaseEvent, PurchaseManager, PurchaseOutcome,
//!     StorefrontGateway, ValidatedPurchase,
//! };
//! use std::sync::Arc;
//!
//! struct Store;
//!
//! #[async_trait]
//! impl StorefrontGateway for Store {
//!     async fn initialize(&self, _: &Catalog) -> Result<Vec<ProductMetadata>, InitFailureReason> {
//!         Ok(Vec::new())
//!     }
//!     async fn initiate(&self, _: &Product) -> PurchaseEvent {
//!         PurchaseEvent::Deferred
//!     }
//! }
//!
//! struct Inventory;
//!
//! impl EntitlementSink for Inventory {
//!     fn grant(&self, product: &Product, _: &ValidatedPurchase) -> Result<(), PurchaseError> {
//!         println!("granting {}", product.id());
//!         Ok(())
//!     }
//! }
//!
//! async fn run() -> Result<(), PurchaseError> {
//!     let config = PurchaseConfig {
//!         app_identifier: "com.CompanyName.GameTitle",
//!         apple_root_key_hex: Some("your-apple-ed25519-public-key-hex"),
//!         google_public_key_hex: None,
//!         ledger_namespace: "gametitle-purchases",
//!     };
//!     let catalog = Catalog::from_products([
//!         Product::new("health_potion_medium", ProductKind::Consumable),
//!     ])?;
//!
//!     let manager = PurchaseManager::new(config, catalog, Store, Arc::new(Inventory))?;
//!     manager.initialize().await?;
//!
//!     if let PurchaseOutcome::Granted(grant) = manager.purchase("health_potion_medium").await? {
//!         println!("granted {} ({:?})", grant.product_id, grant.disposition);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Threat Model
//!
//! Purchasewarden protects against:
//! - **Forged receipts** - anything not signed by the store's key is rejected
//! - **Receipt substitution** - the signed product must match the product being bought
//! - **Replay** - a transaction id is entitled at most once for the ledger's lifetime
//!
//! Purchasewarden does **not** talk to store servers. Refunds, revocations
//! and server-side renewal notifications are out of scope, as is anything
//! that requires trusting the client binary.
//!
//! See [`PurchaseConfig`] for configuration.

#![warn(missing_docs)]
#![doc(html_root_url = "https://docs.rs/purchasewarden/0.1.0")]

// Core modules
pub mod clock;
pub mod config;
pub mod errors;

// Crypto layer
pub mod crypto;

// Catalog and receipts
pub mod catalog;
pub mod receipt;

// Ledger layer
pub mod ledger;

// Collaborators supplied by the host
pub mod gateway;
pub mod sink;

pub mod cancel;
pub mod subscription;

// Manager (main public API)
pub mod manager;

#[cfg(test)]
mod testing;

// Re-exports for public API
pub use cancel::CancellationToken;
pub use catalog::{Catalog, Payout, PayoutType, Product, ProductKind, Store};
pub use clock::{Clock, SystemClock};
pub use config::PurchaseConfig;
pub use errors::PurchaseError;
pub use gateway::{
    InitFailureReason, ProductMetadata, PurchaseEvent, PurchaseFailureReason, RestoredPurchase,
    StorefrontGateway,
};
pub use ledger::{FileLedgerStore, LedgerEntry, LedgerOutcome, LedgerStore, MemoryLedgerStore};
pub use manager::{
    AttemptState, GatewayLifecycle, Grant, GrantDisposition, PurchaseManager, PurchaseOutcome,
    RestoreFailure, RestoreReport,
};
pub use receipt::{RawReceipt, ValidatedPurchase};
pub use sink::EntitlementSink;
pub use subscription::SubscriptionInfo;

#[cfg(any(test, feature = "test-seams"))]
pub use clock::MockClock;
