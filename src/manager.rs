//! Purchase Manager - the main public API for Purchasewarden.
//!
//! The `PurchaseManager` drives every purchase and restore through:
//! - Storefront initialization (fail fast until the store is ready)
//! - Receipt validation against the catalog
//! - Idempotent granting through the transaction ledger
//!
//! ```text
//! Idle -> AwaitingReceipt -> Validating -> Granting -> Idle
//!              |                 |
//!              +-> Deferred      +-> Failed
//!              +-> Failed
//! ```

use crate::cancel::CancellationToken;
use crate::catalog::{Catalog, Payout, Product, ProductKind};
use crate::clock::{Clock, SystemClock};
use crate::config::PurchaseConfig;
use crate::crypto::digest::short_fingerprint;
use crate::gateway::{
    InitFailureReason, ProductMetadata, PurchaseEvent, PurchaseFailureReason, RestoredPurchase,
    StorefrontGateway,
};
use crate::ledger::{FileLedgerStore, LedgerStore, TransactionLedger};
use crate::receipt::{RawReceipt, ReceiptValidator, ValidatedPurchase};
use crate::sink::EntitlementSink;
use crate::subscription::{IntroductoryPriceInfo, SubscriptionInfo};
use crate::PurchaseError;
use futures_util::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

/// Lifecycle of the storefront connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayLifecycle {
    /// `initialize` has not succeeded yet.
    Uninitialized,
    /// The store accepted the catalog.
    Ready,
    /// The last `initialize` failed.
    Failed(InitFailureReason),
}

/// Where a product's current attempt stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    /// No attempt in flight.
    Idle,
    /// Waiting for the store's verdict.
    AwaitingReceipt,
    /// Checking the receipt.
    Validating,
    /// Consulting the ledger and applying the entitlement.
    Granting,
}

/// Whether a grant reached the entitlement sink this time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantDisposition {
    /// First time this transaction was entitled; the sink was called.
    Fresh,
    /// Already entitled earlier; the sink was not called again.
    Replayed,
}

/// A successfully entitled purchase.
#[derive(Debug, Clone)]
pub struct Grant {
    /// Catalog product id.
    pub product_id: String,
    /// Product kind.
    pub kind: ProductKind,
    /// Payout definition from the catalog.
    pub payout: Option<Payout>,
    /// Validated purchase facts.
    pub purchase: ValidatedPurchase,
    /// Subscription detail; `None` for other kinds or when store metadata
    /// could not be obtained.
    pub subscription: Option<SubscriptionInfo>,
    /// Fresh or replayed.
    pub disposition: GrantDisposition,
}

/// Terminal result of a purchase attempt that did not fail.
#[derive(Debug, Clone)]
pub enum PurchaseOutcome {
    /// Entitled (freshly or as a replay).
    Granted(Grant),
    /// Waiting on external approval. No ledger write happened; the
    /// approval arrives later through [`PurchaseManager::handle_event`].
    Deferred {
        /// The deferred product.
        product_id: String,
    },
}

/// One restore item that could not be entitled.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Product the store named.
    pub product_id: String,
    /// Why it failed.
    pub error: PurchaseError,
}

/// Result of a restore. Zero items is a successful, empty restore.
#[derive(Debug, Default)]
pub struct RestoreReport {
    /// Items entitled (fresh or replayed).
    pub restored: Vec<Grant>,
    /// Items rejected.
    pub failed: Vec<RestoreFailure>,
}

impl RestoreReport {
    /// Whether the store re-delivered nothing.
    pub fn is_empty(&self) -> bool {
        self.restored.is_empty() && self.failed.is_empty()
    }
}

/// Clears a product's in-flight marker when the attempt ends, however it ends.
struct AttemptGuard<'a> {
    attempts: &'a Mutex<HashMap<String, AttemptState>>,
    product_id: String,
}

impl AttemptGuard<'_> {
    fn advance(&self, state: AttemptState) {
        debug!(product_id = %self.product_id, ?state, "attempt state");
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(self.product_id.clone(), state);
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(&self.product_id);
    }
}

/// One purchase or restore item, owned by the manager until it resolves.
struct TransactionAttempt<'a> {
    guard: AttemptGuard<'a>,
    product: &'a Product,
}

/// Main purchase manager.
///
/// Create one instance per application, after composing the catalog,
/// gateway and entitlement sink, and reuse it for every purchase.
pub struct PurchaseManager<G> {
    config: PurchaseConfig,
    catalog: Catalog,
    gateway: G,
    validator: ReceiptValidator,
    ledger: TransactionLedger,
    sink: Arc<dyn EntitlementSink>,
    clock: Arc<dyn Clock>,
    lifecycle: RwLock<GatewayLifecycle>,
    init_lock: tokio::sync::Mutex<()>,
    metadata: RwLock<HashMap<String, ProductMetadata>>,
    attempts: Mutex<HashMap<String, AttemptState>>,
}

impl<G: StorefrontGateway> PurchaseManager<G> {
    /// Create a manager backed by the durable file ledger.
    ///
    /// # Errors
    /// Returns an error if:
    /// - Configuration validation fails
    /// - A verify key cannot be decoded
    /// - The ledger cannot be opened
    pub fn new(
        config: PurchaseConfig,
        catalog: Catalog,
        gateway: G,
        sink: Arc<dyn EntitlementSink>,
    ) -> Result<Self, PurchaseError> {
        config.validate()?;
        let store = FileLedgerStore::new(config.ledger_namespace)?;
        Self::with_ledger_store(config, catalog, gateway, Arc::new(store), sink)
    }

    /// Create a manager over a caller-supplied ledger store.
    pub fn with_ledger_store(
        config: PurchaseConfig,
        catalog: Catalog,
        gateway: G,
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn EntitlementSink>,
    ) -> Result<Self, PurchaseError> {
        config.validate()?;
        Self::with_clock(config, catalog, gateway, store, sink, Arc::new(SystemClock))
    }

    /// Create a manager with a custom clock (for testing).
    #[cfg(any(test, feature = "test-seams"))]
    pub fn new_with_clock(
        config: PurchaseConfig,
        catalog: Catalog,
        gateway: G,
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn EntitlementSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PurchaseError> {
        config.validate()?;
        Self::with_clock(config, catalog, gateway, store, sink, clock)
    }

    fn with_clock(
        config: PurchaseConfig,
        catalog: Catalog,
        gateway: G,
        store: Arc<dyn LedgerStore>,
        sink: Arc<dyn EntitlementSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PurchaseError> {
        let validator = ReceiptValidator::new(&config)?;
        let ledger = TransactionLedger::new(store, Arc::clone(&clock));

        Ok(Self {
            config,
            catalog,
            gateway,
            validator,
            ledger,
            sink,
            clock,
            lifecycle: RwLock::new(GatewayLifecycle::Uninitialized),
            init_lock: tokio::sync::Mutex::new(()),
            metadata: RwLock::new(HashMap::new()),
            attempts: Mutex::new(HashMap::new()),
        })
    }

    /// Hand the catalog to the storefront.
    ///
    /// Succeeds immediately if already initialized. A failed initialization
    /// may be retried.
    ///
    /// # Errors
    /// - `InitializationFailed` - The store refused the catalog
    pub async fn initialize(&self) -> Result<(), PurchaseError> {
        let _init = self.init_lock.lock().await;

        if self.lifecycle() == GatewayLifecycle::Ready {
            return Ok(());
        }

        match self.gateway.initialize(&self.catalog).await {
            Ok(products) => {
                for meta in &products {
                    debug!(
                        product_id = %meta.product_id,
                        title = %meta.localized_title,
                        price = %meta.localized_price_string,
                        available = meta.available_to_purchase,
                        "store product"
                    );
                }
                let mut metadata = self.metadata.write().unwrap_or_else(|p| p.into_inner());
                *metadata = products
                    .into_iter()
                    .map(|m| (m.product_id.clone(), m))
                    .collect();
                drop(metadata);

                self.set_lifecycle(GatewayLifecycle::Ready);
                info!(products = self.catalog.len(), "storefront initialized");
                Ok(())
            }
            Err(reason) => {
                self.set_lifecycle(GatewayLifecycle::Failed(reason));
                warn!(?reason, "storefront initialization failed");
                Err(PurchaseError::InitializationFailed(reason))
            }
        }
    }

    /// Purchase a product.
    ///
    /// # Errors
    /// - `NotInitialized` - The storefront is not ready
    /// - `UnknownProduct` - The catalog has no such product
    /// - `AttemptInFlight` - The product already has an attempt in flight
    /// - `PurchaseFailed` - The store failed the purchase
    /// - `MalformedReceipt` / `SignatureInvalid` / `MissingCredentials` - Receipt rejected
    /// - `LedgerIO` / `LedgerConflict` - Ledger could not be consulted (fails closed)
    /// - `EntitlementSink` - The sink failed; the purchase stays Pending
    pub async fn purchase(&self, product_id: &str) -> Result<PurchaseOutcome, PurchaseError> {
        self.purchase_with_cancel(product_id, &CancellationToken::new())
            .await
    }

    /// Purchase a product, abandoning the attempt if `cancel` fires before
    /// the store responds.
    ///
    /// Cancellation after the store has answered is ignored: a grant is
    /// never interrupted halfway.
    ///
    /// # Errors
    /// As [`purchase`](Self::purchase), plus `Cancelled`.
    pub async fn purchase_with_cancel(
        &self,
        product_id: &str,
        cancel: &CancellationToken,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let product = self.ready_product(product_id)?;

        if let Some(meta) = self.product_metadata(product_id) {
            if !meta.available_to_purchase {
                info!(product_id, "product not available on store");
                return Err(PurchaseError::PurchaseFailed {
                    product_id: product_id.to_string(),
                    reason: PurchaseFailureReason::ProductUnavailable,
                });
            }
        }

        let attempt = self.begin_attempt(product, AttemptState::AwaitingReceipt)?;
        info!(product_id, "purchase initiated");

        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(product_id, "purchase cancelled before store responded");
                return Err(PurchaseError::Cancelled {
                    product_id: product_id.to_string(),
                });
            }
            event = self.gateway.initiate(product) => event,
        };

        self.resolve(attempt, event).await
    }

    /// Process a store event that `purchase` did not initiate: a deferred
    /// purchase resolving, an automatic restore, or a replayed callback.
    ///
    /// Runs as a fresh attempt through the same transitions as `purchase`.
    pub async fn handle_event(
        &self,
        product_id: &str,
        event: PurchaseEvent,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let product = self.ready_product(product_id)?;
        let attempt = self.begin_attempt(product, AttemptState::AwaitingReceipt)?;
        self.resolve(attempt, event).await
    }

    /// Restore previously completed purchases.
    ///
    /// Each item is an independent attempt; a bad item does not abort the
    /// rest.
    ///
    /// # Errors
    /// - `NotInitialized` - The storefront is not ready
    pub async fn restore(&self) -> Result<RestoreReport, PurchaseError> {
        if self.lifecycle() != GatewayLifecycle::Ready {
            return Err(PurchaseError::NotInitialized);
        }

        let mut report = RestoreReport::default();
        let mut items = self.gateway.restore();

        while let Some(item) = items.next().await {
            match self.restore_one(&item).await {
                Ok(grant) => report.restored.push(grant),
                Err(error) => {
                    warn!(product_id = %item.product_id, %error, "restore item rejected");
                    report.failed.push(RestoreFailure {
                        product_id: item.product_id,
                        error,
                    });
                }
            }
        }

        info!(
            restored = report.restored.len(),
            failed = report.failed.len(),
            "restore finished"
        );
        Ok(report)
    }

    /// Current storefront lifecycle.
    pub fn lifecycle(&self) -> GatewayLifecycle {
        *self.lifecycle.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Whether purchases can be initiated.
    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == GatewayLifecycle::Ready
    }

    /// Store metadata for a product, once initialized.
    pub fn product_metadata(&self, product_id: &str) -> Option<ProductMetadata> {
        self.metadata
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(product_id)
            .cloned()
    }

    /// State of the product's in-flight attempt.
    pub fn attempt_state(&self, product_id: &str) -> AttemptState {
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(product_id)
            .copied()
            .unwrap_or(AttemptState::Idle)
    }

    /// The transaction ledger.
    pub fn ledger(&self) -> &TransactionLedger {
        &self.ledger
    }

    /// The product catalog.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the current configuration.
    pub fn config(&self) -> &PurchaseConfig {
        &self.config
    }

    fn set_lifecycle(&self, state: GatewayLifecycle) {
        *self.lifecycle.write().unwrap_or_else(|p| p.into_inner()) = state;
    }

    fn ready_product(&self, product_id: &str) -> Result<&Product, PurchaseError> {
        if self.lifecycle() != GatewayLifecycle::Ready {
            return Err(PurchaseError::NotInitialized);
        }
        self.catalog
            .lookup(product_id)
            .map_err(|_| PurchaseError::UnknownProduct {
                product_id: product_id.to_string(),
            })
    }

    fn begin_attempt<'a>(
        &'a self,
        product: &'a Product,
        state: AttemptState,
    ) -> Result<TransactionAttempt<'a>, PurchaseError> {
        let mut attempts = self.attempts.lock().unwrap_or_else(|p| p.into_inner());
        if attempts.contains_key(product.id()) {
            return Err(PurchaseError::AttemptInFlight {
                product_id: product.id().to_string(),
            });
        }
        attempts.insert(product.id().to_string(), state);
        debug!(product_id = product.id(), ?state, "attempt started");

        Ok(TransactionAttempt {
            guard: AttemptGuard {
                attempts: &self.attempts,
                product_id: product.id().to_string(),
            },
            product,
        })
    }

    async fn restore_one(&self, item: &RestoredPurchase) -> Result<Grant, PurchaseError> {
        let product = self.ready_product(&item.product_id)?;
        let attempt = self.begin_attempt(product, AttemptState::Validating)?;
        self.complete(attempt, &item.receipt).await
    }

    async fn resolve(
        &self,
        attempt: TransactionAttempt<'_>,
        event: PurchaseEvent,
    ) -> Result<PurchaseOutcome, PurchaseError> {
        let product_id = attempt.product.id().to_string();

        match event {
            PurchaseEvent::Purchased(receipt) => {
                let grant = self.complete(attempt, &receipt).await?;
                Ok(PurchaseOutcome::Granted(grant))
            }
            PurchaseEvent::Deferred => {
                info!(product_id = %product_id, "purchase deferred pending approval");
                Ok(PurchaseOutcome::Deferred { product_id })
            }
            PurchaseEvent::Failed(reason) => {
                info!(product_id = %product_id, ?reason, "store failed purchase");
                Err(PurchaseError::PurchaseFailed { product_id, reason })
            }
        }
    }

    /// Validating -> Granting -> Idle.
    async fn complete(
        &self,
        attempt: TransactionAttempt<'_>,
        receipt: &RawReceipt,
    ) -> Result<Grant, PurchaseError> {
        let product = attempt.product;

        attempt.guard.advance(AttemptState::Validating);
        let purchase = self.validator.validate(receipt, product).map_err(|error| {
            warn!(
                product_id = product.id(),
                receipt = %short_fingerprint(receipt.as_str().as_bytes()),
                %error,
                "receipt rejected"
            );
            error
        })?;

        attempt.guard.advance(AttemptState::Granting);
        let disposition = self.grant(product, &purchase)?;

        self.gateway
            .finish_transaction(product, purchase.transaction_id())
            .await;

        let subscription = match product.kind() {
            ProductKind::Subscription => self.subscription_info(product, &purchase).await,
            _ => None,
        };

        Ok(Grant {
            product_id: product.id().to_string(),
            kind: product.kind(),
            payout: product.payout().cloned(),
            purchase,
            subscription,
            disposition,
        })
    }

    /// Ledger check, entitlement side effect, ledger mark, under the
    /// transaction's lock. Any ledger failure aborts before the sink runs.
    fn grant(
        &self,
        product: &Product,
        purchase: &ValidatedPurchase,
    ) -> Result<GrantDisposition, PurchaseError> {
        let transaction_id = purchase.transaction_id();
        let _lock = self.ledger.lock(transaction_id);

        if let Some(existing) = self.ledger.entry(transaction_id)? {
            if existing.product_id != product.id() {
                warn!(
                    product_id = product.id(),
                    transaction_id,
                    existing_product_id = %existing.product_id,
                    "transaction id already recorded for another product"
                );
                return Err(PurchaseError::LedgerConflict {
                    transaction_id: transaction_id.to_string(),
                    existing_product_id: existing.product_id,
                });
            }
            if existing.is_granted() {
                debug!(
                    product_id = product.id(),
                    transaction_id, "transaction already granted, replaying outcome"
                );
                return Ok(GrantDisposition::Replayed);
            }
        }

        if product.kind() == ProductKind::NonConsumable && self.ledger.has_granted(product.id())? {
            self.ledger.record_pending(purchase.into())?;
            self.ledger.mark_granted(transaction_id)?;
            info!(
                product_id = product.id(),
                transaction_id, "non-consumable already owned, recorded without re-grant"
            );
            return Ok(GrantDisposition::Replayed);
        }

        self.ledger.record_pending(purchase.into())?;

        if let Err(error) = self.sink.grant(product, purchase) {
            warn!(
                product_id = product.id(),
                transaction_id,
                %error,
                "entitlement sink failed, transaction left pending"
            );
            return Err(error);
        }

        self.ledger.mark_granted(transaction_id)?;
        info!(
            product_id = product.id(),
            transaction_id,
            store = %purchase.store(),
            renewal = purchase.is_subscription_renewal(),
            "entitlement granted"
        );
        Ok(GrantDisposition::Fresh)
    }

    /// Best effort: missing or unreadable store metadata yields `None`
    /// rather than failing the grant.
    async fn subscription_info(
        &self,
        product: &Product,
        purchase: &ValidatedPurchase,
    ) -> Option<SubscriptionInfo> {
        let intro = match self.gateway.introductory_price_info(product).await {
            Ok(Some(json)) => match IntroductoryPriceInfo::parse(&json) {
                Ok(info) => Some(info),
                Err(error) => {
                    warn!(product_id = product.id(), %error, "subscription detail unavailable");
                    return None;
                }
            },
            Ok(None) => None,
            Err(error) => {
                warn!(product_id = product.id(), %error, "subscription detail unavailable");
                return None;
            }
        };

        Some(SubscriptionInfo::derive(
            purchase,
            intro.as_ref(),
            self.clock.as_ref(),
        ))
    }
}
