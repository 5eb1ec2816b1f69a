//! Receipt validation: signature check, decode, cross-check against the catalog.
//!
//! The pipeline:
//! 1. Parse the envelope and pick the scheme from the store marker
//! 2. Fail closed if no key is configured for that store
//! 3. Verify the scheme signature
//! 4. Decode the signed payload
//! 5. Cross-check app id, transaction id and product id

use crate::catalog::{Product, ProductKind, Store};
use crate::config::PurchaseConfig;
use crate::crypto::verify::decode_public_key;
use crate::receipt::apple::AppleReceipt;
use crate::receipt::envelope::{RawReceipt, ReceiptEnvelope, StoreReceipt};
use crate::receipt::google::{original_order_id, GoogleReceipt, PURCHASE_STATE_PURCHASED};
use crate::receipt::purchase::ValidatedPurchase;
use crate::PurchaseError;
use chrono::{DateTime, Utc};
use ed25519_dalek::VerifyingKey;

/// Stateless validator holding the platform trust roots.
///
/// `validate` touches no shared state and is safe to call concurrently.
#[derive(Debug, Clone)]
pub struct ReceiptValidator {
    app_identifier: String,
    apple_key: Option<VerifyingKey>,
    google_key: Option<VerifyingKey>,
}

impl ReceiptValidator {
    /// Build a validator from configuration, decoding the verify keys once.
    ///
    /// # Errors
    /// * `ConfigError` - A configured key is not a valid Ed25519 public key
    pub fn new(config: &PurchaseConfig) -> Result<Self, PurchaseError> {
        Ok(Self {
            app_identifier: config.app_identifier.to_string(),
            apple_key: config.apple_root_key_hex.map(decode_public_key).transpose()?,
            google_key: config.google_public_key_hex.map(decode_public_key).transpose()?,
        })
    }

    /// Validate a raw receipt for the product the caller expects it to pay for.
    ///
    /// # Errors
    /// * `MalformedReceipt` - Unparseable, or the signed contents do not match `expected`
    /// * `SignatureInvalid` - Signature does not verify under the store's key
    /// * `MissingCredentials` - No key configured for the receipt's store
    pub fn validate(
        &self,
        raw: &RawReceipt,
        expected: &Product,
    ) -> Result<ValidatedPurchase, PurchaseError> {
        let envelope = ReceiptEnvelope::parse(raw)?;
        let fingerprint = raw.fingerprint();

        let purchase = match &envelope.receipt {
            StoreReceipt::Apple(receipt) => {
                self.validate_apple(envelope.store, receipt, expected, fingerprint)?
            }
            StoreReceipt::Google(receipt) => self.validate_google(receipt, expected, fingerprint)?,
        };

        if purchase.transaction_id != envelope.transaction_id {
            return Err(PurchaseError::MalformedReceipt(format!(
                "Envelope transaction id {} does not match signed id {}",
                envelope.transaction_id, purchase.transaction_id
            )));
        }

        Ok(purchase)
    }

    fn validate_apple(
        &self,
        store: Store,
        receipt: &AppleReceipt,
        expected: &Product,
        fingerprint: String,
    ) -> Result<ValidatedPurchase, PurchaseError> {
        let key = self.key_for(store, self.apple_key.as_ref())?;
        let claims = receipt.verify(key)?;

        self.check_app_identifier(&claims.bundle_id)?;
        check_product(store, &claims.product_id, expected)?;

        if let Some(ms) = claims.cancellation_date {
            return Err(PurchaseError::MalformedReceipt(format!(
                "Transaction {} was cancelled at {}",
                claims.transaction_id,
                millis_to_utc(ms, "cancellationDate")?.to_rfc3339()
            )));
        }

        let original_transaction_id = claims
            .original_transaction_id
            .unwrap_or_else(|| claims.transaction_id.clone());

        Ok(ValidatedPurchase {
            product_id: expected.id().to_string(),
            store_product_id: claims.product_id,
            is_subscription_renewal: is_renewal(
                expected,
                &claims.transaction_id,
                &original_transaction_id,
            ),
            transaction_id: claims.transaction_id,
            original_transaction_id,
            purchase_timestamp: millis_to_utc(claims.purchase_date, "purchaseDate")?,
            store,
            expires_at: claims
                .expires_date
                .map(|ms| millis_to_utc(ms, "expiresDate"))
                .transpose()?,
            auto_renewing: None,
            receipt_fingerprint: fingerprint,
        })
    }

    fn validate_google(
        &self,
        receipt: &GoogleReceipt,
        expected: &Product,
        fingerprint: String,
    ) -> Result<ValidatedPurchase, PurchaseError> {
        let store = Store::GooglePlay;
        let key = self.key_for(store, self.google_key.as_ref())?;
        let data = receipt.verify(key)?;

        self.check_app_identifier(&data.package_name)?;
        check_product(store, &data.product_id, expected)?;

        if data.purchase_state != PURCHASE_STATE_PURCHASED {
            return Err(PurchaseError::MalformedReceipt(format!(
                "Purchase state {} is not purchased",
                data.purchase_state
            )));
        }

        let original_transaction_id = original_order_id(&data.order_id).to_string();

        Ok(ValidatedPurchase {
            product_id: expected.id().to_string(),
            store_product_id: data.product_id,
            is_subscription_renewal: is_renewal(expected, &data.order_id, &original_transaction_id),
            transaction_id: data.order_id,
            original_transaction_id,
            purchase_timestamp: millis_to_utc(data.purchase_time, "purchaseTime")?,
            store,
            expires_at: None,
            auto_renewing: data.auto_renewing,
            receipt_fingerprint: fingerprint,
        })
    }

    fn key_for<'a>(
        &self,
        store: Store,
        key: Option<&'a VerifyingKey>,
    ) -> Result<&'a VerifyingKey, PurchaseError> {
        key.ok_or_else(|| PurchaseError::MissingCredentials {
            store: store.to_string(),
        })
    }

    fn check_app_identifier(&self, signed: &str) -> Result<(), PurchaseError> {
        if signed != self.app_identifier {
            return Err(PurchaseError::MalformedReceipt(format!(
                "Receipt issued for {} not {}",
                signed, self.app_identifier
            )));
        }
        Ok(())
    }
}

/// Reject a receipt for one product replayed against another.
fn check_product(store: Store, signed: &str, expected: &Product) -> Result<(), PurchaseError> {
    let want = expected.store_specific_id(store);
    if signed != want {
        return Err(PurchaseError::MalformedReceipt(format!(
            "Receipt is for product {} but {} was expected",
            signed, want
        )));
    }
    Ok(())
}

fn is_renewal(product: &Product, transaction_id: &str, original_transaction_id: &str) -> bool {
    product.kind() == ProductKind::Subscription && transaction_id != original_transaction_id
}

fn millis_to_utc(ms: i64, field: &str) -> Result<DateTime<Utc>, PurchaseError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| PurchaseError::MalformedReceipt(format!("{} out of range: {}", field, ms)))
}
