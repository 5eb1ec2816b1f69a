//! Unified receipt envelope and store dispatch.
//!
//! Every storefront wraps its proof of purchase in the same envelope:
//! ```text
//! {"Store": "GooglePlay", "TransactionID": "GPA.1234-5678", "Payload": "<store specific>"}
//! ```
//! `Store` selects the signature scheme; `Payload` is parsed by that scheme.

use crate::catalog::Store;
use crate::crypto::digest::receipt_fingerprint;
use crate::receipt::apple::AppleReceipt;
use crate::receipt::google::GoogleReceipt;
use crate::PurchaseError;
use serde::Deserialize;

/// Opaque receipt string as returned by a storefront for one purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReceipt(String);

impl RawReceipt {
    /// Wrap a receipt string.
    pub fn new(receipt: impl Into<String>) -> Self {
        Self(receipt.into())
    }

    /// Receipt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// SHA-256 fingerprint (hex), safe to log.
    pub fn fingerprint(&self) -> String {
        receipt_fingerprint(self.0.as_bytes())
    }
}

impl From<String> for RawReceipt {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RawReceipt {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct UnifiedReceipt {
    #[serde(rename = "Store")]
    store: String,
    #[serde(rename = "TransactionID")]
    transaction_id: String,
    #[serde(rename = "Payload")]
    payload: String,
}

/// Store-specific receipt, one variant per signature scheme.
#[derive(Debug, Clone)]
pub enum StoreReceipt {
    /// Compact JWS signed with the Apple root key.
    Apple(AppleReceipt),
    /// Purchase JSON plus detached signature from Google Play.
    Google(GoogleReceipt),
}

/// Parsed envelope; nothing in it is trusted until the payload verifies.
#[derive(Debug, Clone)]
pub struct ReceiptEnvelope {
    /// Store-of-origin marker.
    pub store: Store,
    /// Unsigned transaction id claimed by the envelope.
    pub transaction_id: String,
    /// Scheme-specific payload.
    pub receipt: StoreReceipt,
}

impl ReceiptEnvelope {
    /// Parse the envelope and dispatch the payload to its scheme parser.
    pub fn parse(raw: &RawReceipt) -> Result<Self, PurchaseError> {
        let unified: UnifiedReceipt = serde_json::from_str(raw.as_str())
            .map_err(|e| PurchaseError::MalformedReceipt(format!("Invalid envelope: {}", e)))?;

        let store = Store::from_name(&unified.store).ok_or_else(|| {
            PurchaseError::MalformedReceipt(format!("Unsupported store: {}", unified.store))
        })?;

        let receipt = match store {
            Store::AppleAppStore | Store::MacAppStore => {
                StoreReceipt::Apple(AppleReceipt::parse(&unified.payload)?)
            }
            Store::GooglePlay => StoreReceipt::Google(GoogleReceipt::parse(&unified.payload)?),
        };

        Ok(Self {
            store,
            transaction_id: unified.transaction_id,
            receipt,
        })
    }
}
