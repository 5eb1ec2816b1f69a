//! Google Play receipt scheme: purchase JSON with a detached signature.
//!
//! ```text
//! {"json": "<purchase data>", "signature": "<base64 Ed25519 over the json bytes>"}
//! ```

use crate::crypto::verify::{decode_b64, verify_ed25519};
use crate::PurchaseError;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;

/// `purchaseState` value for a completed purchase.
pub const PURCHASE_STATE_PURCHASED: i32 = 0;

/// Purchase data from a verified Google Play receipt. Times are epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GooglePurchaseData {
    /// Order id; renewals append `..N`.
    pub order_id: String,
    /// App package name.
    pub package_name: String,
    /// Store-specific product id.
    pub product_id: String,
    /// Purchase time.
    pub purchase_time: i64,
    /// 0 purchased, 1 cancelled, 2 pending.
    #[serde(default)]
    pub purchase_state: i32,
    /// Opaque token identifying the purchase.
    pub purchase_token: String,
    /// Present on subscriptions.
    #[serde(default)]
    pub auto_renewing: Option<bool>,
}

/// Parsed but unverified Google Play receipt.
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleReceipt {
    json: String,
    signature: String,
}

impl GoogleReceipt {
    /// Parse the payload wrapper.
    pub fn parse(payload: &str) -> Result<Self, PurchaseError> {
        serde_json::from_str(payload).map_err(|e| {
            PurchaseError::MalformedReceipt(format!("Invalid Google Play payload: {}", e))
        })
    }

    /// Verify the signature over the exact purchase JSON bytes, then decode it.
    pub fn verify(&self, key: &VerifyingKey) -> Result<GooglePurchaseData, PurchaseError> {
        let signature = decode_b64(&self.signature)?;
        verify_ed25519(&signature, self.json.as_bytes(), key)?;

        serde_json::from_str(&self.json).map_err(|e| {
            PurchaseError::MalformedReceipt(format!("Invalid Google Play purchase data: {}", e))
        })
    }
}

/// Order id of the first purchase in a renewal chain.
///
/// `GPA.1234-5678-9012-34567..3` is the fourth billing period of
/// `GPA.1234-5678-9012-34567`.
pub fn original_order_id(order_id: &str) -> &str {
    match order_id.rsplit_once("..") {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => order_id,
    }
}
