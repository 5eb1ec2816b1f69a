//! Apple receipt scheme: compact JWS signed with EdDSA.
//!
//! ```text
//! base64url(header) "." base64url(claims) "." base64url(signature)
//! ```
//! The signature covers the ASCII `header.claims` prefix.

use crate::crypto::verify::{decode_b64url, verify_ed25519};
use crate::PurchaseError;
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
struct JwsHeader {
    alg: String,
}

/// Transaction claims from a verified Apple JWS. Times are epoch milliseconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppleClaims {
    /// App bundle id.
    pub bundle_id: String,
    /// Store-specific product id.
    pub product_id: String,
    /// Id of this transaction.
    pub transaction_id: String,
    /// Id of the first transaction in a renewal chain.
    #[serde(default)]
    pub original_transaction_id: Option<String>,
    /// Purchase time.
    pub purchase_date: i64,
    /// Subscription expiry.
    #[serde(default)]
    pub expires_date: Option<i64>,
    /// Refund / revocation time.
    #[serde(default)]
    pub cancellation_date: Option<i64>,
}

/// Parsed but unverified Apple JWS.
#[derive(Debug, Clone)]
pub struct AppleReceipt {
    signing_input: String,
    claims_segment: String,
    signature: Vec<u8>,
}

impl AppleReceipt {
    /// Split and decode the JWS structure. Claims stay encoded until verified.
    pub fn parse(jws: &str) -> Result<Self, PurchaseError> {
        let mut segments = jws.trim().split('.');
        let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(PurchaseError::MalformedReceipt(
                "JWS must have exactly three segments".to_string(),
            ));
        };

        let header: JwsHeader = serde_json::from_slice(&decode_b64url(header_b64)?)
            .map_err(|e| PurchaseError::MalformedReceipt(format!("Invalid JWS header: {}", e)))?;

        if header.alg != "EdDSA" {
            return Err(PurchaseError::MalformedReceipt(format!(
                "Unsupported JWS algorithm: {} (expected EdDSA)",
                header.alg
            )));
        }

        Ok(Self {
            signing_input: format!("{}.{}", header_b64, claims_b64),
            claims_segment: claims_b64.to_string(),
            signature: decode_b64url(sig_b64)?,
        })
    }

    /// Verify the signature and decode the claims.
    pub fn verify(&self, key: &VerifyingKey) -> Result<AppleClaims, PurchaseError> {
        verify_ed25519(&self.signature, self.signing_input.as_bytes(), key)?;

        serde_json::from_slice(&decode_b64url(&self.claims_segment)?)
            .map_err(|e| PurchaseError::MalformedReceipt(format!("Invalid JWS claims: {}", e)))
    }
}
