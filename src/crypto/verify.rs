//! Ed25519 signature verification.

use crate::PurchaseError;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};

/// Decode a hex-encoded Ed25519 public key.
pub fn decode_public_key(hex_key: &str) -> Result<VerifyingKey, PurchaseError> {
    let bytes = hex::decode(hex_key)
        .map_err(|e| PurchaseError::ConfigError(format!("Invalid public key hex: {}", e)))?;

    let key_array: [u8; 32] = bytes
        .try_into()
        .map_err(|_| PurchaseError::ConfigError("Public key must be 32 bytes".to_string()))?;

    VerifyingKey::from_bytes(&key_array)
        .map_err(|e| PurchaseError::ConfigError(format!("Invalid Ed25519 public key: {}", e)))
}

/// Verify a raw 64-byte Ed25519 signature over `message`.
///
/// Wrong-length signatures are reported as `SignatureInvalid`, not as a
/// parse failure: a truncated signature is a forgery signal.
pub fn verify_ed25519(
    signature: &[u8],
    message: &[u8],
    verifying_key: &VerifyingKey,
) -> Result<(), PurchaseError> {
    let sig_array: [u8; 64] = signature
        .try_into()
        .map_err(|_| PurchaseError::SignatureInvalid)?;

    let signature = Signature::from_bytes(&sig_array);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| PurchaseError::SignatureInvalid)
}

/// Decode standard base64 (Google Play signatures).
pub fn decode_b64(encoded: &str) -> Result<Vec<u8>, PurchaseError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| PurchaseError::MalformedReceipt(format!("Invalid base64: {}", e)))
}

/// Decode unpadded base64url (JWS segments).
pub fn decode_b64url(encoded: &str) -> Result<Vec<u8>, PurchaseError> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| PurchaseError::MalformedReceipt(format!("Invalid base64url: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_VERIFY_KEY_HEX, test_signing_key};
    use ed25519_dalek::Signer;

    #[test]
    fn test_decode_public_key_valid() {
        assert!(decode_public_key(TEST_VERIFY_KEY_HEX).is_ok());
    }

    #[test]
    fn test_decode_public_key_bad_hex() {
        let result = decode_public_key("zz");
        assert!(matches!(result, Err(PurchaseError::ConfigError(_))));
    }

    #[test]
    fn test_decode_public_key_wrong_length() {
        let result = decode_public_key("abcd");
        assert!(matches!(result, Err(PurchaseError::ConfigError(_))));
    }

    #[test]
    fn test_verify_valid_signature() {
        let key = decode_public_key(TEST_VERIFY_KEY_HEX).unwrap();
        let sig = test_signing_key().sign(b"receipt body");
        assert!(verify_ed25519(&sig.to_bytes(), b"receipt body", &key).is_ok());
    }

    #[test]
    fn test_verify_tampered_message() {
        let key = decode_public_key(TEST_VERIFY_KEY_HEX).unwrap();
        let sig = test_signing_key().sign(b"receipt body");
        let result = verify_ed25519(&sig.to_bytes(), b"receipt b0dy", &key);
        assert!(matches!(result, Err(PurchaseError::SignatureInvalid)));
    }

    #[test]
    fn test_verify_truncated_signature() {
        let key = decode_public_key(TEST_VERIFY_KEY_HEX).unwrap();
        let result = verify_ed25519(&[0u8; 10], b"receipt body", &key);
        assert!(matches!(result, Err(PurchaseError::SignatureInvalid)));
    }

    #[test]
    fn test_decode_b64url_rejects_padding_garbage() {
        assert!(matches!(
            decode_b64url("!!!"),
            Err(PurchaseError::MalformedReceipt(_))
        ));
    }
}
