//! Purchasewarden configuration.

use crate::PurchaseError;

/// Configuration for receipt validation and the durable ledger.
#[derive(Debug, Clone)]
pub struct PurchaseConfig {
    /// Bundle id (Apple) / package name (Google) receipts must carry,
    /// e.g. "com.CompanyName.GameTitle".
    pub app_identifier: &'static str,

    /// Ed25519 verify key for Apple-scheme receipts (hex, 64 characters).
    /// SECURITY: This should be hard-coded in your application, not from environment.
    pub apple_root_key_hex: Option<&'static str>,

    /// Ed25519 verify key for Google Play-scheme receipts (hex, 64 characters).
    /// SECURITY: This should be hard-coded in your application, not from environment.
    pub google_public_key_hex: Option<&'static str>,

    /// Directory name under the platform data dir holding the transaction ledger.
    /// Each application should use a unique namespace.
    pub ledger_namespace: &'static str,
}

impl PurchaseConfig {
    /// Validate configuration for obvious errors.
    pub fn validate(&self) -> Result<(), PurchaseError> {
        if self.app_identifier.is_empty() {
            return Err(PurchaseError::ConfigError(
                "app_identifier cannot be empty".to_string(),
            ));
        }
        if self.ledger_namespace.is_empty() {
            return Err(PurchaseError::ConfigError(
                "ledger_namespace cannot be empty".to_string(),
            ));
        }
        if self.apple_root_key_hex.is_none() && self.google_public_key_hex.is_none() {
            return Err(PurchaseError::ConfigError(
                "at least one store verification key is required".to_string(),
            ));
        }
        for (name, key) in [
            ("apple_root_key_hex", self.apple_root_key_hex),
            ("google_public_key_hex", self.google_public_key_hex),
        ] {
            if let Some(key) = key {
                if key.len() != 64 {
                    return Err(PurchaseError::ConfigError(format!(
                        "{} must be 64 hex characters, got {}",
                        name,
                        key.len()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

    fn config() -> PurchaseConfig {
        PurchaseConfig {
            app_identifier: "com.CompanyName.GameTitle",
            apple_root_key_hex: Some(KEY),
            google_public_key_hex: None,
            ledger_namespace: "purchasewarden-test",
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn test_empty_identifier_rejected() {
        let mut c = config();
        c.app_identifier = "";
        assert!(matches!(c.validate(), Err(PurchaseError::ConfigError(_))));
    }

    #[test]
    fn test_no_keys_rejected() {
        let mut c = config();
        c.apple_root_key_hex = None;
        assert!(matches!(c.validate(), Err(PurchaseError::ConfigError(_))));
    }

    #[test]
    fn test_short_key_rejected() {
        let mut c = config();
        c.google_public_key_hex = Some("abcd");
        let err = c.validate().unwrap_err();
        assert!(err.to_string().contains("google_public_key_hex"));
    }
}
