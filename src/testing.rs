//! Fixture receipts signed with RFC 8032 test keys (DO NOT USE IN PRODUCTION).

use crate::catalog::Store;
use crate::clock::MockClock;
use crate::receipt::RawReceipt;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};

pub(crate) const APP_ID: &str = "com.CompanyName.GameTitle";

// RFC 8032 test 1
const TEST_SIGNING_SEED_BYTES: [u8; 32] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c,
    0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae,
    0x7f, 0x60,
];
pub(crate) const TEST_VERIFY_KEY_HEX: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

// RFC 8032 test 2
const TEST_GOOGLE_SEED_HEX: &str =
    "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb";
pub(crate) const TEST_GOOGLE_VERIFY_KEY_HEX: &str =
    "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c";

/// Purchase time every fixture receipt carries: 2025-01-15T12:00:00Z.
pub(crate) const PURCHASE_TIME_MS: i64 = 1_736_942_400_000;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Clock frozen `days` after the fixture purchase time.
pub(crate) fn clock_days_after_purchase(days: i64) -> MockClock {
    MockClock::from_millis(PURCHASE_TIME_MS + days * DAY_MS)
}

pub(crate) fn test_signing_key() -> SigningKey {
    SigningKey::from_bytes(&TEST_SIGNING_SEED_BYTES)
}

pub(crate) fn test_google_signing_key() -> SigningKey {
    let bytes: [u8; 32] = hex::decode(TEST_GOOGLE_SEED_HEX)
        .unwrap()
        .try_into()
        .unwrap();
    SigningKey::from_bytes(&bytes)
}

/// Apple claims for a first purchase at 2025-01-15T12:00:00Z.
pub(crate) fn apple_claims(product_id: &str, transaction_id: &str) -> Value {
    json!({
        "bundleId": APP_ID,
        "productId": product_id,
        "transactionId": transaction_id,
        "originalTransactionId": transaction_id,
        "purchaseDate": PURCHASE_TIME_MS,
    })
}

pub(crate) fn apple_jws(claims: &Value, key: &SigningKey) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA","kid":"test"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    let signing_input = format!("{}.{}", header, payload);
    let signature = key.sign(signing_input.as_bytes());
    format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    )
}

pub(crate) fn apple_receipt(claims: Value) -> RawReceipt {
    let tx = claims["transactionId"].as_str().unwrap_or_default().to_string();
    envelope(Store::AppleAppStore, &tx, &apple_jws(&claims, &test_signing_key()))
}

/// Google purchase data for a first purchase at 2025-01-15T12:00:00Z.
pub(crate) fn google_purchase(product_id: &str, order_id: &str) -> Value {
    json!({
        "orderId": order_id,
        "packageName": APP_ID,
        "productId": product_id,
        "purchaseTime": PURCHASE_TIME_MS,
        "purchaseState": 0,
        "purchaseToken": "opaque-token",
    })
}

pub(crate) fn google_payload(purchase: &Value, key: &SigningKey) -> String {
    let json = purchase.to_string();
    let signature = STANDARD.encode(key.sign(json.as_bytes()).to_bytes());
    json!({ "json": json, "signature": signature }).to_string()
}

pub(crate) fn google_receipt(purchase: Value) -> RawReceipt {
    let tx = purchase["orderId"].as_str().unwrap_or_default().to_string();
    envelope(
        Store::GooglePlay,
        &tx,
        &google_payload(&purchase, &test_google_signing_key()),
    )
}

pub(crate) fn envelope(store: Store, transaction_id: &str, payload: &str) -> RawReceipt {
    RawReceipt::new(
        json!({
            "Store": store.as_str(),
            "TransactionID": transaction_id,
            "Payload": payload,
        })
        .to_string(),
    )
}
