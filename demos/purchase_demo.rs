//! Purchase, replay and restore against a canned storefront.
//!
//! The storefront here answers from memory and signs its receipts with the
//! RFC 8032 test key, so the whole flow runs offline.
//!
//! # Running
//!
//! ```bash
//! cargo run --example purchase_demo
//! ```
//!
//! # Note
//!
//! In production the verify keys are compile-time constants for the real
//! store trust roots, and the gateway wraps the platform billing SDK.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ed25519_dalek::{Signer, SigningKey};
use futures_util::stream::{self, BoxStream, StreamExt};
use purchasewarden::{
    Catalog, EntitlementSink, InitFailureReason, MemoryLedgerStore, Payout, PayoutType, Product,
    ProductKind, ProductMetadata, PurchaseConfig, PurchaseError, PurchaseEvent, PurchaseManager,
    PurchaseOutcome, RawReceipt, RestoredPurchase, Store, StorefrontGateway, ValidatedPurchase,
};
use serde_json::json;
use std::sync::Arc;

const APP_ID: &str = "com.CompanyName.GameTitle";

// RFC 8032 test 1 (DO NOT USE IN PRODUCTION)
const DEMO_SEED: [u8; 32] = [
    0x9d, 0x61, 0xb1, 0x9d, 0xef, 0xfd, 0x5a, 0x60, 0xba, 0x84, 0x4a, 0xf4, 0x92, 0xec, 0x2c,
    0xc4, 0x44, 0x49, 0xc5, 0x69, 0x7b, 0x32, 0x69, 0x19, 0x70, 0x3b, 0xac, 0x03, 0x1c, 0xae,
    0x7f, 0x60,
];
const DEMO_VERIFY_KEY: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";

/// Signs an App Store style receipt the way the store would.
fn signed_receipt(product_id: &str, transaction_id: &str) -> RawReceipt {
    let claims = json!({
        "bundleId": APP_ID,
        "productId": product_id,
        "transactionId": transaction_id,
        "purchaseDate": 1_736_942_400_000i64,
    });
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string())
    );
    let signature = SigningKey::from_bytes(&DEMO_SEED).sign(signing_input.as_bytes());

    RawReceipt::new(
        json!({
            "Store": Store::AppleAppStore.as_str(),
            "TransactionID": transaction_id,
            "Payload": format!("{}.{}", signing_input, URL_SAFE_NO_PAD.encode(signature.to_bytes())),
        })
        .to_string(),
    )
}

struct CannedStorefront;

#[async_trait]
impl StorefrontGateway for CannedStorefront {
    async fn initialize(
        &self,
        catalog: &Catalog,
    ) -> Result<Vec<ProductMetadata>, InitFailureReason> {
        Ok(catalog
            .all_products()
            .iter()
            .map(|p| ProductMetadata {
                product_id: p.id().to_string(),
                localized_title: p.id().replace('_', " "),
                localized_description: String::new(),
                localized_price_string: "$0.99".to_string(),
                available_to_purchase: true,
            })
            .collect())
    }

    async fn initiate(&self, product: &Product) -> PurchaseEvent {
        match product.id() {
            "gold_helm_rare" => PurchaseEvent::Purchased(signed_receipt(product.id(), "2000000001")),
            _ => PurchaseEvent::Deferred,
        }
    }

    fn restore(&self) -> BoxStream<'_, RestoredPurchase> {
        stream::iter([RestoredPurchase {
            product_id: "gold_helm_rare".to_string(),
            receipt: signed_receipt("gold_helm_rare", "2000000001"),
        }])
        .boxed()
    }

    async fn finish_transaction(&self, product: &Product, transaction_id: &str) {
        println!("  store: finished {} ({})", transaction_id, product.id());
    }
}

struct Inventory;

impl EntitlementSink for Inventory {
    fn grant(&self, product: &Product, purchase: &ValidatedPurchase) -> Result<(), PurchaseError> {
        println!(
            "  inventory: +{} (transaction {})",
            product.id(),
            purchase.transaction_id()
        );
        Ok(())
    }
}

fn report(label: &str, result: Result<PurchaseOutcome, PurchaseError>) {
    match result {
        Ok(PurchaseOutcome::Granted(grant)) => {
            println!("✓ {}: {:?} grant of {}", label, grant.disposition, grant.product_id)
        }
        Ok(PurchaseOutcome::Deferred { product_id }) => {
            println!("… {}: {} awaiting approval", label, product_id)
        }
        Err(e) => println!("✗ {}: {}", label, e),
    }
}

#[tokio::main]
async fn main() -> Result<(), PurchaseError> {
    let config = PurchaseConfig {
        app_identifier: APP_ID,
        apple_root_key_hex: Some(DEMO_VERIFY_KEY),
        google_public_key_hex: None,
        ledger_namespace: "purchasewarden-demo",
    };

    let catalog = Catalog::from_products([
        Product::new("health_potion_medium", ProductKind::Consumable),
        Product::new("gold_helm_rare", ProductKind::NonConsumable).with_payout(Payout {
            payout_type: PayoutType::Item,
            subtype: "Custom subtype".to_string(),
            quantity: 1.0,
            data: "Data".to_string(),
        }),
    ])?;

    // In-memory ledger so repeated runs start clean
    let manager = PurchaseManager::with_ledger_store(
        config,
        catalog,
        CannedStorefront,
        Arc::new(MemoryLedgerStore::new()),
        Arc::new(Inventory),
    )?;
    manager.initialize().await?;

    report("purchase", manager.purchase("gold_helm_rare").await);

    // The store re-delivers the same receipt, e.g. after an app restart
    report(
        "replay",
        manager
            .handle_event(
                "gold_helm_rare",
                PurchaseEvent::Purchased(signed_receipt("gold_helm_rare", "2000000001")),
            )
            .await,
    );

    report("deferred", manager.purchase("health_potion_medium").await);

    let restored = manager.restore().await?;
    println!(
        "restore: {} restored, {} failed",
        restored.restored.len(),
        restored.failed.len()
    );

    Ok(())
}
