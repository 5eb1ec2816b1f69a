//! End-to-end purchase flows through the public API.
//!
//! Receipts are signed with RFC 8032 test keys (DO NOT USE IN PRODUCTION).

use async_trait::async_trait;
use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine,
};
use ed25519_dalek::{Signer, SigningKey};
use futures_util::stream::{self, BoxStream, StreamExt};
use purchasewarden::{
    Catalog, EntitlementSink, FileLedgerStore, GrantDisposition, InitFailureReason,
    MemoryLedgerStore, Product, ProductKind, ProductMetadata, PurchaseConfig, PurchaseError,
    PurchaseEvent, PurchaseManager, PurchaseOutcome, RawReceipt, RestoredPurchase, Store,
    StorefrontGateway, ValidatedPurchase,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const APP_ID: &str = "com.CompanyName.GameTitle";
const APPLE_KEY_HEX: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
const GOOGLE_KEY_HEX: &str = "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c";

const POTION: &str = "health_potion_medium";
const HELM: &str = "gold_helm_rare";
const SUB: &str = "monthly_access_auto_renew";
const SUB_GOOGLE_ID: &str = "com.CompanyName.GameTitle.subscription.automatic";

fn apple_key() -> SigningKey {
    SigningKey::from_bytes(&seed(
        "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
    ))
}

fn google_key() -> SigningKey {
    SigningKey::from_bytes(&seed(
        "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb",
    ))
}

fn seed(hex_str: &str) -> [u8; 32] {
    hex::decode(hex_str).unwrap().try_into().unwrap()
}

fn wrap(store: Store, transaction_id: &str, payload: String) -> RawReceipt {
    RawReceipt::new(
        json!({
            "Store": store.as_str(),
            "TransactionID": transaction_id,
            "Payload": payload,
        })
        .to_string(),
    )
}

fn apple_receipt(product_id: &str, transaction_id: &str, key: &SigningKey) -> RawReceipt {
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
    let signature = URL_SAFE_NO_PAD.encode(key.sign(signing_input.as_bytes()).to_bytes());
    wrap(
        Store::AppleAppStore,
        transaction_id,
        format!("{}.{}", signing_input, signature),
    )
}

fn google_data(product_id: &str, order_id: &str) -> Value {
    json!({
        "orderId": order_id,
        "packageName": APP_ID,
        "productId": product_id,
        "purchaseTime": 1_736_942_400_000i64,
        "purchaseState": 0,
        "purchaseToken": "opaque-token",
        "autoRenewing": true,
    })
}

fn google_receipt(data: Value, key: &SigningKey) -> RawReceipt {
    let order_id = data["orderId"].as_str().unwrap().to_string();
    let json = data.to_string();
    let signature = STANDARD.encode(key.sign(json.as_bytes()).to_bytes());
    wrap(
        Store::GooglePlay,
        &order_id,
        json!({ "json": json, "signature": signature }).to_string(),
    )
}

/// Gateway that answers each product with a fixed event.
#[derive(Default)]
struct CannedStore {
    events: HashMap<String, PurchaseEvent>,
    restores: Vec<RestoredPurchase>,
    fail_intro: bool,
}

impl CannedStore {
    fn answer(mut self, product_id: &str, event: PurchaseEvent) -> Self {
        self.events.insert(product_id.to_string(), event);
        self
    }
}

#[async_trait]
impl StorefrontGateway for CannedStore {
    async fn initialize(
        &self,
        catalog: &Catalog,
    ) -> Result<Vec<ProductMetadata>, InitFailureReason> {
        Ok(catalog
            .all_products()
            .iter()
            .map(|p| ProductMetadata {
                product_id: p.id().to_string(),
                localized_title: p.id().to_string(),
                localized_description: String::new(),
                localized_price_string: "$0.99".to_string(),
                available_to_purchase: true,
            })
            .collect())
    }

    async fn initiate(&self, product: &Product) -> PurchaseEvent {
        self.events
            .get(product.id())
            .cloned()
            .unwrap_or(PurchaseEvent::Deferred)
    }

    fn restore(&self) -> BoxStream<'_, RestoredPurchase> {
        stream::iter(self.restores.clone()).boxed()
    }

    async fn introductory_price_info(
        &self,
        _product: &Product,
    ) -> Result<Option<String>, PurchaseError> {
        if self.fail_intro {
            return Err(PurchaseError::GatewayMetadata("not supported".to_string()));
        }
        Ok(None)
    }
}

#[derive(Default)]
struct Inventory {
    grants: Mutex<Vec<(String, String)>>,
}

impl EntitlementSink for Inventory {
    fn grant(&self, product: &Product, purchase: &ValidatedPurchase) -> Result<(), PurchaseError> {
        self.grants.lock().unwrap().push((
            product.id().to_string(),
            purchase.transaction_id().to_string(),
        ));
        Ok(())
    }
}

impl Inventory {
    fn count(&self) -> usize {
        self.grants.lock().unwrap().len()
    }
}

fn config() -> PurchaseConfig {
    PurchaseConfig {
        app_identifier: APP_ID,
        apple_root_key_hex: Some(APPLE_KEY_HEX),
        google_public_key_hex: Some(GOOGLE_KEY_HEX),
        ledger_namespace: "purchasewarden-flow-test",
    }
}

fn catalog() -> Catalog {
    Catalog::from_products([
        Product::new(POTION, ProductKind::Consumable),
        Product::new(HELM, ProductKind::NonConsumable),
        Product::new(SUB, ProductKind::Subscription)
            .with_store_id(Store::GooglePlay, SUB_GOOGLE_ID),
    ])
    .unwrap()
}

async fn manager(
    store: CannedStore,
    inventory: &Arc<Inventory>,
) -> PurchaseManager<CannedStore> {
    let manager = PurchaseManager::with_ledger_store(
        config(),
        catalog(),
        store,
        Arc::new(MemoryLedgerStore::new()),
        Arc::clone(inventory) as Arc<dyn EntitlementSink>,
    )
    .unwrap();
    manager.initialize().await.unwrap();
    manager
}

fn disposition(outcome: PurchaseOutcome) -> GrantDisposition {
    match outcome {
        PurchaseOutcome::Granted(grant) => grant.disposition,
        PurchaseOutcome::Deferred { product_id } => panic!("{} deferred", product_id),
    }
}

#[tokio::test]
async fn test_redelivered_receipt_grants_once() {
    let inventory = Arc::new(Inventory::default());
    let receipt = google_receipt(google_data(POTION, "GPA.3312-0001"), &google_key());
    let store = CannedStore::default().answer(POTION, PurchaseEvent::Purchased(receipt.clone()));
    let manager = manager(store, &inventory).await;

    let first = manager.purchase(POTION).await.unwrap();
    assert_eq!(disposition(first), GrantDisposition::Fresh);

    for _ in 0..3 {
        let again = manager
            .handle_event(POTION, PurchaseEvent::Purchased(receipt.clone()))
            .await
            .unwrap();
        assert_eq!(disposition(again), GrantDisposition::Replayed);
    }

    assert_eq!(
        *inventory.grants.lock().unwrap(),
        vec![(POTION.to_string(), "GPA.3312-0001".to_string())]
    );
}

#[tokio::test]
async fn test_receipt_signed_by_wrong_key_never_grants() {
    let inventory = Arc::new(Inventory::default());
    let forged = apple_receipt(HELM, "2000000001", &google_key());
    let store = CannedStore::default().answer(HELM, PurchaseEvent::Purchased(forged));
    let manager = manager(store, &inventory).await;

    let result = manager.purchase(HELM).await;
    assert!(matches!(result, Err(PurchaseError::SignatureInvalid)));
    assert_eq!(inventory.count(), 0);
    assert!(manager.ledger().entry("2000000001").unwrap().is_none());
}

#[tokio::test]
async fn test_cheap_receipt_cannot_unlock_expensive_product() {
    let inventory = Arc::new(Inventory::default());
    let potion = apple_receipt(POTION, "2000000002", &apple_key());
    let store = CannedStore::default().answer(HELM, PurchaseEvent::Purchased(potion));
    let manager = manager(store, &inventory).await;

    let result = manager.purchase(HELM).await;
    assert!(matches!(result, Err(PurchaseError::MalformedReceipt(_))));
    assert_eq!(inventory.count(), 0);
}

#[tokio::test]
async fn test_store_without_configured_key_fails_closed() {
    let inventory = Arc::new(Inventory::default());
    let receipt = google_receipt(google_data(POTION, "GPA.1"), &google_key());
    let store = CannedStore::default().answer(POTION, PurchaseEvent::Purchased(receipt));

    let mut config = config();
    config.google_public_key_hex = None;
    let manager = PurchaseManager::with_ledger_store(
        config,
        catalog(),
        store,
        Arc::new(MemoryLedgerStore::new()),
        Arc::clone(&inventory) as Arc<dyn EntitlementSink>,
    )
    .unwrap();
    manager.initialize().await.unwrap();

    let result = manager.purchase(POTION).await;
    assert!(matches!(
        result,
        Err(PurchaseError::MissingCredentials { store }) if store == "GooglePlay"
    ));
    assert_eq!(inventory.count(), 0);
}

#[tokio::test]
async fn test_deferred_purchase_writes_nothing() {
    let inventory = Arc::new(Inventory::default());
    let manager = manager(CannedStore::default(), &inventory).await;

    let outcome = manager.purchase(HELM).await.unwrap();
    assert!(matches!(outcome, PurchaseOutcome::Deferred { .. }));
    assert!(manager.ledger().pending().unwrap().is_empty());
    assert_eq!(inventory.count(), 0);
}

#[tokio::test]
async fn test_subscription_granted_when_metadata_unavailable() {
    let inventory = Arc::new(Inventory::default());
    let receipt = google_receipt(google_data(SUB_GOOGLE_ID, "GPA.4000-1"), &google_key());
    let store = CannedStore {
        fail_intro: true,
        ..CannedStore::default()
    }
    .answer(SUB, PurchaseEvent::Purchased(receipt));
    let manager = manager(store, &inventory).await;

    match manager.purchase(SUB).await.unwrap() {
        PurchaseOutcome::Granted(grant) => {
            assert!(grant.subscription.is_none());
            assert_eq!(grant.kind, ProductKind::Subscription);
        }
        other => panic!("expected grant, got {:?}", other),
    }
    assert_eq!(inventory.count(), 1);
}

#[tokio::test]
async fn test_empty_restore_succeeds() {
    let inventory = Arc::new(Inventory::default());
    let manager = manager(CannedStore::default(), &inventory).await;

    let report = manager.restore().await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_restore_regrants_only_missing_purchases() {
    let inventory = Arc::new(Inventory::default());
    let helm = apple_receipt(HELM, "2000000010", &apple_key());
    let store = CannedStore {
        restores: vec![
            RestoredPurchase {
                product_id: HELM.to_string(),
                receipt: helm.clone(),
            },
            RestoredPurchase {
                product_id: HELM.to_string(),
                receipt: apple_receipt(HELM, "2000000011", &google_key()),
            },
        ],
        ..CannedStore::default()
    }
    .answer(HELM, PurchaseEvent::Purchased(helm));
    let manager = manager(store, &inventory).await;

    manager.purchase(HELM).await.unwrap();
    let report = manager.restore().await.unwrap();

    assert_eq!(report.restored.len(), 1);
    assert_eq!(report.restored[0].disposition, GrantDisposition::Replayed);
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(report.failed[0].error, PurchaseError::SignatureInvalid));
    assert_eq!(inventory.count(), 1);
}

#[tokio::test]
async fn test_ledger_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let inventory = Arc::new(Inventory::default());
    let receipt = google_receipt(google_data(POTION, "GPA.5000-1"), &google_key());

    for expected in [GrantDisposition::Fresh, GrantDisposition::Replayed] {
        let ledger = FileLedgerStore::with_path(temp_dir.path().to_path_buf()).unwrap();
        let manager = PurchaseManager::with_ledger_store(
            config(),
            catalog(),
            CannedStore::default(),
            Arc::new(ledger),
            Arc::clone(&inventory) as Arc<dyn EntitlementSink>,
        )
        .unwrap();
        manager.initialize().await.unwrap();

        let outcome = manager
            .handle_event(POTION, PurchaseEvent::Purchased(receipt.clone()))
            .await
            .unwrap();
        assert_eq!(disposition(outcome), expected);
    }

    assert_eq!(inventory.count(), 1);
}
