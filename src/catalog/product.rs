//! Product definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a purchase of the product is consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProductKind {
    /// Can be bought repeatedly (currency, potions).
    Consumable,
    /// Bought once, owned forever, restorable.
    NonConsumable,
    /// Recurring billing; renewals share an original transaction id.
    Subscription,
}

/// Storefront that issued a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Store {
    /// iOS / tvOS App Store.
    AppleAppStore,
    /// macOS App Store.
    MacAppStore,
    /// Google Play.
    GooglePlay,
}

impl Store {
    /// Name used in receipt envelopes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Store::AppleAppStore => "AppleAppStore",
            Store::MacAppStore => "MacAppStore",
            Store::GooglePlay => "GooglePlay",
        }
    }

    /// Parse an envelope store marker.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "AppleAppStore" => Some(Store::AppleAppStore),
            "MacAppStore" => Some(Store::MacAppStore),
            "GooglePlay" => Some(Store::GooglePlay),
            _ => None,
        }
    }
}

impl fmt::Display for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutType {
    /// Soft or hard currency.
    Currency,
    /// Inventory item.
    Item,
    /// Resource such as energy.
    Resource,
    /// Anything else.
    Other,
}

/// What a purchase pays out; opaque to this crate, carried to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payout {
    /// Payout category.
    pub payout_type: PayoutType,
    /// Free-form subtype.
    pub subtype: String,
    /// Amount granted.
    pub quantity: f64,
    /// Free-form data for the game.
    pub data: String,
}

/// A purchasable product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    id: String,
    kind: ProductKind,
    #[serde(default)]
    store_ids: BTreeMap<Store, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payout: Option<Payout>,
}

impl Product {
    /// Create a product whose id is the same on every store.
    pub fn new(id: impl Into<String>, kind: ProductKind) -> Self {
        Self {
            id: id.into(),
            kind,
            store_ids: BTreeMap::new(),
            payout: None,
        }
    }

    /// Override the identifier used by one store.
    pub fn with_store_id(mut self, store: Store, store_id: impl Into<String>) -> Self {
        self.store_ids.insert(store, store_id.into());
        self
    }

    /// Attach a payout definition.
    pub fn with_payout(mut self, payout: Payout) -> Self {
        self.payout = Some(payout);
        self
    }

    /// Catalog identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Product kind.
    pub fn kind(&self) -> ProductKind {
        self.kind
    }

    /// Payout definition, if any.
    pub fn payout(&self) -> Option<&Payout> {
        self.payout.as_ref()
    }

    /// Identifier the given store uses for this product.
    ///
    /// Falls back to the catalog id when no override is registered.
    pub fn store_specific_id(&self, store: Store) -> &str {
        self.store_ids
            .get(&store)
            .map(String::as_str)
            .unwrap_or(&self.id)
    }
}
