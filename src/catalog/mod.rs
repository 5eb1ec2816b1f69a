//! Product catalog: the static set of purchasable products.

pub mod product;

pub use product::{Payout, PayoutType, Product, ProductKind, Store};

use crate::PurchaseError;
use std::collections::HashMap;

/// Products in registration order, indexed by id.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from products, rejecting the whole set on any duplicate.
    pub fn from_products(products: impl IntoIterator<Item = Product>) -> Result<Self, PurchaseError> {
        let mut catalog = Self::new();
        for product in products {
            catalog.register(product)?;
        }
        Ok(catalog)
    }

    /// Register a product.
    ///
    /// # Errors
    /// * `DuplicateProduct` - The id is already registered
    pub fn register(&mut self, product: Product) -> Result<(), PurchaseError> {
        if self.index.contains_key(product.id()) {
            return Err(PurchaseError::DuplicateProduct {
                product_id: product.id().to_string(),
            });
        }
        self.index.insert(product.id().to_string(), self.products.len());
        self.products.push(product);
        Ok(())
    }

    /// Look up a product by id.
    pub fn lookup(&self, product_id: &str) -> Result<&Product, PurchaseError> {
        self.index
            .get(product_id)
            .map(|&i| &self.products[i])
            .ok_or_else(|| PurchaseError::ProductNotFound {
                product_id: product_id.to_string(),
            })
    }

    /// All products in registration order.
    pub fn all_products(&self) -> &[Product] {
        &self.products
    }

    /// Number of products.
    pub fn len(&self) -> usize {
        self.products.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
