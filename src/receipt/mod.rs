//! Receipt parsing and validation, one signature scheme per store.

pub mod apple;
pub mod envelope;
pub mod google;
pub mod purchase;
pub mod validator;

pub use envelope::{RawReceipt, ReceiptEnvelope, StoreReceipt};
pub use purchase::ValidatedPurchase;
pub use validator::ReceiptValidator;
