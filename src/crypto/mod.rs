//! Cryptographic primitives for receipt verification.

pub mod digest;
pub mod verify;
