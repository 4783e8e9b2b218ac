//! # Cryptographic Helpers
//!
//! Thin, typed wrappers around audited implementations. Nothing in here
//! invents cryptography; it only fixes the parameters the wallet uses so
//! that the rest of the crate cannot get them wrong.
//!
//! - **AES-256-GCM** seals the private-key bundle at rest.
//! - **SHA-224 / SHA-256** feed principal and account-identifier derivation.
//! - **CRC32** is the checksum the ledger's textual formats carry. It is
//!   not a security primitive and is never used as one.

pub mod encryption;
pub mod hash;

pub use encryption::{open, seal, EncryptionError};
pub use hash::{crc32, sha224, sha256};
