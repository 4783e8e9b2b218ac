// Copyright (c) 2026 Fuse Wallet Contributors. MIT License.
// See LICENSE for details.

//! # Fuse Wallet Core Library
//!
//! The part of a wallet that must not get things wrong: who you are, what
//! you hold, and what happens when you press "send".
//!
//! Keys come from a BIP39 recovery phrase through SLIP-10 Ed25519
//! derivation, or straight from an imported private key. They live in an
//! AES-256-GCM sealed bundle whose key is stretched from your password with
//! Argon2id, and they are never written anywhere in the clear.
//!
//! ## Architecture
//!
//! - **identity**: mnemonics, key derivation, principals, the encrypted
//!   identity store and the `INITIAL → LOCKED ↔ ALIVE` state machine.
//! - **ledger**: ICRC1 and legacy ledger calls over a pluggable transport,
//!   with ledger rejections decoded into real error types.
//! - **refresh**: cancellable polling of balances and prices.
//! - **storage**: the key-value seam, in memory or on sled.
//! - **crypto**: AES-GCM sealing and the hashes principals need.
//! - **config**: constants and tunables.
//!
//! ## Ground Rules
//!
//! 1. No secret is ever logged, printed, or persisted unencrypted.
//! 2. Amounts are integers. A float has never touched a balance here.
//! 3. A rejected operation leaves no trace in storage.
//! 4. If it touches keys, it has tests. Plural.

pub mod config;
pub mod crypto;
pub mod identity;
pub mod ledger;
pub mod refresh;
pub mod storage;
