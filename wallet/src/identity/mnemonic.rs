//! # Recovery Phrases
//!
//! BIP39 mnemonic handling: validation, generation and seed derivation.
//! The wordlist and checksum arithmetic come from the `bip39` crate; this
//! module adds the wallet's own rules on top.
//!
//! - Only 12- and 24-word phrases are accepted.
//! - Input is normalised before anything else: lower-cased, with runs of
//!   whitespace collapsed to single spaces. `"  Abandon  ABANDON ..."` and
//!   `"abandon abandon ..."` are the same phrase, and [`exists`] checks in
//!   the identity store compare the normalised form.
//! - Seeds use the empty BIP39 passphrase. There is no "25th word" support.
//!
//! [`exists`]: crate::identity::store::SecureIdentityStore::exists

use bip39::{Language, Mnemonic};
use rand::{rngs::OsRng, RngCore};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::config::ALLOWED_MNEMONIC_WORD_COUNTS;

/// Errors from mnemonic parsing or generation.
#[derive(Debug, Error)]
pub enum MnemonicError {
    /// Word count outside the allowed set.
    #[error("unsupported word count {0}; expected 12 or 24")]
    WordCount(usize),

    /// Unknown word or bad checksum.
    #[error("invalid mnemonic: {0}")]
    Invalid(String),
}

/// Lower-cases `phrase` and collapses whitespace runs to single spaces.
pub fn normalize(phrase: &str) -> String {
    phrase
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse(phrase: &str) -> Result<Mnemonic, MnemonicError> {
    let normalized = normalize(phrase);
    let words = normalized.split(' ').filter(|w| !w.is_empty()).count();
    if !ALLOWED_MNEMONIC_WORD_COUNTS.contains(&words) {
        return Err(MnemonicError::WordCount(words));
    }
    Mnemonic::parse_in_normalized(Language::English, &normalized)
        .map_err(|e| MnemonicError::Invalid(e.to_string()))
}

/// Returns `true` if `phrase` is a checksum-correct English BIP39 mnemonic
/// of an allowed length. Pure; no I/O.
pub fn validate(phrase: &str) -> bool {
    parse(phrase).is_ok()
}

/// Generates a fresh phrase of `word_count` words from OS randomness.
pub fn generate(word_count: usize) -> Result<String, MnemonicError> {
    if !ALLOWED_MNEMONIC_WORD_COUNTS.contains(&word_count) {
        return Err(MnemonicError::WordCount(word_count));
    }
    // 12 words = 16 bytes, 24 words = 32 bytes.
    let mut entropy = Zeroizing::new(vec![0u8; word_count / 3 * 4]);
    OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .map_err(|e| MnemonicError::Invalid(e.to_string()))?;
    Ok(mnemonic.to_string())
}

/// Derives the 64-byte BIP39 seed (empty passphrase).
pub fn to_seed(phrase: &str) -> Result<Zeroizing<[u8; 64]>, MnemonicError> {
    let mnemonic = parse(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed_normalized("")))
}
