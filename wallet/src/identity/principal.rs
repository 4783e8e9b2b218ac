//! # Principals & Account Identifiers
//!
//! A **principal** is the ledger's notion of "who": up to 29 opaque bytes.
//! Users get *self-authenticating* principals, which are a hash of their
//! DER-encoded Ed25519 public key followed by the type tag `0x02`.
//!
//! ## Textual form
//!
//! ```text
//! base32_lower_nopad( crc32_be(bytes) || bytes )  grouped by 5 with '-'
//!
//! [0x04]  ->  "2vxsx-fae"      (the anonymous principal)
//! []      ->  "aaaaa-aa"       (the management canister)
//! ```
//!
//! The checksum catches transcription errors before anything is signed.
//! Parsing is strict: the input must re-encode to exactly itself (modulo
//! case), so there is only ever one accepted spelling of a principal.
//!
//! ## Account identifiers
//!
//! The legacy ledger does not address principals directly. It hashes the
//! principal and a subaccount into a 32-byte [`AccountIdentifier`]:
//!
//! ```text
//! h  = sha224( "\x0Aaccount-id" || principal || subaccount_or_32_zeros )
//! id = crc32_be(h) || h
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::config::{ACCOUNT_IDENTIFIER_LENGTH, MAX_PRINCIPAL_LENGTH, SUBACCOUNT_LENGTH};
use crate::crypto::hash::{crc32, sha224};

/// DER header of an Ed25519 `SubjectPublicKeyInfo`; the raw 32-byte key
/// follows it.
const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Type tag of a self-authenticating principal.
const SELF_AUTHENTICATING_TAG: u8 = 0x02;

/// Type tag of the anonymous principal.
const ANONYMOUS_TAG: u8 = 0x04;

/// Domain separator for account identifier hashing.
const ACCOUNT_DOMAIN_SEPARATOR: &[u8] = b"\x0Aaccount-id";

/// Errors from parsing principals or account identifiers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PrincipalError {
    #[error("principal is {0} bytes; at most 29 allowed")]
    TooLong(usize),

    #[error("invalid base32 character {0:?}")]
    InvalidCharacter(char),

    #[error("text is not valid base32")]
    InvalidBase32,

    #[error("text is too short to carry a checksum")]
    TooShort,

    #[error("checksum mismatch")]
    BadChecksum,

    #[error("text is not in canonical form; expected {expected}")]
    NotCanonical { expected: String },

    #[error("invalid account identifier: {0}")]
    InvalidAccountIdentifier(String),
}

// ---------------------------------------------------------------------------
// Base32 (RFC 4648, lower-case, no padding)
// ---------------------------------------------------------------------------

const BASE32: base32::Alphabet = base32::Alphabet::RFC4648 { padding: false };

fn base32_encode(data: &[u8]) -> String {
    base32::encode(BASE32, data).to_ascii_lowercase()
}

fn base32_decode(text: &str) -> Result<Vec<u8>, PrincipalError> {
    if let Some(bad) = text
        .chars()
        .find(|c| !matches!(c, 'a'..='z' | '2'..='7'))
    {
        return Err(PrincipalError::InvalidCharacter(bad));
    }
    base32::decode(BASE32, &text.to_ascii_uppercase()).ok_or(PrincipalError::InvalidBase32)
}

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// An opaque ledger identity of at most 29 bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Principal(Vec<u8>);

impl Principal {
    /// Wraps raw bytes, rejecting anything longer than 29 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        if bytes.len() > MAX_PRINCIPAL_LENGTH {
            return Err(PrincipalError::TooLong(bytes.len()));
        }
        Ok(Self(bytes.to_vec()))
    }

    /// The anonymous principal, `2vxsx-fae`.
    pub fn anonymous() -> Self {
        Self(vec![ANONYMOUS_TAG])
    }

    /// The management canister, `aaaaa-aa`.
    pub fn management_canister() -> Self {
        Self(Vec::new())
    }

    /// Derives the self-authenticating principal of an Ed25519 public key.
    pub fn self_authenticating(public_key: &[u8; 32]) -> Self {
        let mut der = Vec::with_capacity(ED25519_DER_PREFIX.len() + public_key.len());
        der.extend_from_slice(&ED25519_DER_PREFIX);
        der.extend_from_slice(public_key);

        let mut bytes = sha224(&der).to_vec();
        bytes.push(SELF_AUTHENTICATING_TAG);
        Self(bytes)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == [ANONYMOUS_TAG]
    }

    /// Encodes the principal in its dashed, checksummed text form.
    pub fn to_text(&self) -> String {
        let mut payload = Vec::with_capacity(4 + self.0.len());
        payload.extend_from_slice(&crc32(&self.0).to_be_bytes());
        payload.extend_from_slice(&self.0);

        let encoded = base32_encode(&payload);
        let mut out = String::with_capacity(encoded.len() + encoded.len() / 5);
        for (i, c) in encoded.chars().enumerate() {
            if i > 0 && i % 5 == 0 {
                out.push('-');
            }
            out.push(c);
        }
        out
    }

    /// Parses the text form, verifying the checksum and canonical spelling.
    pub fn from_text(text: &str) -> Result<Self, PrincipalError> {
        let lowered = text.to_ascii_lowercase();
        let compact: String = lowered.chars().filter(|&c| c != '-').collect();
        let decoded = base32_decode(&compact)?;
        if decoded.len() < 4 {
            return Err(PrincipalError::TooShort);
        }

        let (checksum, bytes) = decoded.split_at(4);
        let principal = Self::from_slice(bytes)?;
        if checksum != crc32(bytes).to_be_bytes() {
            return Err(PrincipalError::BadChecksum);
        }

        let canonical = principal.to_text();
        if canonical != lowered {
            return Err(PrincipalError::NotCanonical { expected: canonical });
        }
        Ok(principal)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Principal({})", self.to_text())
    }
}

impl FromStr for Principal {
    type Err = PrincipalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_text(s)
    }
}

impl Serialize for Principal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_text())
    }
}

impl<'de> Deserialize<'de> for Principal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_text(&text).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Account Identifier
// ---------------------------------------------------------------------------

/// A legacy ledger address: `crc32_be(h) || h`, 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountIdentifier([u8; ACCOUNT_IDENTIFIER_LENGTH]);

impl AccountIdentifier {
    /// Hashes `owner` and `subaccount` (32 zero bytes when absent).
    pub fn new(owner: &Principal, subaccount: Option<&[u8; SUBACCOUNT_LENGTH]>) -> Self {
        let zero = [0u8; SUBACCOUNT_LENGTH];
        let mut preimage = Vec::with_capacity(ACCOUNT_DOMAIN_SEPARATOR.len() + 29 + 32);
        preimage.extend_from_slice(ACCOUNT_DOMAIN_SEPARATOR);
        preimage.extend_from_slice(owner.as_slice());
        preimage.extend_from_slice(subaccount.unwrap_or(&zero));

        let hash = sha224(&preimage);
        let mut out = [0u8; ACCOUNT_IDENTIFIER_LENGTH];
        out[..4].copy_from_slice(&crc32(&hash).to_be_bytes());
        out[4..].copy_from_slice(&hash);
        Self(out)
    }

    /// Accepts exactly 32 bytes with a valid checksum prefix.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrincipalError> {
        let array: [u8; ACCOUNT_IDENTIFIER_LENGTH] = bytes.try_into().map_err(|_| {
            PrincipalError::InvalidAccountIdentifier(format!(
                "expected {} bytes, got {}",
                ACCOUNT_IDENTIFIER_LENGTH,
                bytes.len()
            ))
        })?;
        if array[..4] != crc32(&array[4..]).to_be_bytes() {
            return Err(PrincipalError::BadChecksum);
        }
        Ok(Self(array))
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(text: &str) -> Result<Self, PrincipalError> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| PrincipalError::InvalidAccountIdentifier(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; ACCOUNT_IDENTIFIER_LENGTH] {
        &self.0
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for AccountIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AccountIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_hex(&text).map_err(serde::de::Error::custom)
    }
}

impl fmt::Debug for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountIdentifier({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_principals() {
        assert_eq!(Principal::anonymous().to_text(), "2vxsx-fae");
        assert_eq!(Principal::management_canister().to_text(), "aaaaa-aa");

        let ledger = Principal::from_slice(&[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]).unwrap();
        assert_eq!(ledger.to_text(), "ryjl3-tyaaa-aaaaa-aaaba-cai");
    }

    #[test]
    fn test_text_roundtrip() {
        let parsed = Principal::from_text("ryjl3-tyaaa-aaaaa-aaaba-cai").unwrap();
        assert_eq!(parsed.as_slice(), &[0, 0, 0, 0, 0, 0, 0, 2, 1, 1]);
        assert_eq!("2vxsx-fae".parse::<Principal>().unwrap(), Principal::anonymous());
        assert!(Principal::from_text("2VXSX-FAE").unwrap().is_anonymous());
    }

    #[test]
    fn test_bad_checksum_rejected() {
        assert_eq!(
            Principal::from_text("2vxsx-fbe"),
            Err(PrincipalError::BadChecksum)
        );
    }

    #[test]
    fn test_non_canonical_rejected() {
        assert!(matches!(
            Principal::from_text("2vxsxfae"),
            Err(PrincipalError::NotCanonical { .. })
        ));
        assert!(matches!(
            Principal::from_text("2vxsx-fa!"),
            Err(PrincipalError::InvalidCharacter('!'))
        ));
    }

    #[test]
    fn test_base32_alphabet() {
        assert_eq!(base32_encode(&[0xff, 0x00]), "74aa");
        assert_eq!(base32_decode("74aa").unwrap(), vec![0xff, 0x00]);
        assert_eq!(base32_decode("ab1c"), Err(PrincipalError::InvalidCharacter('1')));
        assert_eq!(base32_decode("A"), Err(PrincipalError::InvalidCharacter('A')));

        let long = Principal::from_slice(&[0xa5; 29]).unwrap();
        assert_eq!(Principal::from_text(&long.to_text()).unwrap(), long);
    }

    #[test]
    fn test_length_limit() {
        assert!(Principal::from_slice(&[0u8; 29]).is_ok());
        assert_eq!(
            Principal::from_slice(&[0u8; 30]),
            Err(PrincipalError::TooLong(30))
        );
    }

    #[test]
    fn test_self_authenticating_shape() {
        let principal = Principal::self_authenticating(&[7u8; 32]);
        assert_eq!(principal.as_slice().len(), 29);
        assert_eq!(principal.as_slice()[28], 0x02);
        assert_eq!(Principal::from_text(&principal.to_text()).unwrap(), principal);
    }

    #[test]
    fn test_account_identifier_vector() {
        let id = AccountIdentifier::new(&Principal::anonymous(), None);
        assert_eq!(
            id.to_hex(),
            "1c7a48ba6a562aa9eaa2481a9049cdf0433b9738c992d698c31d8abf89cadc79"
        );
        assert_eq!(AccountIdentifier::from_hex(&id.to_hex()).unwrap(), id);

        // Explicit zero subaccount hashes the same as none.
        assert_eq!(AccountIdentifier::new(&Principal::anonymous(), Some(&[0u8; 32])), id);
    }

    #[test]
    fn test_account_identifier_checksum_enforced() {
        let mut bytes = *AccountIdentifier::new(&Principal::anonymous(), None).as_bytes();
        bytes[31] ^= 1;
        assert_eq!(
            AccountIdentifier::from_slice(&bytes),
            Err(PrincipalError::BadChecksum)
        );
        assert!(AccountIdentifier::from_slice(&bytes[..31]).is_err());
    }

    #[test]
    fn test_serde_as_text() {
        let json = serde_json::to_string(&Principal::anonymous()).unwrap();
        assert_eq!(json, "\"2vxsx-fae\"");
        let back: Principal = serde_json::from_str(&json).unwrap();
        assert!(back.is_anonymous());
    }
}
