//! # Hashing Utilities
//!
//! The ledger's addressing scheme is built from three functions:
//!
//! - **SHA-224**: self-authenticating principals and legacy account
//!   identifiers are both truncated-SHA-2 digests.
//! - **SHA-256**: general-purpose digest, used for key fingerprints.
//! - **CRC32 (IEEE 802.3)**: the 4-byte checksum prefixed to textual
//!   principals and account identifiers, so that a typo is caught before
//!   money moves. Computed from a 256-entry lookup table.

use sha2::{Digest, Sha224, Sha256};

/// Compute the SHA-224 digest of `data`.
pub fn sha224(data: &[u8]) -> [u8; 28] {
    let mut hasher = Sha224::new();
    hasher.update(data);
    let mut out = [0u8; 28];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Compute the SHA-256 digest of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Reflected CRC32 polynomial (IEEE 802.3).
const CRC32_POLY: u32 = 0xEDB8_8320;

const fn build_crc32_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ CRC32_POLY
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

static CRC32_TABLE: [u32; 256] = build_crc32_table();

/// Compute the CRC32 (IEEE) checksum of `data`.
///
/// Callers that embed the checksum in a wire format use big-endian byte
/// order (`crc32(data).to_be_bytes()`).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        let idx = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[idx];
    }
    !crc
}
