//! # Wallet Configuration & Constants
//!
//! Every magic number the wallet core depends on lives here: derivation
//! paths, well-known ledger keys, refresh cadences, key sizes. If you find a
//! hardcoded constant somewhere else, move it here.
//!
//! The tunable subset is collected in [`WalletConfig`], which deserializes
//! from JSON so that an embedder (or the `fuse` CLI) can override defaults
//! without recompiling.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Chain tag for the Internet Computer. Used as the prefix of token unique
/// ids (`"ic#<canister_id>"`) when looking up prices.
pub const CHAIN_IC: &str = "ic";

/// Separator between chain tag and canister id in a token unique id.
pub const UNIQUE_ID_SEPARATOR: char = '#';

// ---------------------------------------------------------------------------
// Key Derivation
// ---------------------------------------------------------------------------

/// SLIP-0044 coin type registered for the Internet Computer.
pub const IC_COIN_TYPE: u32 = 223;

/// Hardened derivation prefix `m/44'/223'/0'/0'`. The per-account index is
/// appended as the final hardened component.
pub const DERIVATION_PREFIX: [u32; 4] = [44, IC_COIN_TYPE, 0, 0];

/// Word counts accepted for recovery phrases. 12 words = 128 bits of
/// entropy, 24 words = 256 bits. The in-between sizes BIP39 permits are
/// rejected because no wallet we interoperate with produces them.
pub const ALLOWED_MNEMONIC_WORD_COUNTS: [usize; 2] = [12, 24];

/// Length of a raw Ed25519 private key accepted by the private-key import.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// Display name given to the first account of a freshly restored wallet.
pub const FIRST_ACCOUNT_NAME: &str = "Account #1";

/// Default icon for new accounts.
pub const DEFAULT_ACCOUNT_ICON: &str = "😀";

// ---------------------------------------------------------------------------
// Password Policy
// ---------------------------------------------------------------------------

/// Minimum password length, in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length. Argon2 does not care, but nobody types 129
/// characters on purpose.
pub const MAX_PASSWORD_LENGTH: usize = 128;

// ---------------------------------------------------------------------------
// Encryption at Rest
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. Twelve. Always twelve.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Salt length for the password-derived bundle key.
pub const KDF_SALT_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Ledger Protocol
// ---------------------------------------------------------------------------

/// Fixed length of a ledger subaccount.
pub const SUBACCOUNT_LENGTH: usize = 32;

/// Fixed length of a legacy ledger account identifier (4-byte CRC + 28-byte hash).
pub const ACCOUNT_IDENTIFIER_LENGTH: usize = 32;

/// Maximum length of a principal, in bytes.
pub const MAX_PRINCIPAL_LENGTH: usize = 29;

/// Metadata key under which ICRC1 ledgers publish their logo.
pub const METADATA_LOGO_KEY: &str = "icrc1:logo";

/// Legacy ledger fixed-point scale: 1 token = 10^8 e8s.
pub const E8S_DECIMALS: u8 = 8;

// ---------------------------------------------------------------------------
// Refresh Cadence
// ---------------------------------------------------------------------------

/// Default balance polling interval in milliseconds.
pub const DEFAULT_BALANCE_REFRESH_MS: u64 = 5_000;

/// Default time-to-live for cached token metadata (name, symbol, decimals, fee).
pub const DEFAULT_TOKEN_INFO_TTL: Duration = Duration::from_secs(5 * 60);

// ---------------------------------------------------------------------------
// Tunables
// ---------------------------------------------------------------------------

/// Errors raised while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Argon2id cost parameters, shared by password hashing and bundle key
/// derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    /// Number of passes over memory.
    pub iterations: u32,
    /// Degree of parallelism.
    pub lanes: u32,
}

impl KdfConfig {
    /// OWASP's recommended Argon2id baseline (19 MiB, 2 passes, 1 lane).
    pub const fn interactive() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            lanes: 1,
        }
    }

    /// Minimal parameters for tests. Offers no brute-force resistance at all.
    pub const fn insecure_fast() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            lanes: 1,
        }
    }
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

/// Tunable wallet parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Balance polling interval, in milliseconds.
    pub balance_refresh_ms: u64,
    /// Token metadata cache lifetime, in seconds.
    pub token_info_ttl_secs: u64,
    /// Chain tag used to build price lookup ids.
    pub chain: String,
    /// Argon2id parameters.
    pub kdf: KdfConfig,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            balance_refresh_ms: DEFAULT_BALANCE_REFRESH_MS,
            token_info_ttl_secs: DEFAULT_TOKEN_INFO_TTL.as_secs(),
            chain: CHAIN_IC.to_string(),
            kdf: KdfConfig::default(),
        }
    }
}

impl WalletConfig {
    /// Loads a JSON config file. Missing fields fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would make the wallet misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.balance_refresh_ms == 0 {
            return Err(ConfigError::Invalid(
                "balance_refresh_ms must be positive".into(),
            ));
        }
        if self.chain.is_empty() || self.chain.contains(UNIQUE_ID_SEPARATOR) {
            return Err(ConfigError::Invalid(format!(
                "chain tag {:?} is empty or contains '{}'",
                self.chain, UNIQUE_ID_SEPARATOR
            )));
        }
        // argon2 requires at least 8 KiB of memory per lane.
        if self.kdf.lanes == 0 || self.kdf.iterations == 0 || self.kdf.memory_kib < 8 * self.kdf.lanes
        {
            return Err(ConfigError::Invalid(format!(
                "kdf parameters out of range: {:?}",
                self.kdf
            )));
        }
        Ok(())
    }

    /// Balance polling interval as a `Duration`.
    pub fn balance_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.balance_refresh_ms)
    }

    /// Token metadata cache lifetime as a `Duration`.
    pub fn token_info_ttl(&self) -> Duration {
        Duration::from_secs(self.token_info_ttl_secs)
    }
}

/// Builds the price lookup id for a token: `"<chain>#<canister_id>"`.
pub fn token_unique_id(chain: &str, canister_id: &str) -> String {
    format!("{}{}{}", chain, UNIQUE_ID_SEPARATOR, canister_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WalletConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.balance_refresh_interval(), Duration::from_millis(5_000));
        assert_eq!(config.token_info_ttl(), DEFAULT_TOKEN_INFO_TTL);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: WalletConfig = serde_json::from_str(r#"{"balance_refresh_ms": 1000}"#).unwrap();
        assert_eq!(config.balance_refresh_ms, 1000);
        assert_eq!(config.chain, CHAIN_IC);
        assert_eq!(config.kdf, KdfConfig::interactive());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = WalletConfig::default();
        config.balance_refresh_ms = 0;
        assert!(config.validate().is_err());

        let mut config = WalletConfig::default();
        config.chain = "ic#evil".into();
        assert!(config.validate().is_err());

        let mut config = WalletConfig::default();
        config.kdf.memory_kib = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unique_id_format() {
        assert_eq!(
            token_unique_id(CHAIN_IC, "ryjl3-tyaaa-aaaaa-aaaba-cai"),
            "ic#ryjl3-tyaaa-aaaaa-aaaba-cai"
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.json");
        std::fs::write(&path, r#"{"chain": "ic", "token_info_ttl_secs": 60}"#).unwrap();
        let config = WalletConfig::from_json_file(&path).unwrap();
        assert_eq!(config.token_info_ttl(), Duration::from_secs(60));
    }
}
