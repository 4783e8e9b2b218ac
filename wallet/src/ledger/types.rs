//! Request and response types of the ledger client.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::amount::TokenAmount;
use crate::config::SUBACCOUNT_LENGTH;
use crate::identity::{AccountIdentifier, Principal};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("subaccount must be 32 bytes, got {0}")]
pub struct SubaccountLengthError(pub usize);

/// A 32-byte subaccount.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subaccount(pub [u8; SUBACCOUNT_LENGTH]);

impl Subaccount {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SubaccountLengthError> {
        bytes
            .try_into()
            .map(Self)
            .map_err(|_| SubaccountLengthError(bytes.len()))
    }

    /// Subaccount `n`: big-endian `n` in the last eight bytes.
    pub fn from_index(n: u64) -> Self {
        let mut bytes = [0u8; SUBACCOUNT_LENGTH];
        bytes[SUBACCOUNT_LENGTH - 8..].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SUBACCOUNT_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for Subaccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Subaccount({})", hex::encode(self.0))
    }
}

/// An ICRC1 account: an owner and an optional subaccount.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Account {
    pub owner: Principal,
    pub subaccount: Option<Subaccount>,
}

impl Account {
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            subaccount: None,
        }
    }

    pub fn with_subaccount(owner: Principal, subaccount: Subaccount) -> Self {
        Self {
            owner,
            subaccount: Some(subaccount),
        }
    }

    /// The legacy ledger address of this account.
    pub fn account_identifier(&self) -> AccountIdentifier {
        AccountIdentifier::new(&self.owner, self.subaccount.as_ref().map(|s| s.as_bytes()))
    }
}

/// Where a transfer goes. The target also decides the protocol: an
/// [`Account`] goes through `icrc1_transfer`, an address through the
/// legacy `transfer`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferTarget {
    Account(Account),
    Address(AccountIdentifier),
}

/// Transfer memo. ICRC1 ledgers take bytes, the legacy ledger a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Memo {
    Bytes(Vec<u8>),
    Number(TokenAmount),
}

/// A transfer. Every `Option` stays absent on the wire when `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_subaccount: Option<Subaccount>,
    pub to: TransferTarget,
    pub amount: TokenAmount,
    pub fee: Option<TokenAmount>,
    pub memo: Option<Memo>,
    /// Nanoseconds since the Unix epoch.
    pub created_at_time: Option<TokenAmount>,
}

impl TransferRequest {
    /// A request with only the mandatory fields set.
    pub fn new(to: TransferTarget, amount: TokenAmount) -> Self {
        Self {
            from_subaccount: None,
            to,
            amount,
            fee: None,
            memo: None,
            created_at_time: None,
        }
    }
}

/// Static token facts, fetched once and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub fee: TokenAmount,
}

/// A value from `icrc1_metadata`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetadataValue {
    Nat(TokenAmount),
    Text(String),
    Blob(Vec<u8>),
    /// A case this client does not model, kept by name.
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subaccount_from_index() {
        let sub = Subaccount::from_index(1);
        assert_eq!(sub.0[31], 1);
        assert!(sub.0[..31].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_subaccount_length_checked() {
        assert_eq!(Subaccount::from_slice(&[0u8; 31]), Err(SubaccountLengthError(31)));
        assert!(Subaccount::from_slice(&[0u8; 32]).is_ok());
    }

    #[test]
    fn test_default_subaccount_address() {
        let account = Account::new(Principal::anonymous());
        assert_eq!(
            account.account_identifier().to_hex(),
            "1c7a48ba6a562aa9eaa2481a9049cdf0433b9738c992d698c31d8abf89cadc79"
        );
    }
}
