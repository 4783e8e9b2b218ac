//! # Ledger Errors
//!
//! Transfers answer with a tagged result. The `Err` side is a variant whose
//! *case name* is the information the caller needs (`InsufficientFunds`,
//! `BadFee`, ...), optionally with a payload. [`LedgerErrorKind::decode`]
//! turns that variant into a Rust enum once, here, for both the ICRC1 and
//! the legacy transfer.
//!
//! ICRC1 cases: `BadFee`, `BadBurn`, `InsufficientFunds`, `TooOld`,
//! `CreatedInFuture`, `Duplicate`, `TemporarilyUnavailable`, `GenericError`.
//! The legacy ledger adds `TxTooOld`, `TxCreatedInFuture` and `TxDuplicate`,
//! and wraps its amounts in `{e8s}` records, which decode the same way.
//!
//! Cases this client has never heard of are kept as [`LedgerErrorKind::Other`]
//! with their name intact, so the caller still sees the discriminant.

use thiserror::Error;

use super::amount::TokenAmount;
use super::transport::TransportError;
use super::wire::{DecodeError, WireValue};

/// A decoded ledger rejection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerErrorKind {
    BadFee { expected_fee: TokenAmount },
    BadBurn { min_burn_amount: TokenAmount },
    InsufficientFunds { balance: TokenAmount },
    TooOld,
    CreatedInFuture { ledger_time: Option<TokenAmount> },
    Duplicate { duplicate_of: TokenAmount },
    TemporarilyUnavailable,
    GenericError { error_code: TokenAmount, message: String },
    TxTooOld { allowed_window_nanos: TokenAmount },
    TxCreatedInFuture,
    TxDuplicate { duplicate_of: TokenAmount },
    /// A case not modelled above.
    Other { name: String, payload: WireValue },
}

impl LedgerErrorKind {
    /// The variant's case name, exactly as the ledger spelled it.
    pub fn name(&self) -> &str {
        match self {
            Self::BadFee { .. } => "BadFee",
            Self::BadBurn { .. } => "BadBurn",
            Self::InsufficientFunds { .. } => "InsufficientFunds",
            Self::TooOld => "TooOld",
            Self::CreatedInFuture { .. } => "CreatedInFuture",
            Self::Duplicate { .. } => "Duplicate",
            Self::TemporarilyUnavailable => "TemporarilyUnavailable",
            Self::GenericError { .. } => "GenericError",
            Self::TxTooOld { .. } => "TxTooOld",
            Self::TxCreatedInFuture => "TxCreatedInFuture",
            Self::TxDuplicate { .. } => "TxDuplicate",
            Self::Other { name, .. } => name,
        }
    }

    /// Decodes an error variant. A known case with an unexpected payload
    /// falls back to `Other` rather than failing; the name is what matters.
    pub fn decode(variant: &WireValue) -> Result<Self, DecodeError> {
        let (name, payload) = variant.as_variant()?;
        let amount = |field: &str| payload.field(field).and_then(WireValue::to_amount);

        let known = match name {
            "BadFee" => amount("expected_fee").map(|expected_fee| Self::BadFee { expected_fee }),
            "BadBurn" => {
                amount("min_burn_amount").map(|min_burn_amount| Self::BadBurn { min_burn_amount })
            }
            "InsufficientFunds" => {
                amount("balance").map(|balance| Self::InsufficientFunds { balance })
            }
            "TooOld" => Ok(Self::TooOld),
            "CreatedInFuture" => Ok(Self::CreatedInFuture {
                ledger_time: amount("ledger_time").ok(),
            }),
            "Duplicate" => amount("duplicate_of").map(|duplicate_of| Self::Duplicate { duplicate_of }),
            "TemporarilyUnavailable" => Ok(Self::TemporarilyUnavailable),
            "GenericError" => amount("error_code").and_then(|error_code| {
                let message = payload.field("message")?.as_text()?.to_string();
                Ok(Self::GenericError { error_code, message })
            }),
            "TxTooOld" => amount("allowed_window_nanos")
                .map(|allowed_window_nanos| Self::TxTooOld { allowed_window_nanos }),
            "TxCreatedInFuture" => Ok(Self::TxCreatedInFuture),
            "TxDuplicate" => {
                amount("duplicate_of").map(|duplicate_of| Self::TxDuplicate { duplicate_of })
            }
            _ => Err(DecodeError::UnexpectedVariant(name.to_string())),
        };

        Ok(known.unwrap_or_else(|_| Self::Other {
            name: name.to_string(),
            payload: payload.clone(),
        }))
    }
}

/// A transfer the ledger rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{canister_id}.{method} rejected: {}", .kind.name())]
pub struct LedgerError {
    pub canister_id: String,
    pub method: String,
    pub kind: LedgerErrorKind,
}

impl LedgerError {
    /// The variant case name, e.g. `"InsufficientFunds"`.
    pub fn discriminant(&self) -> &str {
        self.kind.name()
    }
}

/// Everything a ledger client call can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The ledger answered with an error variant.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The call never produced a ledger answer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The answer did not have the expected shape.
    #[error("{method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: DecodeError,
    },

    /// The request cannot be expressed in the target protocol. Nothing was
    /// sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn decode(method: &str, source: DecodeError) -> Self {
        Self::Decode {
            method: method.to_string(),
            source,
        }
    }

    /// The ledger's case name, if this is a ledger rejection.
    pub fn ledger_discriminant(&self) -> Option<&str> {
        match self {
            Self::Ledger(e) => Some(e.discriminant()),
            _ => None,
        }
    }
}
