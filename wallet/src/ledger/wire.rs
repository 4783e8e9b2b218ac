//! # Wire Value Model
//!
//! The ledger speaks a typed, self-describing interface language. This
//! module does not implement its binary framing; that is the transport's
//! business. What it does provide is the *typed value model* the client
//! encodes requests into and decodes responses from:
//!
//! ```text
//! nat        arbitrary-precision natural (LEB128 on the wire)
//! nat8       u8
//! nat64      u64
//! text       UTF-8 string
//! blob       vec nat8
//! principal  ledger identity
//! opt T      present or absent
//! record     ordered named fields
//! variant    one named case with a payload
//! vec T      sequence
//! null       unit
//! ```
//!
//! ## The optional-field rule
//!
//! An absent optional is `Opt(None)`. Never zero, never an empty blob,
//! never a default. [`WireValue::wrap_option`] is the only way the client
//! builds optionals, so "wrap if present, none if absent" holds by
//! construction.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::amount::TokenAmount;
use crate::identity::Principal;

/// Errors from decoding a response into the shape the client expected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("record has no field {0:?}")]
    MissingField(String),

    #[error("unexpected variant {0:?}")]
    UnexpectedVariant(String),
}

/// A typed value as it crosses the ledger boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum WireValue {
    Nat(TokenAmount),
    Nat8(u8),
    Nat64(u64),
    Text(String),
    Blob(Vec<u8>),
    Principal(Principal),
    Opt(Option<Box<WireValue>>),
    Record(Vec<(String, WireValue)>),
    Variant(String, Box<WireValue>),
    Vec(Vec<WireValue>),
    Null,
}

impl WireValue {
    /// `Opt(Some(f(v)))` if `value` is present, `Opt(None)` otherwise.
    pub fn wrap_option<T>(value: Option<T>, f: impl FnOnce(T) -> WireValue) -> WireValue {
        WireValue::Opt(value.map(|v| Box::new(f(v))))
    }

    /// Builds a record from `(name, value)` pairs, keeping their order.
    pub fn record<I, K>(fields: I) -> WireValue
    where
        I: IntoIterator<Item = (K, WireValue)>,
        K: Into<String>,
    {
        WireValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn variant(name: impl Into<String>, payload: WireValue) -> WireValue {
        WireValue::Variant(name.into(), Box::new(payload))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            WireValue::Nat(_) => "nat",
            WireValue::Nat8(_) => "nat8",
            WireValue::Nat64(_) => "nat64",
            WireValue::Text(_) => "text",
            WireValue::Blob(_) => "blob",
            WireValue::Principal(_) => "principal",
            WireValue::Opt(_) => "opt",
            WireValue::Record(_) => "record",
            WireValue::Variant(..) => "variant",
            WireValue::Vec(_) => "vec",
            WireValue::Null => "null",
        }
    }

    fn mismatch(&self, expected: &'static str) -> DecodeError {
        DecodeError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    /// Looks up a record field by name.
    pub fn field(&self, name: &str) -> Result<&WireValue, DecodeError> {
        match self {
            WireValue::Record(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v)
                .ok_or_else(|| DecodeError::MissingField(name.to_string())),
            other => Err(other.mismatch("record")),
        }
    }

    /// Reads an amount. Accepts `nat`, `nat64`, and the legacy `{e8s}`
    /// record.
    pub fn to_amount(&self) -> Result<TokenAmount, DecodeError> {
        match self {
            WireValue::Nat(n) => Ok(n.clone()),
            WireValue::Nat64(n) => Ok(TokenAmount::from(*n)),
            WireValue::Record(_) => self.field("e8s")?.to_amount(),
            other => Err(other.mismatch("nat")),
        }
    }

    pub fn to_nat8(&self) -> Result<u8, DecodeError> {
        match self {
            WireValue::Nat8(n) => Ok(*n),
            other => Err(other.mismatch("nat8")),
        }
    }

    pub fn to_nat64(&self) -> Result<u64, DecodeError> {
        match self {
            WireValue::Nat64(n) => Ok(*n),
            other => Err(other.mismatch("nat64")),
        }
    }

    pub fn as_text(&self) -> Result<&str, DecodeError> {
        match self {
            WireValue::Text(s) => Ok(s),
            other => Err(other.mismatch("text")),
        }
    }

    pub fn as_blob(&self) -> Result<&[u8], DecodeError> {
        match self {
            WireValue::Blob(b) => Ok(b),
            other => Err(other.mismatch("blob")),
        }
    }

    pub fn as_vec(&self) -> Result<&[WireValue], DecodeError> {
        match self {
            WireValue::Vec(items) => Ok(items),
            other => Err(other.mismatch("vec")),
        }
    }

    /// Splits a variant into its case name and payload.
    pub fn as_variant(&self) -> Result<(&str, &WireValue), DecodeError> {
        match self {
            WireValue::Variant(name, payload) => Ok((name, payload)),
            other => Err(other.mismatch("variant")),
        }
    }
}
