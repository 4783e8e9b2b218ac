//! # Token Amounts
//!
//! Ledger amounts are unbounded naturals. A balance of 10^30 base units is
//! unusual but legal, and anything above 2^53 would be silently mangled by
//! a float. So [`TokenAmount`] wraps a `BigUint`, crosses every boundary as
//! a decimal string, and never meets an `f64`.
//!
//! ## Wire forms
//!
//! - `nat`: unsigned LEB128, 7 bits per byte, least significant group
//!   first, high bit set on every byte but the last. `624485` is
//!   `e5 8e 26`.
//! - `nat64`: a plain `u64`. [`TokenAmount::to_u64`] is checked; an amount
//!   that does not fit is an error, never a truncation.
//!
//! ## Display
//!
//! Fixed-point rendering divides by `10^decimals` using integer arithmetic.
//! [`TokenAmount::to_display`] prints the exact value with no trailing
//! zeros (`500000000` at 8 decimals is `"5"`), and
//! [`TokenAmount::format_fixed`] rounds half-up to a fixed number of places
//! with thousands separators (`123456789012` at 8 decimals, 2 places, is
//! `"1,234.57"`).

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors from parsing or converting amounts.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("not a decimal natural number: {0:?}")]
    InvalidDecimal(String),

    #[error("amount {0} does not fit in 64 bits")]
    Overflow(String),

    #[error("truncated LEB128 encoding")]
    TruncatedLeb128,
}

/// An arbitrary-precision unsigned token amount.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(BigUint);

impl TokenAmount {
    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    pub fn from_biguint(value: BigUint) -> Self {
        Self(value)
    }

    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked conversion for `nat64` fields.
    pub fn to_u64(&self) -> Result<u64, AmountError> {
        self.0
            .to_u64()
            .ok_or_else(|| AmountError::Overflow(self.0.to_string()))
    }

    /// Unsigned LEB128 encoding.
    pub fn to_leb128(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut rest = self.0.clone();
        loop {
            let group = (&rest & BigUint::from(0x7fu8)).to_u8().unwrap_or(0);
            rest >>= 7;
            if rest.is_zero() {
                out.push(group);
                return out;
            }
            out.push(group | 0x80);
        }
    }

    /// Decodes a LEB128 prefix of `bytes`, returning the amount and the
    /// number of bytes consumed.
    pub fn from_leb128(bytes: &[u8]) -> Result<(Self, usize), AmountError> {
        let mut value = BigUint::zero();
        let mut shift = 0usize;
        for (i, &byte) in bytes.iter().enumerate() {
            value |= BigUint::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok((Self(value), i + 1));
            }
            shift += 7;
        }
        Err(AmountError::TruncatedLeb128)
    }

    /// Exact value divided by `10^decimals`, without trailing zeros.
    pub fn to_display(&self, decimals: u8) -> String {
        let scale = pow10(decimals as u32);
        let whole = &self.0 / &scale;
        let frac = &self.0 % &scale;
        if frac.is_zero() {
            return whole.to_string();
        }
        let digits = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
        format!("{}.{}", whole, digits.trim_end_matches('0'))
    }

    /// Value divided by `10^decimals`, rounded half-up to `places`
    /// fractional digits, with comma thousands separators.
    pub fn format_fixed(&self, decimals: u8, places: u32) -> String {
        format_scaled(&self.0, decimals as u32, places)
    }
}

pub(crate) fn pow10(exp: u32) -> BigUint {
    BigUint::from(10u8).pow(exp)
}

/// Renders `mantissa / 10^scale` rounded half-up to `places` digits with
/// grouped thousands.
pub(crate) fn format_scaled(mantissa: &BigUint, scale: u32, places: u32) -> String {
    let divisor = pow10(scale);
    let scaled = mantissa * pow10(places);
    let mut rounded = &scaled / &divisor;
    let remainder = &scaled % &divisor;
    if remainder * 2u8 >= divisor {
        rounded += 1u8;
    }

    let unit = pow10(places);
    let whole = group_thousands(&(&rounded / &unit).to_string());
    if places == 0 {
        return whole;
    }
    let frac = (&rounded % &unit).to_string();
    format!("{}.{:0>width$}", whole, frac, width = places as usize)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Parses an unsigned decimal such as `"12.3450"` into `(mantissa, scale)`.
pub(crate) fn parse_decimal(text: &str) -> Option<(BigUint, u32)> {
    let (whole, frac) = match text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (text, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let joined = format!("{}{}", whole, frac);
    let mantissa = BigUint::parse_bytes(joined.as_bytes(), 10).unwrap_or_default();
    Some((mantissa, frac.len() as u32))
}

impl FromStr for TokenAmount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidDecimal(s.to_string()));
        }
        BigUint::parse_bytes(s.as_bytes(), 10)
            .map(Self)
            .ok_or_else(|| AmountError::InvalidDecimal(s.to_string()))
    }
}

impl From<u64> for TokenAmount {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for TokenAmount {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenAmount({})", self.0)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
