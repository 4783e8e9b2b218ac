//! # Prices
//!
//! Where prices come from is not this crate's concern. A [`PriceSource`]
//! answers "what are these tokens worth" for a batch of token unique ids
//! (`"ic#<canister_id>"`) and returns decimal strings. Everything here stays
//! in integer arithmetic: a price of `"12.345"` is the mantissa `12345` at
//! scale 3.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::ledger::amount::{format_scaled, parse_decimal};
use crate::ledger::{TokenAmount, TransportError};

/// One token's price, as the feed reported it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPriceSample {
    /// USD price, decimal string.
    pub price: String,
    /// Percentage change over 24 hours, decimal string, may be negative.
    pub price_change_24h: String,
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Looks up prices for `unique_ids`. Ids the source does not know are
    /// simply absent from the result.
    async fn prices(
        &self,
        unique_ids: &[String],
    ) -> Result<HashMap<String, TokenPriceSample>, TransportError>;
}

/// A price source backed by a map the caller fills in. Used by the CLI
/// when no feed is configured, and by tests.
#[derive(Debug, Default)]
pub struct StaticPriceSource {
    samples: RwLock<HashMap<String, TokenPriceSample>>,
}

impl StaticPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, unique_id: impl Into<String>, sample: TokenPriceSample) {
        self.samples.write().insert(unique_id.into(), sample);
    }
}

#[async_trait]
impl PriceSource for StaticPriceSource {
    async fn prices(
        &self,
        unique_ids: &[String],
    ) -> Result<HashMap<String, TokenPriceSample>, TransportError> {
        let samples = self.samples.read();
        Ok(unique_ids
            .iter()
            .filter_map(|id| samples.get(id).map(|s| (id.clone(), s.clone())))
            .collect())
    }
}

/// USD value of `balance` base units at `price` per whole token, rounded
/// half-up to cents. `None` if the price is not an unsigned decimal.
pub fn usd_value(balance: &TokenAmount, decimals: u8, price: &str) -> Option<String> {
    let (mantissa, scale) = parse_decimal(price.trim())?;
    let product = balance.as_biguint() * mantissa;
    Some(format_scaled(&product, decimals as u32 + scale, 2))
}

/// Formats a 24h change for display: `"+1.25%"`, `"-0.50%"`, `"0.00%"`.
/// `None` if the input is not a decimal.
pub fn format_price_change(change: &str) -> Option<String> {
    let change = change.trim();
    let (negative, magnitude) = match change.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, change.strip_prefix('+').unwrap_or(change)),
    };
    let (mantissa, scale) = parse_decimal(magnitude)?;
    let formatted = format_scaled(&mantissa, scale, 2);
    let sign = if formatted == "0.00" {
        ""
    } else if negative {
        "-"
    } else {
        "+"
    };
    Some(format!("{}{}%", sign, formatted))
}
