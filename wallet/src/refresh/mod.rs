//! # Refresh
//!
//! Live numbers for the token views: a cancellable poll [`scheduler`], the
//! [`balance`] refresher built on it, the [`price`] feed seam, and a
//! [`token_info`] cache for facts that barely change.

pub mod balance;
pub mod price;
pub mod scheduler;
pub mod token_info;

pub use balance::{BalancePriceRefresher, RefreshError, RefreshSnapshot, SubscriptionHandle};
pub use price::{format_price_change, usd_value, PriceSource, StaticPriceSource, TokenPriceSample};
pub use scheduler::{PollHandle, StopSignal, Tick};
pub use token_info::TokenInfoCache;
