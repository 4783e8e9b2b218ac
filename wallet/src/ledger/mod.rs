//! # Ledger
//!
//! Everything between the wallet and a token ledger canister:
//!
//! - [`amount`]: arbitrary-precision token amounts and their display.
//! - [`wire`]: the typed value model requests and replies travel in.
//! - [`types`]: accounts, subaccounts, transfer requests, token info.
//! - [`transport`]: the async seam to the network.
//! - [`error`]: ledger rejections decoded into a Rust enum.
//! - [`client`]: the ICRC1 and legacy calls themselves.

pub mod amount;
pub mod client;
pub mod error;
pub mod transport;
pub mod types;
pub mod wire;

pub use amount::{AmountError, TokenAmount};
pub use client::LedgerClient;
pub use error::{ClientError, LedgerError, LedgerErrorKind};
pub use transport::{LedgerTransport, TransportError};
pub use types::{
    Account, Memo, MetadataValue, Subaccount, SubaccountLengthError, TokenInfo, TransferRequest,
    TransferTarget,
};
pub use wire::{DecodeError, WireValue};
