//! # Ledger Protocol Client
//!
//! Typed calls against a token ledger, over any [`LedgerTransport`].
//!
//! Two protocol families are supported behind one interface:
//!
//! - **ICRC1**: `icrc1_name`, `icrc1_symbol`, `icrc1_decimals`,
//!   `icrc1_fee`, `icrc1_balance_of`, `icrc1_transfer`, `icrc1_metadata`.
//! - **Legacy**: the older single-token ledger's `transfer`, which
//!   addresses accounts by [`AccountIdentifier`] and counts in `{e8s}`.
//!
//! [`LedgerClient::transfer`] picks the protocol from the request's target.
//!
//! ## Rules the encoder never breaks
//!
//! 1. Optional fields are `opt` some when present and `opt` none when
//!    absent. No zero fees, no empty memos, no all-zero subaccounts.
//! 2. Amounts cross as `nat` or `nat64`, converted from [`TokenAmount`]
//!    with checked arithmetic. If a value does not fit in a `nat64` the
//!    request is refused before it is sent.
//! 3. The legacy ledger has no optional fee or memo. The caller must supply
//!    both; the client will not invent defaults.
//!
//! ## Results
//!
//! Both transfer entry points end in [`unwrap_transfer_result`], which turns
//! `variant { Ok; Err }` into `Ok(block index)` or a [`LedgerError`]
//! carrying the error case's name, and logs rejections with the canister
//! id and the offending request.
//!
//! [`AccountIdentifier`]: crate::identity::AccountIdentifier

use std::sync::Arc;

use tracing::{debug, error};

use super::amount::TokenAmount;
use super::error::{ClientError, LedgerError, LedgerErrorKind};
use super::transport::LedgerTransport;
use super::types::{Account, Memo, MetadataValue, TokenInfo, TransferRequest, TransferTarget};
use super::wire::{DecodeError, WireValue};
use crate::config::METADATA_LOGO_KEY;
use crate::identity::AccountIdentifier;

const ICRC1_NAME: &str = "icrc1_name";
const ICRC1_SYMBOL: &str = "icrc1_symbol";
const ICRC1_DECIMALS: &str = "icrc1_decimals";
const ICRC1_FEE: &str = "icrc1_fee";
const ICRC1_BALANCE_OF: &str = "icrc1_balance_of";
const ICRC1_TRANSFER: &str = "icrc1_transfer";
const ICRC1_METADATA: &str = "icrc1_metadata";
const LEGACY_TRANSFER: &str = "transfer";

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn encode_account(account: &Account) -> WireValue {
    WireValue::record([
        ("owner", WireValue::Principal(account.owner.clone())),
        (
            "subaccount",
            WireValue::wrap_option(account.subaccount, |s| WireValue::Blob(s.0.to_vec())),
        ),
    ])
}

fn nat64(field: &str, amount: &TokenAmount) -> Result<WireValue, ClientError> {
    amount
        .to_u64()
        .map(WireValue::Nat64)
        .map_err(|e| ClientError::InvalidRequest(format!("{}: {}", field, e)))
}

fn e8s(field: &str, amount: &TokenAmount) -> Result<WireValue, ClientError> {
    Ok(WireValue::record([("e8s", nat64(field, amount)?)]))
}

fn encode_icrc1_transfer(request: &TransferRequest, to: &Account) -> Result<WireValue, ClientError> {
    let memo = match &request.memo {
        None => None,
        Some(Memo::Bytes(bytes)) => Some(bytes.clone()),
        Some(Memo::Number(_)) => {
            return Err(ClientError::InvalidRequest(
                "icrc1_transfer takes a byte memo".into(),
            ))
        }
    };
    let created_at_time = request
        .created_at_time
        .as_ref()
        .map(|t| nat64("created_at_time", t))
        .transpose()?;

    Ok(WireValue::record([
        (
            "from_subaccount",
            WireValue::wrap_option(request.from_subaccount, |s| WireValue::Blob(s.0.to_vec())),
        ),
        ("to", encode_account(to)),
        ("amount", WireValue::Nat(request.amount.clone())),
        ("fee", WireValue::wrap_option(request.fee.clone(), WireValue::Nat)),
        ("memo", WireValue::wrap_option(memo, WireValue::Blob)),
        ("created_at_time", WireValue::wrap_option(created_at_time, |t| t)),
    ]))
}

fn encode_legacy_transfer(
    request: &TransferRequest,
    to: &AccountIdentifier,
) -> Result<WireValue, ClientError> {
    let fee = request.fee.as_ref().ok_or_else(|| {
        ClientError::InvalidRequest("legacy transfer requires an explicit fee".into())
    })?;
    let memo = match &request.memo {
        Some(Memo::Number(n)) => nat64("memo", n)?,
        Some(Memo::Bytes(_)) => {
            return Err(ClientError::InvalidRequest(
                "legacy transfer takes a numeric memo".into(),
            ))
        }
        None => {
            return Err(ClientError::InvalidRequest(
                "legacy transfer requires an explicit memo".into(),
            ))
        }
    };
    let created_at_time = request
        .created_at_time
        .as_ref()
        .map(|t| nat64("created_at_time", t))
        .transpose()?;

    Ok(WireValue::record([
        (
            "from_subaccount",
            WireValue::wrap_option(request.from_subaccount, |s| WireValue::Blob(s.0.to_vec())),
        ),
        ("to", WireValue::Blob(to.as_bytes().to_vec())),
        ("amount", e8s("amount", &request.amount)?),
        ("fee", e8s("fee", fee)?),
        ("memo", memo),
        (
            "created_at_time",
            WireValue::wrap_option(created_at_time, |t| {
                WireValue::record([("timestamp_nanos", t)])
            }),
        ),
    ]))
}

/// Decodes `variant { Ok : nat; Err : E }`. Shared by both transfer calls.
fn unwrap_transfer_result(
    canister_id: &str,
    method: &str,
    reply: &WireValue,
    request: &TransferRequest,
) -> Result<TokenAmount, ClientError> {
    let decode = |e| ClientError::decode(method, e);
    let (tag, payload) = reply.as_variant().map_err(decode)?;
    match tag {
        "Ok" => payload.to_amount().map_err(decode),
        "Err" => {
            let kind = LedgerErrorKind::decode(payload).map_err(decode)?;
            error!(
                canister_id,
                method,
                error = kind.name(),
                request = ?request,
                "ledger rejected transfer"
            );
            Err(LedgerError {
                canister_id: canister_id.to_string(),
                method: method.to_string(),
                kind,
            }
            .into())
        }
        other => Err(decode(DecodeError::UnexpectedVariant(other.to_string()))),
    }
}

fn decode_metadata_value(value: &WireValue) -> Result<MetadataValue, DecodeError> {
    let (tag, payload) = value.as_variant()?;
    Ok(match tag {
        "Nat" => MetadataValue::Nat(payload.to_amount()?),
        "Text" => MetadataValue::Text(payload.as_text()?.to_string()),
        "Blob" => MetadataValue::Blob(payload.as_blob()?.to_vec()),
        other => MetadataValue::Other(other.to_string()),
    })
}

// ---------------------------------------------------------------------------
// LedgerClient
// ---------------------------------------------------------------------------

/// Typed ledger calls over a shared transport. Cheap to clone.
#[derive(Clone)]
pub struct LedgerClient {
    transport: Arc<dyn LedgerTransport>,
}

impl LedgerClient {
    pub fn new(transport: Arc<dyn LedgerTransport>) -> Self {
        Self { transport }
    }

    async fn query(
        &self,
        canister_id: &str,
        method: &str,
        arg: WireValue,
    ) -> Result<WireValue, ClientError> {
        debug!(canister_id, method, "ledger query");
        Ok(self.transport.query(canister_id, method, arg).await?)
    }

    pub async fn name(&self, canister_id: &str) -> Result<String, ClientError> {
        let reply = self.query(canister_id, ICRC1_NAME, WireValue::Null).await?;
        reply
            .as_text()
            .map(str::to_string)
            .map_err(|e| ClientError::decode(ICRC1_NAME, e))
    }

    pub async fn symbol(&self, canister_id: &str) -> Result<String, ClientError> {
        let reply = self.query(canister_id, ICRC1_SYMBOL, WireValue::Null).await?;
        reply
            .as_text()
            .map(str::to_string)
            .map_err(|e| ClientError::decode(ICRC1_SYMBOL, e))
    }

    pub async fn decimals(&self, canister_id: &str) -> Result<u8, ClientError> {
        let reply = self.query(canister_id, ICRC1_DECIMALS, WireValue::Null).await?;
        reply
            .to_nat8()
            .map_err(|e| ClientError::decode(ICRC1_DECIMALS, e))
    }

    pub async fn fee(&self, canister_id: &str) -> Result<TokenAmount, ClientError> {
        let reply = self.query(canister_id, ICRC1_FEE, WireValue::Null).await?;
        reply
            .to_amount()
            .map_err(|e| ClientError::decode(ICRC1_FEE, e))
    }

    /// Name, symbol, decimals and fee, fetched concurrently.
    pub async fn token_info(&self, canister_id: &str) -> Result<TokenInfo, ClientError> {
        let (name, symbol, decimals, fee) = tokio::try_join!(
            self.name(canister_id),
            self.symbol(canister_id),
            self.decimals(canister_id),
            self.fee(canister_id),
        )?;
        Ok(TokenInfo {
            name,
            symbol,
            decimals,
            fee,
        })
    }

    pub async fn balance_of(
        &self,
        canister_id: &str,
        account: &Account,
    ) -> Result<TokenAmount, ClientError> {
        let reply = self
            .query(canister_id, ICRC1_BALANCE_OF, encode_account(account))
            .await?;
        reply
            .to_amount()
            .map_err(|e| ClientError::decode(ICRC1_BALANCE_OF, e))
    }

    /// Sends a transfer through the protocol its target calls for and
    /// returns the resulting block index.
    pub async fn transfer(
        &self,
        canister_id: &str,
        request: &TransferRequest,
    ) -> Result<TokenAmount, ClientError> {
        match &request.to {
            TransferTarget::Account(_) => self.icrc1_transfer(canister_id, request).await,
            TransferTarget::Address(_) => self.legacy_transfer(canister_id, request).await,
        }
    }

    /// `icrc1_transfer`. The target must be an account.
    pub async fn icrc1_transfer(
        &self,
        canister_id: &str,
        request: &TransferRequest,
    ) -> Result<TokenAmount, ClientError> {
        let TransferTarget::Account(to) = &request.to else {
            return Err(ClientError::InvalidRequest(
                "icrc1_transfer needs an account target".into(),
            ));
        };
        let arg = encode_icrc1_transfer(request, to)?;
        self.submit(canister_id, ICRC1_TRANSFER, arg, request).await
    }

    /// Legacy `transfer`. The target must be an account identifier, and
    /// the fee and memo must be set.
    pub async fn legacy_transfer(
        &self,
        canister_id: &str,
        request: &TransferRequest,
    ) -> Result<TokenAmount, ClientError> {
        let TransferTarget::Address(to) = &request.to else {
            return Err(ClientError::InvalidRequest(
                "legacy transfer needs an account identifier target".into(),
            ));
        };
        let arg = encode_legacy_transfer(request, to)?;
        self.submit(canister_id, LEGACY_TRANSFER, arg, request).await
    }

    async fn submit(
        &self,
        canister_id: &str,
        method: &str,
        arg: WireValue,
        request: &TransferRequest,
    ) -> Result<TokenAmount, ClientError> {
        debug!(canister_id, method, "ledger update");
        let reply = self.transport.update(canister_id, method, arg).await?;
        let block = unwrap_transfer_result(canister_id, method, &reply, request)?;
        debug!(canister_id, method, block = %block, "transfer accepted");
        Ok(block)
    }

    /// `icrc1_metadata` as ordered `(key, value)` pairs. Each entry is a
    /// two-field tuple record (`"0"` key, `"1"` value).
    pub async fn metadata(
        &self,
        canister_id: &str,
    ) -> Result<Vec<(String, MetadataValue)>, ClientError> {
        let reply = self.query(canister_id, ICRC1_METADATA, WireValue::Null).await?;
        let decode = |e| ClientError::decode(ICRC1_METADATA, e);
        reply
            .as_vec()
            .map_err(decode)?
            .iter()
            .map(|entry| {
                let key = entry.field("0")?.as_text()?.to_string();
                let value = decode_metadata_value(entry.field("1")?)?;
                Ok((key, value))
            })
            .collect::<Result<Vec<_>, DecodeError>>()
            .map_err(decode)
    }

    /// The token logo, if the ledger publishes a text `icrc1:logo` entry.
    pub async fn logo(&self, canister_id: &str) -> Result<Option<String>, ClientError> {
        let metadata = self.metadata(canister_id).await?;
        Ok(metadata.into_iter().find_map(|(key, value)| match value {
            MetadataValue::Text(logo) if key == METADATA_LOGO_KEY => Some(logo),
            _ => None,
        }))
    }
}
