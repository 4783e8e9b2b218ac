//! # Ledger Transport
//!
//! The seam between the typed client and whatever actually reaches the
//! ledger: an HTTP agent, a local replica, or a scripted fake in tests.
//! Implementations take a method name and a [`WireValue`] argument and
//! hand back the decoded [`WireValue`] reply.
//!
//! `query` is a read that does not go through consensus; `update` is a
//! state-changing call (transfers). A transport that cannot tell the
//! difference may treat both the same.

use async_trait::async_trait;
use thiserror::Error;

use super::wire::WireValue;

/// Failure below the protocol layer. Unlike a ledger error, the call may
/// succeed if simply tried again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The endpoint could not be reached.
    #[error("ledger unreachable: {0}")]
    Unavailable(String),

    #[error("call timed out")]
    Timeout,

    /// The platform refused the call before the ledger saw it.
    #[error("call rejected (code {code}): {message}")]
    Rejected { code: u32, message: String },

    /// The reply could not be decoded into a wire value at all.
    #[error("malformed reply: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait LedgerTransport: Send + Sync {
    async fn query(
        &self,
        canister_id: &str,
        method: &str,
        arg: WireValue,
    ) -> Result<WireValue, TransportError>;

    async fn update(
        &self,
        canister_id: &str,
        method: &str,
        arg: WireValue,
    ) -> Result<WireValue, TransportError>;
}
