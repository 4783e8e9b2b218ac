//! Per-canister cache of static token facts (name, symbol, decimals, fee).
//!
//! These rarely change, so one fetch serves every view for the TTL. A
//! failed fetch is not cached; the next caller tries again.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::debug;

use crate::config::WalletConfig;
use crate::ledger::{ClientError, LedgerClient, TokenInfo};

struct CachedInfo {
    info: Arc<TokenInfo>,
    fetched_at: Instant,
}

pub struct TokenInfoCache {
    client: LedgerClient,
    ttl: Duration,
    entries: DashMap<String, CachedInfo>,
}

impl TokenInfoCache {
    pub fn new(client: LedgerClient, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            entries: DashMap::new(),
        }
    }

    /// A cache whose TTL is `config.token_info_ttl_secs`.
    pub fn from_config(client: LedgerClient, config: &WalletConfig) -> Self {
        Self::new(client, config.token_info_ttl())
    }

    /// Returns the cached info if younger than the TTL, else fetches it.
    pub async fn get(&self, canister_id: &str) -> Result<Arc<TokenInfo>, ClientError> {
        if let Some(entry) = self.entries.get(canister_id) {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.info));
            }
        }

        debug!(canister_id, "fetching token info");
        let info = Arc::new(self.client.token_info(canister_id).await?);
        self.entries.insert(
            canister_id.to_string(),
            CachedInfo {
                info: Arc::clone(&info),
                fetched_at: Instant::now(),
            },
        );
        Ok(info)
    }

    /// Drops the cached entry for `canister_id`, if any.
    pub fn invalidate(&self, canister_id: &str) {
        self.entries.remove(canister_id);
    }
}
