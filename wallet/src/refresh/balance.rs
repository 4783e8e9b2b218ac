//! # Balance & Price Refresh
//!
//! Token views want live balances and prices without each one running its
//! own timer. A [`BalancePriceRefresher`] owns the timers: one
//! [`scheduler`](super::scheduler) poll per `(owner, canister set)`, shared
//! by every subscription started with that key. Two views watching the same
//! balances therefore cost one round-trip per tick, not two.
//!
//! ## A round
//!
//! ```text
//!   tick ─┬─ balance_of(canister 1) ─┐
//!         ├─ balance_of(canister 2) ─┤
//!         ├─ ...                     ├─ all ok? ── publish RefreshSnapshot
//!         └─ prices("ic#<id>", ...) ─┘     │
//!                                          └─ any error? ── warn!, publish nothing
//! ```
//!
//! Every call in a round is issued concurrently, and the results are merged
//! only once all of them are in. Observers therefore never see canister A
//! from round 5 next to canister B from round 4. A failed round leaves the
//! previous snapshot in place; the next tick is the retry.
//!
//! After [`BalancePriceRefresher::stop`], a round that was already in flight
//! may still complete, but the stopped subscription never sees its result.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::try_join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::price::{PriceSource, TokenPriceSample};
use super::scheduler::{self, PollHandle};
use crate::config::{token_unique_id, WalletConfig, DEFAULT_BALANCE_REFRESH_MS};
use crate::ledger::{Account, ClientError, LedgerClient, TransportError};

/// Why a round published nothing.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("balance of {canister_id}: {source}")]
    Balance {
        canister_id: String,
        #[source]
        source: ClientError,
    },

    #[error("price lookup: {0}")]
    Price(#[source] TransportError),
}

/// The result of one fully successful round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshSnapshot {
    pub round: u64,
    /// Canister id to balance in base units, as a decimal string.
    pub balances: BTreeMap<String, String>,
    /// Token unique id to price. Tokens the feed does not know are absent.
    pub prices: BTreeMap<String, TokenPriceSample>,
    pub completed_at: DateTime<Utc>,
}

/// What the caller holds for a running subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    id: Uuid,
    snapshots: watch::Receiver<Option<Arc<RefreshSnapshot>>>,
}

impl SubscriptionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The latest published snapshot, if any round has completed.
    pub fn latest(&self) -> Option<Arc<RefreshSnapshot>> {
        self.snapshots.borrow().clone()
    }

    /// A receiver that wakes on every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<RefreshSnapshot>>> {
        self.snapshots.clone()
    }
}

/// A subscription key: the owner and its canister set, sorted and
/// deduplicated.
type PollKey = (Account, Vec<String>);

/// Subscribers of one poll. Publishing and unsubscribing both happen under
/// this lock, so a stopped subscriber never sees a later snapshot.
#[derive(Default)]
struct Subscribers {
    latest: Option<Arc<RefreshSnapshot>>,
    senders: HashMap<Uuid, watch::Sender<Option<Arc<RefreshSnapshot>>>>,
}

/// Everything a round needs, shared by all of a poll's rounds.
struct RoundContext {
    client: LedgerClient,
    prices: Arc<dyn PriceSource>,
    owner: Account,
    canister_ids: Vec<String>,
    unique_ids: Vec<String>,
    subscribers: Mutex<Subscribers>,
}

impl RoundContext {
    /// Registers a subscriber, seeded with the latest snapshot if there is
    /// one.
    fn subscribe(&self, id: Uuid) -> watch::Receiver<Option<Arc<RefreshSnapshot>>> {
        let mut subscribers = self.subscribers.lock();
        let (publish, snapshots) = watch::channel(subscribers.latest.clone());
        subscribers.senders.insert(id, publish);
        snapshots
    }

    /// Drops a subscriber and returns how many remain.
    fn unsubscribe(&self, id: &Uuid) -> usize {
        let mut subscribers = self.subscribers.lock();
        subscribers.senders.remove(id);
        subscribers.senders.len()
    }

    async fn fetch(
        &self,
    ) -> Result<(BTreeMap<String, String>, BTreeMap<String, TokenPriceSample>), RefreshError> {
        let balances = try_join_all(self.canister_ids.iter().map(|canister_id| async move {
            self.client
                .balance_of(canister_id, &self.owner)
                .await
                .map(|balance| (canister_id.clone(), balance.to_string()))
                .map_err(|source| RefreshError::Balance {
                    canister_id: canister_id.clone(),
                    source,
                })
        }));
        let prices = async {
            self.prices
                .prices(&self.unique_ids)
                .await
                .map_err(RefreshError::Price)
        };

        let (balances, prices) = tokio::try_join!(balances, prices)?;
        Ok((balances.into_iter().collect(), prices.into_iter().collect()))
    }

    async fn run(&self, tick: scheduler::Tick) {
        let outcome = self.fetch().await;
        let mut subscribers = self.subscribers.lock();
        if tick.stop.is_stopped() || subscribers.senders.is_empty() {
            debug!(owner = %self.owner.owner, round = tick.round, "poll stopped, discarding round");
            return;
        }
        match outcome {
            Ok((balances, prices)) => {
                let snapshot = Arc::new(RefreshSnapshot {
                    round: tick.round,
                    balances,
                    prices,
                    completed_at: Utc::now(),
                });
                for publish in subscribers.senders.values() {
                    publish.send_replace(Some(Arc::clone(&snapshot)));
                }
                subscribers.latest = Some(snapshot);
                debug!(
                    owner = %self.owner.owner,
                    round = tick.round,
                    subscribers = subscribers.senders.len(),
                    "snapshot published"
                );
            }
            Err(e) => {
                warn!(
                    owner = %self.owner.owner,
                    round = tick.round,
                    error = %e,
                    "refresh round failed, keeping previous snapshot"
                );
            }
        }
    }
}

/// One running poll and the context its rounds share.
struct SharedPoll {
    context: Arc<RoundContext>,
    poll: PollHandle,
}

/// Polls balances and prices for any number of subscriptions.
pub struct BalancePriceRefresher {
    client: LedgerClient,
    prices: Arc<dyn PriceSource>,
    chain: String,
    default_interval: Duration,
    polls: DashMap<PollKey, SharedPoll>,
    handles: DashMap<Uuid, PollKey>,
}

impl BalancePriceRefresher {
    pub fn new(client: LedgerClient, prices: Arc<dyn PriceSource>, chain: impl Into<String>) -> Self {
        Self {
            client,
            prices,
            chain: chain.into(),
            default_interval: Duration::from_millis(DEFAULT_BALANCE_REFRESH_MS),
            polls: DashMap::new(),
            handles: DashMap::new(),
        }
    }

    /// Takes the chain tag and default interval from `config`.
    pub fn from_config(client: LedgerClient, prices: Arc<dyn PriceSource>, config: &WalletConfig) -> Self {
        Self {
            default_interval: config.balance_refresh_interval(),
            ..Self::new(client, prices, config.chain.clone())
        }
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    /// [`start`](Self::start) at the configured interval.
    pub fn start_default(&self, owner: Account, canister_ids: Vec<String>) -> SubscriptionHandle {
        self.start(owner, canister_ids, self.default_interval)
    }

    /// Starts polling `canister_ids` for `owner` every `interval`. The first
    /// round runs immediately.
    ///
    /// If a poll for the same owner and canister set is already running, the
    /// new subscription joins it and `interval` is ignored.
    pub fn start(
        &self,
        owner: Account,
        mut canister_ids: Vec<String>,
        interval: Duration,
    ) -> SubscriptionHandle {
        canister_ids.sort();
        canister_ids.dedup();
        let id = Uuid::new_v4();
        let key = (owner, canister_ids);

        let snapshots = match self.polls.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(subscription = %id, owner = %key.0.owner, "joining running balance refresh");
                entry.get().context.subscribe(id)
            }
            Entry::Vacant(entry) => {
                let (owner, canister_ids) = entry.key().clone();
                let unique_ids = canister_ids
                    .iter()
                    .map(|canister_id| token_unique_id(&self.chain, canister_id))
                    .collect();
                info!(
                    subscription = %id,
                    owner = %owner.owner,
                    canisters = canister_ids.len(),
                    interval_ms = interval.as_millis() as u64,
                    "balance refresh started"
                );

                let context = Arc::new(RoundContext {
                    client: self.client.clone(),
                    prices: Arc::clone(&self.prices),
                    owner,
                    canister_ids,
                    unique_ids,
                    subscribers: Mutex::new(Subscribers::default()),
                });
                let snapshots = context.subscribe(id);
                let rounds = Arc::clone(&context);
                let poll = scheduler::start(interval, move |tick| {
                    let context = Arc::clone(&rounds);
                    async move { context.run(tick).await }
                });
                entry.insert(SharedPoll { context, poll });
                snapshots
            }
        };
        self.handles.insert(id, key);

        SubscriptionHandle { id, snapshots }
    }

    /// Stops a subscription. Calling it again, or on a handle this
    /// refresher never issued, does nothing. The poll itself stops with its
    /// last subscriber.
    pub fn stop(&self, handle: &SubscriptionHandle) {
        let Some((id, key)) = self.handles.remove(&handle.id) else {
            return;
        };
        if let Entry::Occupied(entry) = self.polls.entry(key) {
            if entry.get().context.unsubscribe(&id) == 0 {
                let (_, shared) = entry.remove_entry();
                shared.poll.stop();
                info!(subscription = %id, "balance refresh stopped");
            } else {
                debug!(subscription = %id, "subscription left a shared balance refresh");
            }
        }
    }

    /// Number of live subscription handles.
    pub fn active_subscriptions(&self) -> usize {
        self.handles.len()
    }

    /// Number of running polls. Subscriptions with the same owner and
    /// canister set share one.
    pub fn active_polls(&self) -> usize {
        self.polls.len()
    }
}
