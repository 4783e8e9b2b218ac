//! # Wallet State Machine
//!
//! The wallet is always in exactly one of three states:
//!
//! ```text
//!            create_from_mnemonic / create_from_private_key
//!   INITIAL ────────────────────────────────────────────────▶ ALIVE
//!      ▲                                                   │    ▲
//!      │ reset (from anywhere)                        lock │    │ unlock
//!      │                                                   ▼    │
//!      └──────────────────────────────────────────────── LOCKED ┘
//! ```
//!
//! Every operation checks the state *before* touching anything. Calling
//! `create_from_mnemonic` on an ALIVE wallet is not "retry later", it is a
//! bug in the caller, and it gets an [`IdentityError::State`] with no side
//! effects. Adding further accounts goes through [`add_identity`], which
//! requires ALIVE instead.
//!
//! On open, the state is INITIAL if no password hash is persisted and LOCKED
//! otherwise. A persisted ALIVE never survives a restart: the password has
//! to be typed again.
//!
//! Observers get a `watch` channel for the lifecycle state and another for
//! the selected account id.
//!
//! [`add_identity`]: WalletStateMachine::add_identity

use std::fmt;
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::info;
use uuid::Uuid;

use super::keys::{KeyMaterial, PrivateKeyBundle};
use super::store::SecureIdentityStore;
use super::{CreateOutcome, IdentityError};

/// Process-wide lifecycle flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentState {
    /// No identity persisted.
    Initial,
    /// Identity persisted, password not verified this session.
    Locked,
    /// Password verified; the bundle is decrypted in memory.
    Alive,
}

impl CurrentState {
    pub fn to_byte(self) -> u8 {
        match self {
            Self::Initial => 0,
            Self::Locked => 1,
            Self::Alive => 2,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Initial),
            1 => Some(Self::Locked),
            2 => Some(Self::Alive),
            _ => None,
        }
    }
}

impl fmt::Display for CurrentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initial => "INITIAL",
            Self::Locked => "LOCKED",
            Self::Alive => "ALIVE",
        })
    }
}

/// Owns the identity store and decides which operations are legal.
pub struct WalletStateMachine {
    store: Arc<SecureIdentityStore>,
    state: watch::Sender<CurrentState>,
    current: watch::Sender<Option<Uuid>>,
    /// Serialises transitions so that check-then-act is atomic.
    transition: Mutex<()>,
}

impl WalletStateMachine {
    /// Wraps `store`, starting INITIAL or LOCKED depending on whether an
    /// identity is persisted.
    pub async fn open(store: Arc<SecureIdentityStore>) -> Result<Self, IdentityError> {
        let initial = if store.has_identity().await? {
            CurrentState::Locked
        } else {
            CurrentState::Initial
        };
        if initial == CurrentState::Locked && store.load_lifecycle().await? == Some(CurrentState::Alive) {
            store.persist_lifecycle(CurrentState::Locked).await?;
        }
        info!(state = %initial, "wallet opened");

        let (state, _) = watch::channel(initial);
        let (current, _) = watch::channel(None);
        Ok(Self {
            store,
            state,
            current,
            transition: Mutex::new(()),
        })
    }

    pub fn state(&self) -> CurrentState {
        *self.state.borrow()
    }

    /// Id of the selected account, when ALIVE.
    pub fn current_account(&self) -> Option<Uuid> {
        *self.current.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<CurrentState> {
        self.state.subscribe()
    }

    pub fn subscribe_current(&self) -> watch::Receiver<Option<Uuid>> {
        self.current.subscribe()
    }

    pub fn store(&self) -> &Arc<SecureIdentityStore> {
        &self.store
    }

    /// The decrypted bundle, when ALIVE.
    pub fn bundle(&self) -> Option<PrivateKeyBundle> {
        self.store.bundle()
    }

    fn require(&self, operation: &'static str, expected: CurrentState) -> Result<(), IdentityError> {
        let state = self.state();
        if state != expected {
            return Err(IdentityError::State { operation, state });
        }
        Ok(())
    }

    fn enter(&self, next: CurrentState, current: Option<Uuid>) {
        let previous = self.state.send_replace(next);
        self.current.send_replace(current);
        if previous != next {
            info!(from = %previous, to = %next, "wallet state changed");
        }
    }

    fn publish_bundle(&self, bundle: &PrivateKeyBundle) {
        self.current.send_if_modified(|current| {
            let changed = *current != Some(bundle.current());
            *current = Some(bundle.current());
            changed
        });
    }

    // -----------------------------------------------------------------------
    // INITIAL
    // -----------------------------------------------------------------------

    /// INITIAL only. On success the wallet is ALIVE.
    pub async fn create_from_mnemonic(
        &self,
        password: &str,
        phrase: &str,
    ) -> Result<CreateOutcome, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("create_from_mnemonic", CurrentState::Initial)?;
        let outcome = self.store.create_from_mnemonic(password, phrase).await?;
        if let CreateOutcome::Created(bundle) = &outcome {
            self.enter(CurrentState::Alive, Some(bundle.current()));
        }
        Ok(outcome)
    }

    /// INITIAL only. On success the wallet is ALIVE.
    pub async fn create_from_private_key(
        &self,
        password: &str,
        private_key_hex: &str,
    ) -> Result<CreateOutcome, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("create_from_private_key", CurrentState::Initial)?;
        let outcome = self
            .store
            .create_from_private_key(password, private_key_hex)
            .await?;
        if let CreateOutcome::Created(bundle) = &outcome {
            self.enter(CurrentState::Alive, Some(bundle.current()));
        }
        Ok(outcome)
    }

    // -----------------------------------------------------------------------
    // ALIVE
    // -----------------------------------------------------------------------

    /// Adds another account to an existing wallet. ALIVE only.
    pub async fn add_identity(
        &self,
        material: KeyMaterial,
        name: Option<String>,
    ) -> Result<PrivateKeyBundle, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("add_identity", CurrentState::Alive)?;
        self.store.push_key(material, name).await
    }

    /// Derives the next account from the wallet's phrase. ALIVE only.
    pub async fn add_derived_identity(
        &self,
        name: Option<String>,
    ) -> Result<PrivateKeyBundle, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("add_identity", CurrentState::Alive)?;
        self.store.push_derived(name).await
    }

    pub async fn select_current(&self, id: Uuid) -> Result<(), IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("select_current", CurrentState::Alive)?;
        let bundle = self.store.select_current(id).await?;
        self.publish_bundle(&bundle);
        Ok(())
    }

    pub async fn remove_key(&self, id: Uuid) -> Result<PrivateKeyBundle, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("remove_key", CurrentState::Alive)?;
        let bundle = self.store.remove_key(id).await?;
        self.publish_bundle(&bundle);
        Ok(bundle)
    }

    pub async fn rename_key(
        &self,
        id: Uuid,
        name: String,
        icon: Option<String>,
    ) -> Result<PrivateKeyBundle, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("rename_key", CurrentState::Alive)?;
        self.store.rename_key(id, name, icon).await
    }

    /// ALIVE → LOCKED. The in-memory key and bundle are dropped.
    pub async fn lock(&self) -> Result<(), IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("lock", CurrentState::Alive)?;
        // A failed write leaves the session untouched and the wallet ALIVE.
        self.store.persist_lifecycle(CurrentState::Locked).await?;
        self.store.lock().await;
        self.enter(CurrentState::Locked, None);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // LOCKED
    // -----------------------------------------------------------------------

    /// LOCKED → ALIVE if the password verifies. A wrong password returns
    /// `Ok(false)` and leaves the wallet LOCKED, as does a failed write of
    /// the lifecycle byte, after which the decrypted session is dropped.
    pub async fn unlock(&self, password: &str) -> Result<bool, IdentityError> {
        let _guard = self.transition.lock().await;
        self.require("unlock", CurrentState::Locked)?;
        if !self.store.unlock(password).await? {
            return Ok(false);
        }
        if let Err(e) = self.store.persist_lifecycle(CurrentState::Alive).await {
            self.store.lock().await;
            return Err(e);
        }
        let current = self.store.bundle().map(|b| b.current());
        self.enter(CurrentState::Alive, current);
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Any state
    // -----------------------------------------------------------------------

    /// Wipes every persisted secret. Legal from any state.
    pub async fn reset(&self) -> Result<(), IdentityError> {
        let _guard = self.transition.lock().await;
        self.store.wipe().await?;
        self.enter(CurrentState::Initial, None);
        Ok(())
    }
}
