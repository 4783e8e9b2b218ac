use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use fuse_wallet::config::KdfConfig;
use fuse_wallet::identity::{
    CreateOutcome, CurrentState, IdentityError, KeyMaterial, PasswordCodec, SecureIdentityStore,
    ValidationError, WalletStateMachine,
};
use fuse_wallet::storage::{
    KeyValueStore, MemoryStore, SledStore, StorageError, StorageResult, StoreOp,
};

const PHRASE: &str = "abandon abandon abandon abandon abandon abandon \
                      abandon abandon abandon abandon abandon about";
const PASSWORD: &str = "correct horse 1";
const GOOD_PASSWORD: &str = "hunter22hunter";

async fn open(backend: Arc<dyn KeyValueStore>) -> WalletStateMachine {
    let codec = PasswordCodec::new(KdfConfig::insecure_fast());
    let store = Arc::new(SecureIdentityStore::new(backend, codec));
    WalletStateMachine::open(store).await.unwrap()
}

async fn alive_wallet() -> (Arc<MemoryStore>, WalletStateMachine) {
    let backend = Arc::new(MemoryStore::new());
    let wallet = open(backend.clone()).await;
    let outcome = wallet
        .create_from_mnemonic(GOOD_PASSWORD, PHRASE)
        .await
        .unwrap();
    assert!(outcome.is_created());
    (backend, wallet)
}

/// Memory backend whose writes can be switched off mid-test.
#[derive(Default)]
struct FlakyBackend {
    inner: MemoryStore,
    fail_writes: AtomicBool,
}

impl FlakyBackend {
    fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FlakyBackend {
    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check()?;
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn apply(&self, ops: Vec<StoreOp>) -> StorageResult<()> {
        self.check()?;
        self.inner.apply(ops).await
    }
}

async fn flaky_alive_wallet() -> (Arc<FlakyBackend>, WalletStateMachine) {
    let backend = Arc::new(FlakyBackend::default());
    let wallet = open(backend.clone()).await;
    let outcome = wallet
        .create_from_mnemonic(GOOD_PASSWORD, PHRASE)
        .await
        .unwrap();
    assert!(outcome.is_created());
    (backend, wallet)
}

#[tokio::test]
async fn test_fresh_wallet_is_initial_and_gated() {
    let wallet = open(Arc::new(MemoryStore::new())).await;
    assert_eq!(wallet.state(), CurrentState::Initial);
    assert!(wallet.current_account().is_none());

    assert!(matches!(
        wallet.add_derived_identity(None).await,
        Err(IdentityError::State {
            state: CurrentState::Initial,
            ..
        })
    ));
    assert!(matches!(
        wallet.unlock(GOOD_PASSWORD).await,
        Err(IdentityError::State { .. })
    ));
    assert!(matches!(wallet.lock().await, Err(IdentityError::State { .. })));
}

#[tokio::test]
async fn test_rejected_creation_writes_nothing() {
    let backend = Arc::new(MemoryStore::new());
    let wallet = open(backend.clone()).await;

    // Contains whitespace, so it fails the strength policy.
    let outcome = wallet.create_from_mnemonic(PASSWORD, PHRASE).await.unwrap();
    assert!(matches!(
        outcome,
        CreateOutcome::Rejected(ValidationError::WeakPassword)
    ));

    let outcome = wallet
        .create_from_mnemonic(GOOD_PASSWORD, "abandon abandon abandon")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CreateOutcome::Rejected(ValidationError::InvalidMnemonic)
    ));

    let outcome = wallet
        .create_from_private_key(GOOD_PASSWORD, "not hex")
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        CreateOutcome::Rejected(ValidationError::InvalidPrivateKey)
    ));

    assert!(backend.is_empty());
    assert_eq!(wallet.state(), CurrentState::Initial);
}

#[tokio::test]
async fn test_create_lock_unlock_cycle() {
    let (_backend, wallet) = alive_wallet().await;
    assert_eq!(wallet.state(), CurrentState::Alive);
    let bundle = wallet.bundle().unwrap();
    assert_eq!(bundle.keys().len(), 1);
    assert_eq!(bundle.keys()[0].name, "Account #1");
    assert_eq!(wallet.current_account(), Some(bundle.current()));

    // A second creation is not legal once ALIVE.
    assert!(matches!(
        wallet.create_from_mnemonic(GOOD_PASSWORD, PHRASE).await,
        Err(IdentityError::State { .. })
    ));

    wallet.lock().await.unwrap();
    assert_eq!(wallet.state(), CurrentState::Locked);
    assert!(wallet.bundle().is_none());
    assert!(wallet.current_account().is_none());

    assert!(!wallet.unlock("wrongpass99").await.unwrap());
    assert_eq!(wallet.state(), CurrentState::Locked);

    assert!(wallet.unlock(GOOD_PASSWORD).await.unwrap());
    assert_eq!(wallet.state(), CurrentState::Alive);
    assert_eq!(wallet.bundle().unwrap().current(), bundle.current());
}

#[tokio::test]
async fn test_creation_outside_initial_leaves_store_untouched() {
    let (backend, wallet) = alive_wallet().await;
    let key = "11".repeat(32);

    let before = backend.snapshot();
    assert!(matches!(
        wallet.create_from_mnemonic(GOOD_PASSWORD, PHRASE).await,
        Err(IdentityError::State {
            state: CurrentState::Alive,
            ..
        })
    ));
    assert!(matches!(
        wallet.create_from_private_key(GOOD_PASSWORD, &key).await,
        Err(IdentityError::State { .. })
    ));
    assert_eq!(backend.snapshot(), before);

    wallet.lock().await.unwrap();
    let before = backend.snapshot();
    assert!(matches!(
        wallet.create_from_mnemonic(GOOD_PASSWORD, PHRASE).await,
        Err(IdentityError::State {
            state: CurrentState::Locked,
            ..
        })
    ));
    assert!(matches!(
        wallet.create_from_private_key(GOOD_PASSWORD, &key).await,
        Err(IdentityError::State { .. })
    ));
    assert_eq!(backend.snapshot(), before);
    assert_eq!(backend.keys(), before.keys().cloned().collect::<Vec<_>>());
    assert_eq!(wallet.state(), CurrentState::Locked);
}

#[tokio::test]
async fn test_failed_lock_keeps_wallet_alive() {
    let (backend, wallet) = flaky_alive_wallet().await;
    let current = wallet.current_account();

    backend.fail_writes(true);
    assert!(matches!(wallet.lock().await, Err(IdentityError::Storage(_))));
    assert_eq!(wallet.state(), CurrentState::Alive);
    assert!(wallet.bundle().is_some());
    assert_eq!(wallet.current_account(), current);

    backend.fail_writes(false);
    let bundle = wallet.add_derived_identity(None).await.unwrap();
    assert_eq!(bundle.keys().len(), 2);
    wallet.lock().await.unwrap();
    assert_eq!(wallet.state(), CurrentState::Locked);
}

#[tokio::test]
async fn test_failed_unlock_write_stays_locked() {
    let (backend, wallet) = flaky_alive_wallet().await;
    wallet.lock().await.unwrap();

    backend.fail_writes(true);
    assert!(wallet.unlock(GOOD_PASSWORD).await.is_err());
    assert_eq!(wallet.state(), CurrentState::Locked);
    assert!(wallet.bundle().is_none());
    assert!(!wallet.store().is_unlocked());
    assert!(wallet.current_account().is_none());

    backend.fail_writes(false);
    assert!(wallet.unlock(GOOD_PASSWORD).await.unwrap());
    assert_eq!(wallet.state(), CurrentState::Alive);
    assert!(wallet.bundle().is_some());
}

#[tokio::test]
async fn test_state_changes_are_observable() {
    let (_backend, wallet) = alive_wallet().await;
    let mut states = wallet.subscribe();
    assert_eq!(*states.borrow_and_update(), CurrentState::Alive);

    wallet.lock().await.unwrap();
    states.changed().await.unwrap();
    assert_eq!(*states.borrow_and_update(), CurrentState::Locked);
}

#[tokio::test]
async fn test_accounts_add_select_remove() {
    let (_backend, wallet) = alive_wallet().await;
    let first = wallet.current_account().unwrap();

    let bundle = wallet.add_derived_identity(None).await.unwrap();
    assert_eq!(bundle.keys().len(), 2);
    assert_eq!(bundle.keys()[1].name, "Account #2");
    let second = bundle.keys()[1].id;
    assert_ne!(
        bundle.keys()[0].principal().unwrap(),
        bundle.keys()[1].principal().unwrap()
    );

    // Adding does not change the selection.
    assert_eq!(wallet.current_account(), Some(first));

    wallet.select_current(second).await.unwrap();
    assert_eq!(wallet.current_account(), Some(second));

    let bundle = wallet
        .rename_key(second, "Savings".into(), Some("💰".into()))
        .await
        .unwrap();
    assert_eq!(bundle.find(second).unwrap().name, "Savings");

    // Removing the current account re-points the selection.
    let bundle = wallet.remove_key(second).await.unwrap();
    assert_eq!(bundle.keys().len(), 1);
    assert_eq!(wallet.current_account(), Some(first));

    assert!(matches!(
        wallet.remove_key(first).await,
        Err(IdentityError::LastKey)
    ));
    assert!(matches!(
        wallet.select_current(second).await,
        Err(IdentityError::NotFound(id)) if id == second
    ));
}

#[tokio::test]
async fn test_duplicate_import_rejected() {
    let (_backend, wallet) = alive_wallet().await;
    let same = KeyMaterial::mnemonic(PHRASE, 0);
    assert!(wallet.store().exists(&same).await.unwrap());
    assert!(matches!(
        wallet.add_identity(same, None).await,
        Err(IdentityError::DuplicateKey)
    ));
    assert_eq!(wallet.bundle().unwrap().keys().len(), 1);
}

#[tokio::test]
async fn test_private_key_wallet_cannot_derive() {
    let wallet = open(Arc::new(MemoryStore::new())).await;
    let key = "0x".to_string() + &"11".repeat(32);
    let outcome = wallet
        .create_from_private_key(GOOD_PASSWORD, &key)
        .await
        .unwrap();
    assert!(outcome.is_created());
    assert!(matches!(
        wallet.add_derived_identity(None).await,
        Err(IdentityError::NoMnemonic)
    ));

    // Phrase-based accounts can still be imported explicitly.
    let bundle = wallet
        .add_identity(KeyMaterial::mnemonic(PHRASE, 0), Some("Imported".into()))
        .await
        .unwrap();
    assert_eq!(bundle.keys().len(), 2);
}

#[tokio::test]
async fn test_reset_returns_to_initial() {
    let (backend, wallet) = alive_wallet().await;
    wallet.lock().await.unwrap();

    wallet.reset().await.unwrap();
    assert_eq!(wallet.state(), CurrentState::Initial);
    assert!(backend.is_empty());
    assert!(!wallet.store().has_identity().await.unwrap());

    // And the wallet can be set up again.
    let outcome = wallet
        .create_from_mnemonic(GOOD_PASSWORD, PHRASE)
        .await
        .unwrap();
    assert!(outcome.is_created());
}

#[tokio::test]
async fn test_sled_wallet_survives_reopen_locked() {
    let dir = tempfile::tempdir().unwrap();
    let (first, added) = {
        let backend = Arc::new(SledStore::open(dir.path()).unwrap());
        let wallet = open(backend).await;
        let outcome = wallet
            .create_from_mnemonic(GOOD_PASSWORD, PHRASE)
            .await
            .unwrap();
        assert!(outcome.is_created());
        let bundle = wallet.add_derived_identity(Some("Second".into())).await.unwrap();
        (bundle.keys()[0].id, bundle.keys()[1].id)
    };

    let backend = Arc::new(SledStore::open(dir.path()).unwrap());
    let wallet = open(backend).await;
    // An ALIVE session never survives a restart.
    assert_eq!(wallet.state(), CurrentState::Locked);
    assert!(wallet.bundle().is_none());

    assert!(wallet.unlock(GOOD_PASSWORD).await.unwrap());
    let bundle = wallet.bundle().unwrap();
    assert_eq!(bundle.keys().len(), 2);
    assert_eq!(bundle.keys()[0].id, first);
    assert_eq!(bundle.find(added).unwrap().name, "Second");
    assert_eq!(bundle.mnemonic(), PHRASE.split_whitespace().collect::<Vec<_>>().join(" "));
}
