use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use fuse_wallet::config::WalletConfig;
use fuse_wallet::identity::Principal;
use fuse_wallet::ledger::{
    Account, ClientError, LedgerClient, LedgerTransport, Memo, MetadataValue, Subaccount,
    TokenAmount, TransferRequest, TransferTarget, TransportError, WireValue,
};
use fuse_wallet::refresh::TokenInfoCache;

const LEDGER: &str = "ryjl3-tyaaa-aaaaa-aaaba-cai";

#[derive(Debug, Clone, PartialEq)]
struct Call {
    update: bool,
    method: String,
    arg: WireValue,
}

/// Answers each method with a fixed reply and records every call.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<HashMap<String, Result<WireValue, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    fn reply(&self, method: &str, value: WireValue) {
        self.replies.lock().insert(method.to_string(), Ok(value));
    }

    fn fail(&self, method: &str, error: TransportError) {
        self.replies.lock().insert(method.to_string(), Err(error));
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn answer(&self, update: bool, method: &str, arg: WireValue) -> Result<WireValue, TransportError> {
        self.calls.lock().push(Call {
            update,
            method: method.to_string(),
            arg,
        });
        self.replies
            .lock()
            .get(method)
            .cloned()
            .unwrap_or_else(|| Err(TransportError::Malformed(format!("no script for {}", method))))
    }
}

#[async_trait]
impl LedgerTransport for ScriptedTransport {
    async fn query(
        &self,
        _canister_id: &str,
        method: &str,
        arg: WireValue,
    ) -> Result<WireValue, TransportError> {
        self.answer(false, method, arg)
    }

    async fn update(
        &self,
        _canister_id: &str,
        method: &str,
        arg: WireValue,
    ) -> Result<WireValue, TransportError> {
        self.answer(true, method, arg)
    }
}

fn setup() -> (Arc<ScriptedTransport>, LedgerClient) {
    let transport = Arc::new(ScriptedTransport::default());
    let client = LedgerClient::new(transport.clone());
    (transport, client)
}

fn script_token_info(transport: &ScriptedTransport) {
    transport.reply("icrc1_name", WireValue::Text("Internet Computer".into()));
    transport.reply("icrc1_symbol", WireValue::Text("ICP".into()));
    transport.reply("icrc1_decimals", WireValue::Nat8(8));
    transport.reply("icrc1_fee", WireValue::Nat(TokenAmount::from(10_000)));
}

fn owner() -> Account {
    Account::new(Principal::from_text("rrkah-fqaaa-aaaaa-aaaaq-cai").unwrap())
}

#[tokio::test]
async fn test_token_info_runs_four_queries() {
    let (transport, client) = setup();
    script_token_info(&transport);

    let info = client.token_info(LEDGER).await.unwrap();
    assert_eq!(info.name, "Internet Computer");
    assert_eq!(info.symbol, "ICP");
    assert_eq!(info.decimals, 8);
    assert_eq!(info.fee, TokenAmount::from(10_000));

    let calls = transport.calls();
    assert_eq!(calls.len(), 4);
    assert!(calls.iter().all(|c| !c.update && c.arg == WireValue::Null));
}

#[tokio::test]
async fn test_balance_of_encodes_account() {
    let (transport, client) = setup();
    transport.reply(
        "icrc1_balance_of",
        WireValue::Nat("340282366920938463463374607431768211456".parse().unwrap()),
    );

    let account = Account::with_subaccount(owner().owner, Subaccount::from_index(3));
    let balance = client.balance_of(LEDGER, &account).await.unwrap();
    // Larger than u128; must survive intact.
    assert_eq!(balance.to_string(), "340282366920938463463374607431768211456");

    let arg = &transport.calls()[0].arg;
    assert_eq!(arg.field("owner").unwrap(), &WireValue::Principal(account.owner.clone()));
    assert_eq!(
        arg.field("subaccount").unwrap(),
        &WireValue::Opt(Some(Box::new(WireValue::Blob(
            Subaccount::from_index(3).as_bytes().to_vec()
        ))))
    );
}

#[tokio::test]
async fn test_icrc1_transfer_omits_fee() {
    let (transport, client) = setup();
    transport.reply(
        "icrc1_transfer",
        WireValue::variant("Ok", WireValue::Nat(TokenAmount::from(1_024))),
    );

    let mut request = TransferRequest::new(TransferTarget::Account(owner()), TokenAmount::from(5));
    request.memo = Some(Memo::Bytes(b"rent".to_vec()));
    let block = client.transfer(LEDGER, &request).await.unwrap();
    assert_eq!(block, TokenAmount::from(1_024));

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].update);
    assert_eq!(calls[0].method, "icrc1_transfer");
    assert_eq!(calls[0].arg.field("fee").unwrap(), &WireValue::Opt(None));
    assert_eq!(
        calls[0].arg.field("memo").unwrap(),
        &WireValue::Opt(Some(Box::new(WireValue::Blob(b"rent".to_vec()))))
    );
}

#[tokio::test]
async fn test_icrc1_rejection_carries_discriminant() {
    let (transport, client) = setup();
    transport.reply(
        "icrc1_transfer",
        WireValue::variant(
            "Err",
            WireValue::variant(
                "InsufficientFunds",
                WireValue::record([("balance", WireValue::Nat(TokenAmount::from(3)))]),
            ),
        ),
    );

    let request = TransferRequest::new(TransferTarget::Account(owner()), TokenAmount::from(5));
    let err = client.transfer(LEDGER, &request).await.unwrap_err();
    assert_eq!(err.ledger_discriminant(), Some("InsufficientFunds"));
    match err {
        ClientError::Ledger(e) => {
            assert_eq!(e.canister_id, LEDGER);
            assert_eq!(e.method, "icrc1_transfer");
        }
        other => panic!("expected ledger error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_legacy_transfer_without_fee_sends_nothing() {
    let (transport, client) = setup();
    let to = owner().account_identifier();
    let mut request = TransferRequest::new(TransferTarget::Address(to), TokenAmount::from(5));
    request.memo = Some(Memo::Number(TokenAmount::from(1)));

    let err = client.transfer(LEDGER, &request).await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidRequest(_)));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_legacy_transfer_roundtrip() {
    let (transport, client) = setup();
    transport.reply("transfer", WireValue::variant("Ok", WireValue::Nat64(99)));

    let to = owner().account_identifier();
    let mut request = TransferRequest::new(TransferTarget::Address(to), TokenAmount::from(5));
    request.fee = Some(TokenAmount::from(10_000));
    request.memo = Some(Memo::Number(TokenAmount::from(7)));
    assert_eq!(client.transfer(LEDGER, &request).await.unwrap(), TokenAmount::from(99));

    let call = &transport.calls()[0];
    assert_eq!(call.method, "transfer");
    assert_eq!(call.arg.field("to").unwrap(), &WireValue::Blob(to.as_bytes().to_vec()));
    assert_eq!(call.arg.field("created_at_time").unwrap(), &WireValue::Opt(None));

    // A legacy rejection decodes the same way.
    transport.reply(
        "transfer",
        WireValue::variant(
            "Err",
            WireValue::variant(
                "TxDuplicate",
                WireValue::record([("duplicate_of", WireValue::Nat64(98))]),
            ),
        ),
    );
    let err = client.transfer(LEDGER, &request).await.unwrap_err();
    assert_eq!(err.ledger_discriminant(), Some("TxDuplicate"));
}

#[tokio::test]
async fn test_protocol_target_mismatch_rejected() {
    let (transport, client) = setup();
    let request = TransferRequest::new(TransferTarget::Account(owner()), TokenAmount::from(5));
    assert!(matches!(
        client.legacy_transfer(LEDGER, &request).await,
        Err(ClientError::InvalidRequest(_))
    ));
    assert!(transport.calls().is_empty());
}

#[tokio::test]
async fn test_transport_failure_surfaces() {
    let (transport, client) = setup();
    transport.fail("icrc1_balance_of", TransportError::Timeout);
    assert!(matches!(
        client.balance_of(LEDGER, &owner()).await,
        Err(ClientError::Transport(TransportError::Timeout))
    ));
}

#[tokio::test]
async fn test_metadata_and_logo() {
    let (transport, client) = setup();
    let entry = |key: &str, value: WireValue| {
        WireValue::record([("0", WireValue::Text(key.into())), ("1", value)])
    };

    transport.reply(
        "icrc1_metadata",
        WireValue::Vec(vec![entry(
            "icrc1:decimals",
            WireValue::variant("Nat", WireValue::Nat(TokenAmount::from(8))),
        )]),
    );
    assert_eq!(client.logo(LEDGER).await.unwrap(), None);

    transport.reply(
        "icrc1_metadata",
        WireValue::Vec(vec![
            entry("icrc1:symbol", WireValue::variant("Text", WireValue::Text("ICP".into()))),
            entry(
                "icrc1:logo",
                WireValue::variant("Text", WireValue::Text("data:image/svg+xml;base64,AA".into())),
            ),
        ]),
    );
    let metadata = client.metadata(LEDGER).await.unwrap();
    assert_eq!(metadata[0], ("icrc1:symbol".to_string(), MetadataValue::Text("ICP".into())));
    assert_eq!(
        client.logo(LEDGER).await.unwrap().as_deref(),
        Some("data:image/svg+xml;base64,AA")
    );
}

#[tokio::test(start_paused = true)]
async fn test_token_info_cache_ttl() {
    let (transport, client) = setup();
    script_token_info(&transport);
    let cache = TokenInfoCache::new(client, Duration::from_secs(300));

    let first = cache.get(LEDGER).await.unwrap();
    let again = cache.get(LEDGER).await.unwrap();
    assert_eq!(first, again);
    assert_eq!(transport.calls().len(), 4);

    tokio::time::advance(Duration::from_secs(301)).await;
    cache.get(LEDGER).await.unwrap();
    assert_eq!(transport.calls().len(), 8);
}

#[tokio::test]
async fn test_token_info_failure_not_cached() {
    let (transport, client) = setup();
    script_token_info(&transport);
    transport.fail("icrc1_fee", TransportError::Unavailable("down".into()));
    let cache = TokenInfoCache::new(client, Duration::from_secs(300));

    assert!(cache.get(LEDGER).await.is_err());

    transport.reply("icrc1_fee", WireValue::Nat(TokenAmount::from(10_000)));
    let info = cache.get(LEDGER).await.unwrap();
    assert_eq!(info.symbol, "ICP");
}

#[tokio::test(start_paused = true)]
async fn test_token_info_cache_uses_configured_ttl() {
    let (transport, client) = setup();
    script_token_info(&transport);
    let config = WalletConfig {
        token_info_ttl_secs: 60,
        ..WalletConfig::default()
    };
    let cache = TokenInfoCache::from_config(client, &config);

    cache.get(LEDGER).await.unwrap();
    tokio::time::advance(Duration::from_secs(59)).await;
    cache.get(LEDGER).await.unwrap();
    assert_eq!(transport.calls().len(), 4);

    tokio::time::advance(Duration::from_secs(2)).await;
    cache.get(LEDGER).await.unwrap();
    assert_eq!(transport.calls().len(), 8);
}
