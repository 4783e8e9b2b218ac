// Copyright (c) 2026 Fuse Wallet Contributors. MIT License.
// See LICENSE for details.

//! # Fuse CLI
//!
//! Entry point for the `fuse` binary. Parses arguments, initializes
//! logging, opens the wallet under the data directory, and runs one
//! command against it.
//!
//! Every invocation is its own session. The wallet opens LOCKED, commands
//! that touch accounts unlock it with the password, and the session ends
//! with the process.

mod cli;
mod logging;

use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use zeroize::Zeroizing;

use fuse_wallet::config::WalletConfig;
use fuse_wallet::identity::{
    mnemonic, CreateOutcome, CurrentState, KeyMaterial, PasswordCodec, Principal,
    PrivateKeyBundle, SecureIdentityStore, WalletStateMachine,
};
use fuse_wallet::ledger::{Account, Subaccount, TokenAmount};
use fuse_wallet::storage::SledStore;

use cli::{Commands, FuseCli, WalletCommands};

#[tokio::main]
async fn main() -> Result<()> {
    let FuseCli {
        data_dir,
        config,
        password,
        log_format,
        command,
    } = FuseCli::parse();
    logging::init_logging("fuse=info,fuse_wallet=info", log_format);

    match command {
        // Offline helpers never touch the wallet.
        Commands::FormatAmount(args) => format_amount(args),
        Commands::AccountId(args) => account_id(args),
        Commands::Config => {
            let config = load_config(config.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Wallet(command) => {
            let config = load_config(config.as_deref())?;
            let password = password.map(Zeroizing::new);
            let wallet = open_wallet(&data_dir, &config).await?;
            run(command, &wallet, password.as_deref().map(String::as_str)).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<WalletConfig> {
    match path {
        Some(path) => WalletConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(WalletConfig::default()),
    }
}

async fn open_wallet(data_dir: &Path, config: &WalletConfig) -> Result<WalletStateMachine> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;
    let db_path = data_dir.join("wallet.db");
    let backend = Arc::new(
        SledStore::open(&db_path)
            .with_context(|| format!("failed to open wallet store at {}", db_path.display()))?,
    );
    tracing::debug!(path = %db_path.display(), "wallet store opened");

    let store = Arc::new(SecureIdentityStore::new(backend, PasswordCodec::new(config.kdf)));
    Ok(WalletStateMachine::open(store).await?)
}

fn require_password(password: Option<&str>) -> Result<&str> {
    password.ok_or_else(|| anyhow!("a password is required: pass --password or set FUSE_PASSWORD"))
}

async fn unlock(wallet: &WalletStateMachine, password: Option<&str>) -> Result<()> {
    match wallet.state() {
        CurrentState::Initial => bail!("no wallet here yet; run `fuse generate` or `fuse restore`"),
        CurrentState::Alive => Ok(()),
        CurrentState::Locked => {
            if wallet.unlock(require_password(password)?).await? {
                Ok(())
            } else {
                bail!("wrong password")
            }
        }
    }
}

fn created(outcome: CreateOutcome) -> Result<PrivateKeyBundle> {
    match outcome {
        CreateOutcome::Created(bundle) => Ok(bundle),
        CreateOutcome::Rejected(reason) => bail!("{}", reason),
    }
}

async fn run(command: WalletCommands, wallet: &WalletStateMachine, password: Option<&str>) -> Result<()> {
    match command {
        WalletCommands::Generate(args) => {
            let phrase = Zeroizing::new(mnemonic::generate(args.words)?);
            let bundle = created(
                wallet
                    .create_from_mnemonic(require_password(password)?, &phrase)
                    .await?,
            )?;
            println!("Wallet created. Write these words down; they are shown once:");
            println!();
            println!("  {}", phrase.as_str());
            println!();
            print_accounts(&bundle, false)
        }
        WalletCommands::Restore(args) => {
            let phrase = Zeroizing::new(args.phrase);
            let bundle = created(
                wallet
                    .create_from_mnemonic(require_password(password)?, &phrase)
                    .await?,
            )?;
            println!("Wallet restored.");
            print_accounts(&bundle, false)
        }
        WalletCommands::ImportKey(args) => {
            let key = Zeroizing::new(args.private_key);
            let bundle = created(
                wallet
                    .create_from_private_key(require_password(password)?, &key)
                    .await?,
            )?;
            println!("Wallet created from private key.");
            print_accounts(&bundle, false)
        }
        WalletCommands::Unlock => {
            unlock(wallet, password).await?;
            let count = wallet.bundle().map(|b| b.keys().len()).unwrap_or(0);
            println!("Password accepted. {} account(s).", count);
            Ok(())
        }
        WalletCommands::Accounts(args) => {
            let bundle = unlocked_bundle(wallet, password).await?;
            print_accounts(&bundle, args.json)
        }
        WalletCommands::AddAccount(args) => {
            unlock(wallet, password).await?;
            let bundle = match (args.private_key, args.phrase) {
                (Some(key), _) => {
                    let key = Zeroizing::new(key);
                    let material = KeyMaterial::private_key_hex(&key)?;
                    wallet.add_identity(material, args.name).await?
                }
                (None, Some(phrase)) => {
                    let phrase = Zeroizing::new(phrase);
                    if !mnemonic::validate(&phrase) {
                        bail!("not a valid 12 or 24 word recovery phrase");
                    }
                    let material = KeyMaterial::mnemonic(&phrase, args.index);
                    wallet.add_identity(material, args.name).await?
                }
                (None, None) => wallet.add_derived_identity(args.name).await?,
            };
            print_accounts(&bundle, false)
        }
        WalletCommands::Select(args) => {
            unlock(wallet, password).await?;
            wallet.select_current(args.id).await?;
            println!("Current account is now {}.", args.id);
            Ok(())
        }
        WalletCommands::Remove(args) => {
            unlock(wallet, password).await?;
            let bundle = wallet.remove_key(args.id).await?;
            println!("Removed {}.", args.id);
            print_accounts(&bundle, false)
        }
        WalletCommands::Rename(args) => {
            unlock(wallet, password).await?;
            let bundle = wallet.rename_key(args.id, args.name, args.icon).await?;
            print_accounts(&bundle, false)
        }
        WalletCommands::Lock => {
            match wallet.state() {
                CurrentState::Alive => {
                    wallet.lock().await?;
                    println!("Wallet locked.");
                }
                CurrentState::Locked => println!("Wallet is locked."),
                CurrentState::Initial => println!("No wallet here yet."),
            }
            Ok(())
        }
        WalletCommands::Reset(args) => {
            if !args.yes {
                bail!("refusing to erase the wallet without --yes");
            }
            wallet.reset().await?;
            println!("Wallet erased.");
            Ok(())
        }
    }
}

async fn unlocked_bundle(wallet: &WalletStateMachine, password: Option<&str>) -> Result<PrivateKeyBundle> {
    unlock(wallet, password).await?;
    wallet
        .bundle()
        .ok_or_else(|| anyhow!("wallet is unlocked but has no bundle"))
}

#[derive(Serialize)]
struct AccountRow {
    id: String,
    name: String,
    icon: String,
    principal: String,
    account_id: String,
    current: bool,
}

fn print_accounts(bundle: &PrivateKeyBundle, json: bool) -> Result<()> {
    let rows = bundle
        .keys()
        .iter()
        .map(|key| -> Result<AccountRow> {
            let principal = key.principal()?;
            let account_id = Account::new(principal.clone()).account_identifier();
            Ok(AccountRow {
                id: key.id.to_string(),
                name: key.name.clone(),
                icon: key.icon.clone(),
                principal: principal.to_text(),
                account_id: account_id.to_hex(),
                current: key.id == bundle.current(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    for row in rows {
        let marker = if row.current { "*" } else { " " };
        println!("{} {} {} {}", marker, row.id, row.icon, row.name);
        println!("    principal  {}", row.principal);
        println!("    account id {}", row.account_id);
    }
    Ok(())
}

fn format_amount(args: cli::FormatAmountArgs) -> Result<()> {
    let amount: TokenAmount = args
        .amount
        .parse()
        .with_context(|| format!("invalid amount {:?}", args.amount))?;
    let rendered = match args.places {
        Some(places) => amount.format_fixed(args.decimals, places),
        None => amount.to_display(args.decimals),
    };
    println!("{}", rendered);
    Ok(())
}

fn account_id(args: cli::AccountIdArgs) -> Result<()> {
    let owner = Principal::from_text(&args.principal)
        .with_context(|| format!("invalid principal {:?}", args.principal))?;
    let account = match args.subaccount {
        Some(index) => Account::with_subaccount(owner, Subaccount::from_index(index)),
        None => Account::new(owner),
    };
    println!("{}", account.account_identifier().to_hex());
    Ok(())
}
