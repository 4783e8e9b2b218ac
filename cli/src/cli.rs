//! # CLI Interface
//!
//! Argument structure for `fuse`, via `clap` derive. Global flags pick the
//! data directory, config file, password and log format; each subcommand is
//! one wallet operation.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use crate::logging::LogFormat;

/// Fuse wallet.
///
/// Restore or create a wallet, manage its accounts, and inspect ledger
/// addresses and amounts. The wallet is stored encrypted under the data
/// directory and unlocked with your password for each command that needs it.
#[derive(Parser, Debug)]
#[command(name = "fuse", about = "Fuse wallet command line", version, propagate_version = true)]
pub struct FuseCli {
    /// Directory holding the encrypted wallet.
    #[arg(long, short = 'd', env = "FUSE_DATA_DIR", default_value = ".fuse", global = true)]
    pub data_dir: PathBuf,

    /// JSON config file overriding the wallet defaults.
    #[arg(long, short = 'c', env = "FUSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Wallet password. Prefer the environment variable over the flag; flags
    /// end up in shell history.
    #[arg(long, env = "FUSE_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty, global = true)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(flatten)]
    Wallet(WalletCommands),
    /// Render a base-unit amount as a decimal.
    FormatAmount(FormatAmountArgs),
    /// Print the legacy ledger account identifier of a principal.
    AccountId(AccountIdArgs),
    /// Print the effective configuration as JSON.
    Config,
}

/// Commands that open the wallet under the data directory.
#[derive(Subcommand, Debug)]
pub enum WalletCommands {
    /// Create a wallet from a freshly generated recovery phrase and print it.
    Generate(GenerateArgs),
    /// Restore a wallet from an existing recovery phrase.
    Restore(RestoreArgs),
    /// Create a wallet from a hex-encoded Ed25519 private key.
    ImportKey(ImportKeyArgs),
    /// Check the password against the stored wallet.
    Unlock,
    /// List the wallet's accounts.
    Accounts(AccountsArgs),
    /// Add an account, derived from the recovery phrase or imported.
    AddAccount(AddAccountArgs),
    /// Make an account the current one.
    Select(IdArgs),
    /// Remove an account.
    Remove(IdArgs),
    /// Rename an account.
    Rename(RenameArgs),
    /// Show the lock state of the stored wallet.
    Lock,
    /// Erase the stored wallet. There is no undo.
    Reset(ResetArgs),
}

#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Phrase length: 12 or 24 words.
    #[arg(long, default_value_t = 12)]
    pub words: usize,
}

#[derive(Parser, Debug)]
pub struct RestoreArgs {
    /// The recovery phrase, quoted as one argument.
    #[arg(env = "FUSE_MNEMONIC", hide_env_values = true)]
    pub phrase: String,
}

#[derive(Parser, Debug)]
pub struct ImportKeyArgs {
    /// 32-byte private key as hex, with or without `0x`.
    #[arg(env = "FUSE_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: String,
}

#[derive(Parser, Debug)]
pub struct AccountsArgs {
    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct AddAccountArgs {
    /// Display name. Defaults to `Account #<n>`.
    #[arg(long)]
    pub name: Option<String>,

    /// Import this private key instead of deriving the next account.
    #[arg(long, conflicts_with = "phrase")]
    pub private_key: Option<String>,

    /// Import from another recovery phrase instead of the wallet's own.
    #[arg(long)]
    pub phrase: Option<String>,

    /// Account index under `--phrase`.
    #[arg(long, default_value_t = 0, requires = "phrase")]
    pub index: u32,
}

#[derive(Parser, Debug)]
pub struct IdArgs {
    /// Account id, as printed by `accounts`.
    pub id: Uuid,
}

#[derive(Parser, Debug)]
pub struct RenameArgs {
    pub id: Uuid,
    pub name: String,
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ResetArgs {
    /// Confirm that the wallet should be erased.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Parser, Debug)]
pub struct FormatAmountArgs {
    /// Amount in base units.
    pub amount: String,

    #[arg(long, default_value_t = 8)]
    pub decimals: u8,

    /// Round to this many places with thousands separators. Without it the
    /// exact value is printed.
    #[arg(long)]
    pub places: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct AccountIdArgs {
    /// Principal in textual form.
    pub principal: String,

    /// Subaccount index.
    #[arg(long)]
    pub subaccount: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        FuseCli::command().debug_assert();
    }

    #[test]
    fn test_parse_format_amount() {
        let cli = FuseCli::try_parse_from([
            "fuse",
            "format-amount",
            "123456789012",
            "--places",
            "2",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::FormatAmount(args) => {
                assert_eq!(args.amount, "123456789012");
                assert_eq!(args.decimals, 8);
                assert_eq!(args.places, Some(2));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_wallet_commands_flattened() {
        let cli = FuseCli::try_parse_from(["fuse", "select", "67e55044-10b1-426f-9247-bb680e5fe0c8"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Wallet(WalletCommands::Select(IdArgs { .. }))
        ));

        let cli = FuseCli::try_parse_from(["fuse", "config", "-c", "wallet.json"]).unwrap();
        assert!(matches!(cli.command, Commands::Config));
        assert_eq!(cli.config.as_deref(), Some(std::path::Path::new("wallet.json")));
    }

    #[test]
    fn test_add_account_flags_conflict() {
        let parsed = FuseCli::try_parse_from([
            "fuse",
            "add-account",
            "--private-key",
            "00",
            "--phrase",
            "abandon",
        ]);
        assert!(parsed.is_err());
    }
}
