//! Etomic CLI: command-line client for the escrow node.
//!
//! Subcommands: secret, keygen, status, payment, deposit, leg, deal,
//! relay-deal, ledger.

mod client;
mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use etomic_escrow::Leg;

/// Etomic: hash-time-locked escrow swaps.
#[derive(Parser, Debug)]
#[command(name = "etomic", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a secret and its hash commitment.
    Secret(commands::secret::SecretArgs),
    /// Create a signing key file.
    Keygen(commands::keygen::KeygenArgs),
    /// Query the status of a running node.
    Status(commands::status::StatusArgs),
    /// Single-leg HTLC payments.
    Payment(commands::payment::PaymentArgs),
    /// Deposit leg of a dual-timelock swap.
    Deposit(commands::leg::LegArgs),
    /// Payment leg of a dual-timelock swap.
    Leg(commands::leg::LegArgs),
    /// Two-secret deals.
    Deal(commands::deal::DealArgs),
    /// Relay-approved deals.
    RelayDeal(commands::relay_deal::RelayDealArgs),
    /// Reference ledger allowances and balances.
    Ledger(commands::ledger::LedgerArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Request tracing goes to stderr; RUST_LOG=debug shows it.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Secret(args) => commands::secret::run(args),
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Status(args) => commands::status::run(args).await,
        Commands::Payment(args) => commands::payment::run(args).await,
        Commands::Deposit(args) => commands::leg::run(Leg::Deposit, args).await,
        Commands::Leg(args) => commands::leg::run(Leg::Payment, args).await,
        Commands::Deal(args) => commands::deal::run(args).await,
        Commands::RelayDeal(args) => commands::relay_deal::run(args).await,
        Commands::Ledger(args) => commands::ledger::run(args).await,
    }
}
