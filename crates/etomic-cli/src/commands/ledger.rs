//! `etomic ledger`: the node's reference asset ledger.

use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};

use etomic_core::{Address, Amount, Asset};
use etomic_crypto::Operation;

use crate::client::{NodeArgs, NodeClient, SignerArgs};

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub action: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// Allow a spender (the escrow account by default) to pull tokens.
    Approve {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        token: Address,
        #[arg(long)]
        spender: Option<Address>,
        #[arg(long)]
        amount: Amount,
    },
    /// Show an account's balance.
    Balance {
        #[arg(long)]
        account: Address,
        #[arg(long, default_value = "native")]
        asset: Asset,
    },
}

#[derive(Serialize)]
struct AllowanceRequest {
    token: Address,
    spender: Option<Address>,
    amount: Amount,
}

#[derive(Deserialize)]
struct AllowanceResponse {
    token: Address,
    owner: Address,
    spender: Address,
    allowance: Amount,
}

#[derive(Serialize)]
struct BalanceQuery {
    account: Address,
    asset: Asset,
}

#[derive(Deserialize)]
struct BalanceResponse {
    account: Address,
    asset: Asset,
    balance: Amount,
}

pub async fn run(args: &LedgerArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);

    match &args.action {
        LedgerCommand::Approve {
            signer,
            token,
            spender,
            amount,
        } => {
            let request = AllowanceRequest {
                token: *token,
                spender: *spender,
                amount: *amount,
            };
            let resp: AllowanceResponse = client
                .post_signed(
                    "/ledger/approve",
                    Operation::LedgerApprove,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Allowance set!");
            println!("  Token:      {}", resp.token);
            println!("  Owner:      {}", resp.owner);
            println!("  Spender:    {}", resp.spender);
            println!("  Allowance:  {}", resp.allowance);
        }
        LedgerCommand::Balance { account, asset } => {
            let query = BalanceQuery {
                account: *account,
                asset: *asset,
            };
            let resp: BalanceResponse = client.get_query("/ledger/balance", &query).await?;
            println!("Balance:");
            println!("  Account:  {}", resp.account);
            println!("  Asset:    {}", resp.asset);
            println!("  Balance:  {}", resp.balance);
        }
    }

    Ok(())
}
