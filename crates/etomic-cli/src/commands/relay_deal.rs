//! `etomic relay-deal`: deals settled by relay approval.

use clap::{Args, Subcommand};
use serde::Deserialize;

use etomic_core::{Address, Amount, Asset, ForeignTxRef, SwapId};
use etomic_crypto::Operation;
use etomic_escrow::{
    ApprovalSignal, DealRef, ReceiverClaim, RelayDealRecord, RelayDealRequest,
};

use crate::client::{attached_value, NodeArgs, NodeClient, RecordResponse, SignerArgs};

#[derive(Args, Debug)]
pub struct RelayDealArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub action: RelayDealCommand,
}

#[derive(Subcommand, Debug)]
pub enum RelayDealCommand {
    /// Lock funds for a receiver pending foreign-ledger confirmation.
    Init {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        receiver: Address,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "native")]
        asset: Asset,
    },
    /// Release the funds to the receiver as the initiator.
    Confirm {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
    },
    /// Claim as the receiver, pointing the relay at the foreign payment.
    Claim {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        /// Transaction on the foreign ledger that pays the initiator.
        #[arg(long)]
        foreign_tx: String,
    },
    /// Approve a pending claim as the relay.
    Approve {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
    },
    /// Take the funds back as the initiator after the claim window.
    Refund {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
    },
    /// Show a stored relay deal.
    Show {
        #[arg(long)]
        id: SwapId,
    },
    /// List claims waiting for relay approval.
    Approvals,
}

#[derive(Deserialize)]
struct ApprovalsResponse {
    approvals: Vec<ApprovalSignal>,
    count: usize,
}

pub async fn run(args: &RelayDealArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);

    let (title, resp): (&str, RecordResponse<RelayDealRecord>) = match &args.action {
        RelayDealCommand::Init {
            signer,
            id,
            receiver,
            amount,
            asset,
        } => {
            let request = RelayDealRequest {
                id: *id,
                receiver: *receiver,
                amount: *amount,
                asset: *asset,
            };
            let resp = client
                .post_signed(
                    "/relay-deals",
                    Operation::InitRelayDeal,
                    &request,
                    attached_value(asset, *amount),
                    &signer.keypair()?,
                )
                .await?;
            ("Relay deal initialized!", resp)
        }
        RelayDealCommand::Confirm { signer, id } => {
            let resp = client
                .post_signed(
                    &format!("/relay-deals/{}/confirm", id),
                    Operation::ConfirmRelayDeal,
                    &DealRef { id: *id },
                    0,
                    &signer.keypair()?,
                )
                .await?;
            ("Relay deal confirmed!", resp)
        }
        RelayDealCommand::Claim {
            signer,
            id,
            foreign_tx,
        } => {
            let claim = ReceiverClaim {
                id: *id,
                foreign_tx: ForeignTxRef::new(foreign_tx.as_str()),
            };
            let signal: ApprovalSignal = client
                .post_signed(
                    &format!("/relay-deals/{}/claim", id),
                    Operation::ClaimRelayDeal,
                    &claim,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Claim submitted, waiting for relay approval.");
            print_signal(&signal);
            return Ok(());
        }
        RelayDealCommand::Approve { signer, id } => {
            let resp = client
                .post_signed(
                    &format!("/relay-deals/{}/approve", id),
                    Operation::ApproveRelayDeal,
                    &DealRef { id: *id },
                    0,
                    &signer.keypair()?,
                )
                .await?;
            ("Relay deal approved!", resp)
        }
        RelayDealCommand::Refund { signer, id } => {
            let resp = client
                .post_signed(
                    &format!("/relay-deals/{}/refund", id),
                    Operation::RefundRelayDeal,
                    &DealRef { id: *id },
                    0,
                    &signer.keypair()?,
                )
                .await?;
            ("Relay deal refunded!", resp)
        }
        RelayDealCommand::Show { id } => (
            "Relay deal:",
            client.get(&format!("/relay-deals/{}", id)).await?,
        ),
        RelayDealCommand::Approvals => {
            let pending: ApprovalsResponse = client.get("/approvals").await?;
            if pending.count == 0 {
                println!("No claims waiting for approval.");
            } else {
                println!("{} claim(s) waiting for approval:", pending.count);
                for signal in &pending.approvals {
                    print_signal(signal);
                }
            }
            return Ok(());
        }
    };

    let record = &resp.record;
    println!("{}", title);
    println!("  ID:           {}", resp.id);
    println!("  Status:       {}", record.status);
    println!("  Initiator:    {}", record.initiator);
    println!("  Receiver:     {}", record.receiver);
    println!("  Asset:        {}", record.asset);
    println!("  Amount:       {}", record.amount);
    println!("  Claim until:  {}", record.claim_until);
    Ok(())
}

fn print_signal(signal: &ApprovalSignal) {
    println!("  ID:          {}", signal.id);
    println!("  Foreign tx:  {}", signal.foreign_tx);
    println!("  Raised at:   {}", signal.raised_at);
}
