//! `etomic deposit` and `etomic leg`: the two legs of a dual-timelock swap.
//!
//! Both legs share one command shape; only the route prefix differs.

use clap::{Args, Subcommand};

use etomic_core::{Address, Amount, Asset, Commitment, SwapId};
use etomic_crypto::{Operation, Secret};
use etomic_escrow::{Leg, LegClaimRequest, LegReclaimRequest, LegRecord, LegRequest};

use crate::client::{
    attached_value, parse_commitment, parse_secret, NodeArgs, NodeClient, RecordResponse,
    SignerArgs,
};

#[derive(Args, Debug)]
pub struct LegArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub action: LegCommand,
}

#[derive(Subcommand, Debug)]
pub enum LegCommand {
    /// Lock funds for a counterparty.
    Make {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        counterparty: Address,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "native")]
        asset: Asset,
        #[arg(long, value_parser = parse_commitment)]
        commitment: Commitment,
    },
    /// Claim as the counterparty by revealing the secret.
    Claim {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        amount: Amount,
        #[arg(long, value_parser = parse_secret)]
        secret: Secret,
        #[arg(long, default_value = "native")]
        asset: Asset,
        #[arg(long)]
        owner: Address,
    },
    /// Take the funds back as the owner after the lock expires.
    Reclaim {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        amount: Amount,
        #[arg(long, value_parser = parse_commitment)]
        commitment: Commitment,
        #[arg(long, default_value = "native")]
        asset: Asset,
        #[arg(long)]
        counterparty: Address,
    },
    /// Show a stored leg.
    Show {
        #[arg(long)]
        id: SwapId,
    },
}

fn route(leg: Leg) -> &'static str {
    match leg {
        Leg::Deposit => "/deposits",
        Leg::Payment => "/legs",
    }
}

/// Signed operations for making, claiming and reclaiming `leg`.
fn operations(leg: Leg) -> (Operation, Operation, Operation) {
    match leg {
        Leg::Deposit => (
            Operation::MakeDeposit,
            Operation::ClaimDeposit,
            Operation::ReclaimDeposit,
        ),
        Leg::Payment => (
            Operation::MakeLegPayment,
            Operation::ClaimLegPayment,
            Operation::ReclaimLegPayment,
        ),
    }
}

pub async fn run(leg: Leg, args: &LegArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);
    let base = route(leg);
    let (make, claim, reclaim) = operations(leg);

    match &args.action {
        LegCommand::Make {
            signer,
            id,
            counterparty,
            amount,
            asset,
            commitment,
        } => {
            let request = LegRequest {
                id: *id,
                counterparty: *counterparty,
                amount: *amount,
                asset: *asset,
                commitment: commitment.clone(),
            };
            let resp: RecordResponse<LegRecord> = client
                .post_signed(
                    base,
                    make,
                    &request,
                    attached_value(asset, *amount),
                    &signer.keypair()?,
                )
                .await?;
            println!("Leg made ({})!", leg);
            print_leg(&resp);
        }
        LegCommand::Claim {
            signer,
            id,
            amount,
            secret,
            asset,
            owner,
        } => {
            let request = LegClaimRequest {
                id: *id,
                amount: *amount,
                secret: secret.clone(),
                asset: *asset,
                owner: *owner,
            };
            let resp: RecordResponse<LegRecord> = client
                .post_signed(
                    &format!("{}/{}/claim", base, id),
                    claim,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Leg claimed ({})!", leg);
            print_leg(&resp);
        }
        LegCommand::Reclaim {
            signer,
            id,
            amount,
            commitment,
            asset,
            counterparty,
        } => {
            let request = LegReclaimRequest {
                id: *id,
                amount: *amount,
                commitment: commitment.clone(),
                asset: *asset,
                counterparty: *counterparty,
            };
            let resp: RecordResponse<LegRecord> = client
                .post_signed(
                    &format!("{}/{}/reclaim", base, id),
                    reclaim,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Leg reclaimed ({})!", leg);
            print_leg(&resp);
        }
        LegCommand::Show { id } => {
            let resp: RecordResponse<LegRecord> =
                client.get(&format!("{}/{}", base, id)).await?;
            print_leg(&resp);
        }
    }

    Ok(())
}

fn print_leg(resp: &RecordResponse<LegRecord>) {
    let record = &resp.record;
    println!("  ID:            {}", resp.id);
    println!("  Status:        {}", record.status);
    println!("  Owner:         {}", record.owner);
    println!("  Counterparty:  {}", record.counterparty);
    println!("  Asset:         {}", record.asset);
    println!("  Amount:        {}", record.amount);
    println!("  Funded at:     {}", record.funded_at);
    println!("  Lock expiry:   {}", record.lock_expiry);
    println!("  Commitment:    {}", record.commitment);
}
