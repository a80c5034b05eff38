//! `etomic deal`: two-secret deals without a timelock.

use clap::{Args, Subcommand};

use etomic_core::{Address, Amount, Asset, Commitment, SwapId};
use etomic_crypto::{Operation, Secret};
use etomic_escrow::{CounterpartyDealClaim, DealRecord, DealRequest, InitiatorDealClaim};

use crate::client::{
    attached_value, parse_commitment, parse_secret, NodeArgs, NodeClient, RecordResponse,
    SignerArgs,
};

#[derive(Args, Debug)]
pub struct DealArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub action: DealCommand,
}

#[derive(Subcommand, Debug)]
pub enum DealCommand {
    /// Lock funds behind both parties' commitments.
    Init {
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
        /// Commitment to the initiator's secret (dhash160).
        #[arg(long, value_parser = parse_commitment)]
        initiator_commitment: Commitment,
        /// Commitment to the counterparty's secret (dhash160).
        #[arg(long, value_parser = parse_commitment)]
        counterparty_commitment: Commitment,
    },
    /// Claim as the counterparty with the initiator's secret.
    CounterpartyClaim {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "native")]
        asset: Asset,
        #[arg(long)]
        initiator: Address,
        #[arg(long, value_parser = parse_commitment)]
        counterparty_commitment: Commitment,
        #[arg(long, value_parser = parse_secret)]
        secret: Secret,
    },
    /// Claim back as the initiator with the counterparty's secret.
    InitiatorClaim {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        amount: Amount,
        #[arg(long, default_value = "native")]
        asset: Asset,
        #[arg(long)]
        counterparty: Address,
        #[arg(long, value_parser = parse_commitment)]
        initiator_commitment: Commitment,
        #[arg(long, value_parser = parse_secret)]
        secret: Secret,
    },
    /// Show a stored deal.
    Show {
        #[arg(long)]
        id: SwapId,
    },
}

pub async fn run(args: &DealArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);

    let (title, resp): (&str, RecordResponse<DealRecord>) = match &args.action {
        DealCommand::Init {
            signer,
            id,
            counterparty,
            amount,
            asset,
            initiator_commitment,
            counterparty_commitment,
        } => {
            let request = DealRequest {
                id: *id,
                counterparty: *counterparty,
                amount: *amount,
                asset: *asset,
                initiator_commitment: initiator_commitment.clone(),
                counterparty_commitment: counterparty_commitment.clone(),
            };
            let resp = client
                .post_signed(
                    "/deals",
                    Operation::InitDeal,
                    &request,
                    attached_value(asset, *amount),
                    &signer.keypair()?,
                )
                .await?;
            ("Deal initialized!", resp)
        }
        DealCommand::CounterpartyClaim {
            signer,
            id,
            amount,
            asset,
            initiator,
            counterparty_commitment,
            secret,
        } => {
            let request = CounterpartyDealClaim {
                id: *id,
                amount: *amount,
                asset: *asset,
                initiator: *initiator,
                counterparty_commitment: counterparty_commitment.clone(),
                secret: secret.clone(),
            };
            let resp = client
                .post_signed(
                    &format!("/deals/{}/counterparty-claim", id),
                    Operation::CounterpartyClaimDeal,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            ("Deal paid to counterparty!", resp)
        }
        DealCommand::InitiatorClaim {
            signer,
            id,
            amount,
            asset,
            counterparty,
            initiator_commitment,
            secret,
        } => {
            let request = InitiatorDealClaim {
                id: *id,
                amount: *amount,
                asset: *asset,
                counterparty: *counterparty,
                initiator_commitment: initiator_commitment.clone(),
                secret: secret.clone(),
            };
            let resp = client
                .post_signed(
                    &format!("/deals/{}/initiator-claim", id),
                    Operation::InitiatorClaimDeal,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            ("Deal paid to initiator!", resp)
        }
        DealCommand::Show { id } => ("Deal:", client.get(&format!("/deals/{}", id)).await?),
    };

    let record = &resp.record;
    println!("{}", title);
    println!("  ID:                       {}", resp.id);
    println!("  Status:                   {}", record.status);
    println!("  Initiator:                {}", record.initiator);
    println!("  Counterparty:             {}", record.counterparty);
    println!("  Asset:                    {}", record.asset);
    println!("  Amount:                   {}", record.amount);
    println!("  Initiator commitment:     {}", record.initiator_commitment);
    println!("  Counterparty commitment:  {}", record.counterparty_commitment);
    Ok(())
}
