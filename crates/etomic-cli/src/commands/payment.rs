//! `etomic payment`: single-leg HTLC payments.

use clap::{Args, Subcommand};

use etomic_core::{Address, Amount, Asset, Commitment, SwapId};
use etomic_crypto::{HashAlgorithm, Operation, Secret};
use etomic_escrow::{PaymentRecord, PaymentRequest, RefundRequest, SpendRequest};

use crate::client::{
    attached_value, parse_algorithm, parse_commitment, parse_secret, NodeArgs, NodeClient,
    RecordResponse, SignerArgs,
};

#[derive(Args, Debug)]
pub struct PaymentArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(subcommand)]
    pub action: PaymentCommand,
}

#[derive(Subcommand, Debug)]
pub enum PaymentCommand {
    /// Lock funds for a receiver behind a hash and an expiry.
    Pay {
        #[command(flatten)]
        signer: SignerArgs,
        #[arg(long)]
        id: SwapId,
        #[arg(long)]
        receiver: Address,
        #[arg(long)]
        amount: Amount,
        /// `native` or a token contract address.
        #[arg(long, default_value = "native")]
        asset: Asset,
        /// Height or timestamp after which the sender may refund.
        #[arg(long)]
        lock_expiry: u64,
        #[arg(long, default_value = "dhash160", value_parser = parse_algorithm)]
        algorithm: HashAlgorithm,
        #[arg(long, value_parser = parse_commitment)]
        commitment: Commitment,
    },
    /// Claim a payment as its receiver by revealing the secret.
    Spend {
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
        sender: Address,
    },
    /// Take a payment back as its sender once the lock has expired.
    Refund {
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
        receiver: Address,
    },
    /// Show a stored payment.
    Show {
        #[arg(long)]
        id: SwapId,
    },
}

pub async fn run(args: &PaymentArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);

    match &args.action {
        PaymentCommand::Pay {
            signer,
            id,
            receiver,
            amount,
            asset,
            lock_expiry,
            algorithm,
            commitment,
        } => {
            let request = PaymentRequest {
                id: *id,
                receiver: *receiver,
                amount: *amount,
                asset: *asset,
                lock_expiry: *lock_expiry,
                algorithm: algorithm.code(),
                commitment: commitment.clone(),
            };
            let resp: RecordResponse<PaymentRecord> = client
                .post_signed(
                    "/payments",
                    Operation::Pay,
                    &request,
                    attached_value(asset, *amount),
                    &signer.keypair()?,
                )
                .await?;
            println!("Payment sent!");
            print_payment(&resp);
        }
        PaymentCommand::Spend {
            signer,
            id,
            amount,
            secret,
            asset,
            sender,
        } => {
            let request = SpendRequest {
                id: *id,
                amount: *amount,
                secret: secret.clone(),
                asset: *asset,
                sender: *sender,
            };
            let resp: RecordResponse<PaymentRecord> = client
                .post_signed(
                    &format!("/payments/{}/spend", id),
                    Operation::SpendPayment,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Payment spent!");
            print_payment(&resp);
        }
        PaymentCommand::Refund {
            signer,
            id,
            amount,
            commitment,
            asset,
            receiver,
        } => {
            let request = RefundRequest {
                id: *id,
                amount: *amount,
                commitment: commitment.clone(),
                asset: *asset,
                receiver: *receiver,
            };
            let resp: RecordResponse<PaymentRecord> = client
                .post_signed(
                    &format!("/payments/{}/refund", id),
                    Operation::RefundPayment,
                    &request,
                    0,
                    &signer.keypair()?,
                )
                .await?;
            println!("Payment refunded!");
            print_payment(&resp);
        }
        PaymentCommand::Show { id } => {
            let resp: RecordResponse<PaymentRecord> =
                client.get(&format!("/payments/{}", id)).await?;
            print_payment(&resp);
        }
    }

    Ok(())
}

fn print_payment(resp: &RecordResponse<PaymentRecord>) {
    let record = &resp.record;
    println!("  ID:           {}", resp.id);
    println!("  Status:       {}", record.status);
    println!("  Sender:       {}", record.sender);
    println!("  Receiver:     {}", record.receiver);
    println!("  Asset:        {}", record.asset);
    println!("  Amount:       {}", record.amount);
    println!("  Lock expiry:  {}", record.lock_expiry);
    println!("  Algorithm:    {}", record.algorithm);
    println!("  Commitment:   {}", record.commitment);
}
