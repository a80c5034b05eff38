//! `etomic secret`: generate a fresh secret and its commitment.

use clap::Args;

use etomic_crypto::{generate_secret, HashAlgorithm};

use crate::client::parse_algorithm;

#[derive(Args, Debug)]
pub struct SecretArgs {
    /// Hash algorithm (dhash160, sha256, keccak256, or its code 0-2).
    #[arg(short, long, default_value = "dhash160", value_parser = parse_algorithm)]
    pub algorithm: HashAlgorithm,
}

pub fn run(args: &SecretArgs) -> anyhow::Result<()> {
    let (secret, commitment) = generate_secret(args.algorithm);
    println!("Secret generated!");
    println!("  Algorithm:   {} (code {})", args.algorithm, args.algorithm.code());
    println!("  Secret:      {}", secret.to_hex());
    println!("  Commitment:  {}", commitment);
    println!();
    println!("Keep the secret private until you claim.");
    Ok(())
}
