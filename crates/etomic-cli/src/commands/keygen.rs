//! `etomic keygen`: create a signing key file.

use std::path::PathBuf;

use clap::Args;

use etomic_crypto::KeyPair;

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// File to write the hex-encoded key to.
    #[arg(short, long)]
    pub out: PathBuf,

    /// Overwrite an existing key file.
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &KeygenArgs) -> anyhow::Result<()> {
    if args.out.exists() && !args.force {
        anyhow::bail!(
            "{} already exists (pass --force to overwrite)",
            args.out.display()
        );
    }
    let keypair = KeyPair::generate();
    if let Some(parent) = args.out.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(&args.out, hex::encode(keypair.secret_bytes()))?;

    println!("Key written to {}", args.out.display());
    println!("  Address:     {}", keypair.address());
    println!("  Public key:  {}", keypair.public_key().to_hex());
    Ok(())
}
