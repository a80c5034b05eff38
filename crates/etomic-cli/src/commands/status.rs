//! `etomic status`: query the status of a running node.

use clap::Args;
use serde::Deserialize;

use crate::client::{NodeArgs, NodeClient};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub node: NodeArgs,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    lock_unit: String,
    now: u64,
    deal_period: u64,
    safety_margin: u64,
    relay_address: Option<String>,
    escrow_account: String,
    uptime_secs: u64,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let client = NodeClient::new(&args.node);
    let status: StatusResponse = client.get("/status").await?;

    println!("Node Status:");
    println!("  Version:        {}", status.version);
    println!("  Lock unit:      {}", status.lock_unit);
    println!("  Now:            {}", status.now);
    println!("  Deal period:    {}", status.deal_period);
    println!("  Safety margin:  {}", status.safety_margin);
    println!("  Escrow:         {}", status.escrow_account);
    match status.relay_address {
        Some(relay) => println!("  Relay:          {}", relay),
        None => println!("  Relay:          (none)"),
    }
    println!("  Uptime:         {}s", status.uptime_secs);
    Ok(())
}
