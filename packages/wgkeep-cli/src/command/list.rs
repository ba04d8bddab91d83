use clap::Parser;
use std::path::PathBuf;
use wgkeep_core::{Config, PeerManager};
use wgkeep_lib::util::init_logging;

#[derive(Debug, Parser, Clone)]
#[clap(name = "WgKeep list", about = "List managed peers.", version)]
pub struct Args {
    /// Config file.
    #[clap(short, long, help = "Config file.")]
    pub config: PathBuf,
}

pub async fn exec(args: Args) -> anyhow::Result<()> {
    init_logging().await?;

    let config = Config::try_from(&args.config)?;
    let manager = PeerManager::with_wg_quick(config);

    let peers = manager.list_peers()?;
    if peers.is_empty() {
        println!("No peers configured");
        return Ok(());
    }

    for (i, peer) in peers.iter().enumerate() {
        println!("{}. {} - {} ({})", i + 1, peer.name, peer.address, peer.public_key);
    }

    Ok(())
}
