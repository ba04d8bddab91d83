use clap::Parser;
use std::path::PathBuf;
use wgkeep_core::{Config, PeerManager, ReloadOutcome};
use wgkeep_lib::util::init_logging;

#[derive(Debug, Parser, Clone)]
#[clap(name = "WgKeep remove", about = "Remove a peer.", version)]
pub struct Args {
    /// Config file.
    #[clap(short, long, help = "Config file.")]
    pub config: PathBuf,

    /// Peer name.
    #[clap(short, long, help = "Peer name.")]
    pub name: String,
}

pub async fn exec(args: Args) -> anyhow::Result<()> {
    init_logging().await?;

    let config = Config::try_from(&args.config)?;
    let manager = PeerManager::with_wg_quick(config);

    let outcome = manager.remove_peer(&args.name).await?;
    println!("Removed peer {}", args.name);

    if let ReloadOutcome::Deferred { reason } = outcome.reload {
        eprintln!("Peer removed from config but the interface reload failed: {reason}");
        eprintln!("Run a manual reload to drop the live session.");
    }

    Ok(())
}
