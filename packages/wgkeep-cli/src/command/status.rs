use clap::Parser;
use std::path::PathBuf;
use wgkeep_core::{Config, PeerManager};
use wgkeep_lib::util::init_logging;

#[derive(Debug, Parser, Clone)]
#[clap(name = "WgKeep status", about = "Show live per-peer statistics.", version)]
pub struct Args {
    /// Config file.
    #[clap(short, long, help = "Config file.")]
    pub config: PathBuf,
}

pub async fn exec(args: Args) -> anyhow::Result<()> {
    init_logging().await?;

    let config = Config::try_from(&args.config)?;
    let manager = PeerManager::with_wg_quick(config);

    let status = manager.status().await?;
    println!("Interface {}", status.interface);

    for peer in &status.peers {
        let name = peer
            .name
            .as_ref()
            .map(|n| n.to_string())
            .unwrap_or_else(|| "(unmanaged)".to_string());
        let session = match peer.handshake_age {
            Some(age) => format!("handshake {}s ago", age.as_secs()),
            None => "never connected".to_string(),
        };
        let endpoint = peer.endpoint.as_deref().unwrap_or("-");
        println!(
            "{name}: {session}, endpoint {endpoint}, rx {} tx {} ({})",
            peer.rx_bytes, peer.tx_bytes, peer.public_key
        );
    }

    Ok(())
}
