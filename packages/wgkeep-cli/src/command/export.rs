use clap::Parser;
use std::path::PathBuf;
use wgkeep_core::{Config, PeerManager};
use wgkeep_lib::util::init_logging;

#[derive(Debug, Parser, Clone)]
#[clap(name = "WgKeep export", about = "Export a peer's connection profile.", version)]
pub struct Args {
    /// Config file.
    #[clap(short, long, help = "Config file.")]
    pub config: PathBuf,

    /// Peer name.
    #[clap(short, long, help = "Peer name.")]
    pub name: String,

    /// Where to write the QR image.
    #[clap(long, help = "Write the scannable QR PNG to this path.")]
    pub qr: Option<PathBuf>,
}

pub async fn exec(args: Args) -> anyhow::Result<()> {
    init_logging().await?;

    let config = Config::try_from(&args.config)?;
    let manager = PeerManager::with_wg_quick(config);

    let (profile, image) = manager.export(&args.name)?;
    println!("{profile}");

    if let Some(path) = args.qr {
        std::fs::write(&path, image)?;
        tracing::info!("Wrote QR image to {}", path.display());
    }

    Ok(())
}
