pub(crate) use crate::command::{add, export, list, remove, status};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[clap(name = "WgKeep", about = "WgKeep VPN Peer Manager", version)]
pub struct Opt {
    /// The command to run
    #[clap(subcommand)]
    pub command: WgKeepCli,
}

#[derive(Subcommand, Debug)]
pub enum WgKeepCli {
    #[clap(name = "add", about = "Register a new peer and reload the interface.")]
    Add(add::Args),
    #[clap(name = "remove", about = "Remove a peer and reload the interface.")]
    Remove(remove::Args),
    #[clap(name = "list", about = "List managed peers.")]
    List(list::Args),
    #[clap(name = "status", about = "Show live per-peer statistics.")]
    Status(status::Args),
    #[clap(name = "export", about = "Export a peer's connection profile.")]
    Export(export::Args),
}

pub async fn run_cli() -> Result<(), anyhow::Error> {
    let opt = Opt::parse();

    match opt.command {
        WgKeepCli::Add(command) => add::exec(command).await,
        WgKeepCli::Remove(command) => remove::exec(command).await,
        WgKeepCli::List(command) => list::exec(command).await,
        WgKeepCli::Status(command) => status::exec(command).await,
        WgKeepCli::Export(command) => export::exec(command).await,
    }
}
