use anyhow::Result;
use clap::Parser;

mod archive;
mod args;
mod restore;
mod s3;

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    codehub_common::init();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Archive(args) => archive::run(&args).await,
        Commands::Restore(args) => restore::run(&args).await,
    }
}
