use clap::Parser;
use owo_colors::OwoColorize;

mod args;
mod auth;
mod handlers;
mod server;
mod sse;
mod state;

use args::ApiArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    codehub_common::init();
    tracing_subscriber::fmt::init();

    let args = ApiArgs::parse();

    println!("{}", "🚀 codehub-api starting".green().bold());

    codehub_common::metrics::maybe_spawn_metrics_server();

    server::run_server(args).await?;

    println!("{}", "🛑 codehub-api stopped".red());
    Ok(())
}
