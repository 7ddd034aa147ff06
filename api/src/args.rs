use clap::Parser;
use codehub_common::args::{PostgresArgs, RedisArgs};

/// Process-wide configuration for the HTTP surface, parsed once in `main` (§12).
#[derive(Parser, Debug, Clone)]
pub struct ApiArgs {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub redis: RedisArgs,

    #[arg(long, env = "API_PORT", default_value_t = 8080)]
    pub port: u16,

    /// UI keep-alive. Default 30s.
    #[arg(long, env = "SSE_HEARTBEAT_INTERVAL", default_value_t = 30)]
    pub sse_heartbeat_interval_secs: u64,
}
