use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use codehub_agent_client::{Client as AgentClient, CircuitBreakerConfig};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

mod args;
mod event_listener;
mod gc;
mod leader;
mod observer;
mod runtime;
mod tick;
mod ttl;
mod workspace_controller;

use args::CoordinatorArgs;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    codehub_common::init();
    tracing_subscriber::fmt::init();

    let args = Arc::new(CoordinatorArgs::parse());

    println!(
        "{}",
        "🚀 codehub-coordinator starting".green().bold()
    );

    let pool = codehub_common::postgres::create_pool(&args.postgres).await;
    let redis = codehub_common::redis::init_redis(&args.redis).await;

    let breaker_config = CircuitBreakerConfig {
        fails_to_open: args.circuit_breaker_fails,
        successes_to_close: args.circuit_breaker_successes,
        open_timeout: Duration::from_secs(args.circuit_breaker_timeout_secs),
    };
    let agent = AgentClient::with_breaker_config(
        &args.agent.agent_endpoint,
        args.agent.request_timeout(),
        breaker_config,
    );

    codehub_common::metrics::maybe_spawn_metrics_server();

    let cancel = CancellationToken::new();
    let shutdown_cancel = cancel.clone();
    tokio::spawn(async move {
        codehub_common::shutdown::shutdown_signal().await;
        shutdown_cancel.cancel();
    });

    let deps = runtime::Deps {
        pool,
        redis,
        redis_args: args.redis.clone(),
        agent,
        args: args.clone(),
    };

    let main_leader = {
        let deps = deps.clone();
        let cancel = cancel.clone();
        let pg_args = args.postgres.clone();
        leader::run_while_leader(
            cancel,
            pg_args,
            leader::LEADER_LOCK_KEY,
            "codehub-coordinator",
            move |leading_cancel| {
                let deps = deps.clone();
                async move { runtime::run_leading(leading_cancel, deps).await }
            },
        )
    };

    let event_listener_leader = {
        let deps = deps.clone();
        let cancel = cancel.clone();
        let pg_args = args.postgres.clone();
        leader::run_while_leader(
            cancel,
            pg_args,
            leader::EVENT_LISTENER_LOCK_KEY,
            "codehub-coordinator-event-listener",
            move |leading_cancel| {
                let deps = deps.clone();
                async move { runtime::run_event_listener_leading(leading_cancel, deps).await }
            },
        )
    };

    tokio::join!(main_leader, event_listener_leader);

    println!("{}", "🛑 codehub-coordinator stopped".red());
    Ok(())
}
