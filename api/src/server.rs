use anyhow::{Context, Result};
use axum::Router;
use axum::middleware;
use axum::routing::get;
use codehub_common::cors;
use codehub_common::request_context;
use codehub_common::shutdown::shutdown_signal;
use std::net::SocketAddr;

use crate::args::ApiArgs;
use crate::handlers;
use crate::state::AppState;

/// Assembles and runs the HTTP surface (§12), grounded on `meta::server::run_server`'s
/// pool-init/schema-init/serve shape.
pub async fn run_server(args: ApiArgs) -> Result<()> {
    let pool = codehub_common::postgres::create_pool(&args.postgres).await;
    codehub_repository::init_schema(&pool)
        .await
        .context("failed to initialize database schema")?;
    let redis = codehub_common::redis::init_redis(&args.redis).await;

    let state = AppState {
        pool,
        redis,
        redis_args: args.redis.clone(),
        heartbeat_interval_secs: args.sse_heartbeat_interval_secs,
    };

    let app = Router::new()
        .route("/healthz", get(handlers::health))
        .route("/readyz", get(handlers::health))
        .route(
            "/api/v1/workspaces",
            get(handlers::list_workspaces).post(handlers::create_workspace),
        )
        .route(
            "/api/v1/workspaces/{id}",
            get(handlers::get_workspace)
                .patch(handlers::update_workspace)
                .delete(handlers::delete_workspace),
        )
        .route("/api/v1/events", get(crate::sse::events))
        .layer(middleware::from_fn(request_context::middleware::create_context))
        .layer(cors::dev())
        .with_state(state);

    let addr: SocketAddr = format!("0.0.0.0:{}", args.port).parse()?;
    tracing::info!(%addr, "starting codehub-api HTTP server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped gracefully");
    Ok(())
}
