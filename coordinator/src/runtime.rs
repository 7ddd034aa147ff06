use std::time::Duration;

use codehub_agent_client::Client as AgentClient;
use codehub_common::args::RedisArgs;
use codehub_repository::workspaces;
use deadpool_postgres::Pool;
use deadpool_redis::Pool as RedisPool;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::args::CoordinatorArgs;
use crate::{event_listener, gc, observer, tick, ttl, workspace_controller};

/// Runs the Observer/WC/TTL/GC tick loops for as long as this process holds that leadership
/// (§4.7). Spawned fresh each time `leader::run_while_leader` calls back in; `cancel` fires
/// both when this process steps down and on process shutdown. EventListener is NOT part of
/// this group — it runs under its own, independently-elected leader (see
/// `run_event_listener_leading`).
pub async fn run_leading(cancel: CancellationToken, deps: Deps) {
    let (wc_wake_tx, _) = broadcast::channel(16);
    let (observer_wake_tx, _) = broadcast::channel(16);

    let wc_wake_sub = tokio::spawn(codehub_broker::wake::subscribe_wc(
        cancel.clone(),
        deps.redis_args.clone(),
        wc_wake_tx.clone(),
    ));
    let observer_wake_sub = tokio::spawn(codehub_broker::wake::subscribe_observer(
        cancel.clone(),
        deps.redis_args.clone(),
        observer_wake_tx.clone(),
    ));

    let observer_loop = tokio::spawn(run_observer(cancel.clone(), deps.clone(), observer_wake_tx.subscribe()));
    let wc_loop = tokio::spawn(run_workspace_controller(cancel.clone(), deps.clone(), wc_wake_tx.subscribe()));
    let ttl_loop = tokio::spawn(run_ttl(cancel.clone(), deps.clone()));
    let gc_loop = tokio::spawn(run_gc(cancel.clone(), deps.clone()));

    let _ = tokio::join!(wc_wake_sub, observer_wake_sub, observer_loop, wc_loop, ttl_loop, gc_loop,);
}

/// Runs the EventListener loop for as long as this process holds its own, separately-elected
/// leadership (§2/§4.5). Kept apart from `run_leading` so the `LISTEN` session's leader and
/// the Observer/WC/TTL/GC leader can be two different replicas.
pub async fn run_event_listener_leading(cancel: CancellationToken, deps: Deps) {
    run_event_listener(cancel, deps).await;
}

/// Everything a tick loop needs, cloned cheaply per loop.
#[derive(Clone)]
pub struct Deps {
    pub pool: Pool,
    pub redis: RedisPool,
    pub redis_args: RedisArgs,
    pub agent: AgentClient,
    pub args: std::sync::Arc<CoordinatorArgs>,
}

/// How recently a wake hint must have landed to still count as "active" per §4.2's tick
/// cadence ("a wake-hint has arrived within the last ~30s").
const WAKE_RECENCY_WINDOW: Duration = Duration::from_secs(30);

async fn run_observer(cancel: CancellationToken, deps: Deps, mut wake_rx: broadcast::Receiver<bytes::Bytes>) {
    tick::startup_delay(&cancel).await;
    let mut attempt = 0usize;
    let mut last_wake: Option<tokio::time::Instant> = None;
    loop {
        match observer::tick(&deps.pool, &deps.agent).await {
            Ok(n) => {
                attempt = 0;
                tracing::debug!(observed = n, "observer tick complete");
            }
            Err(e) => {
                warn!(error = %e, "observer tick failed");
                attempt += 1;
                tokio::time::sleep(tick::tick_retry_delay(attempt)).await;
            }
        }

        let in_flight = workspaces::has_in_flight_operation(&deps.pool).await.unwrap_or(false);
        let recently_woken = last_wake.is_some_and(|t| t.elapsed() < WAKE_RECENCY_WINDOW);
        let interval = if in_flight || recently_woken {
            deps.args.active_interval()
        } else {
            deps.args.idle_interval()
        };

        match tick::wait_for_wake_or_interval(&cancel, &mut wake_rx, interval).await {
            tick::WaitOutcome::Cancelled => return,
            tick::WaitOutcome::Woken => last_wake = Some(tokio::time::Instant::now()),
            tick::WaitOutcome::TimerFired => {}
        }
    }
}

async fn run_workspace_controller(
    cancel: CancellationToken,
    deps: Deps,
    mut wake_rx: broadcast::Receiver<bytes::Bytes>,
) {
    tick::startup_delay(&cancel).await;
    let mut attempt = 0usize;
    let mut last_wake: Option<tokio::time::Instant> = None;
    loop {
        match workspace_controller::tick(
            &deps.pool,
            &deps.redis,
            &deps.agent,
            deps.args.max_retry,
            &deps.args.operation_timeouts(),
        )
        .await
        {
            Ok(()) => attempt = 0,
            Err(e) => {
                warn!(error = %e, "workspace controller tick failed");
                attempt += 1;
                tokio::time::sleep(tick::tick_retry_delay(attempt)).await;
            }
        }

        // §4.2 "Tick cadence": active polling while any workspace has an operation in flight,
        // or a wake hint landed within the last ~30s; idle polling otherwise.
        let in_flight = workspaces::has_in_flight_operation(&deps.pool).await.unwrap_or(false);
        let recently_woken = last_wake.is_some_and(|t| t.elapsed() < WAKE_RECENCY_WINDOW);
        let interval = if in_flight || recently_woken {
            deps.args.active_interval()
        } else {
            deps.args.idle_interval()
        };

        match tick::wait_for_wake_or_interval(&cancel, &mut wake_rx, interval).await {
            tick::WaitOutcome::Cancelled => return,
            tick::WaitOutcome::Woken => last_wake = Some(tokio::time::Instant::now()),
            tick::WaitOutcome::TimerFired => {}
        }
    }
}

async fn run_ttl(cancel: CancellationToken, deps: Deps) {
    tick::startup_delay(&cancel).await;
    let mut attempt = 0usize;
    loop {
        let standby = deps.args.ttl_standby_seconds;
        let archive = deps.args.ttl_archive_seconds;
        match ttl::tick(&deps.pool, &deps.redis, standby, archive).await {
            Ok(()) => attempt = 0,
            Err(e) => {
                warn!(error = %e, "ttl tick failed");
                attempt += 1;
                tokio::time::sleep(tick::tick_retry_delay(attempt)).await;
            }
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(deps.args.ttl_interval()) => {}
        }
    }
}

async fn run_gc(cancel: CancellationToken, deps: Deps) {
    tick::startup_delay(&cancel).await;
    loop {
        if let Err(e) = gc::tick(
            &deps.pool,
            &deps.agent,
            deps.args.gc_retention_count,
            deps.args.gc_orphan_grace(),
        )
        .await
        {
            warn!(error = %e, "gc tick failed");
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(deps.args.gc_interval()) => {}
        }
    }
}

async fn run_event_listener(cancel: CancellationToken, deps: Deps) {
    tick::startup_delay(&cancel).await;
    loop {
        let pg_args = deps.args.postgres.clone();
        match event_listener::run(cancel.clone(), pg_args, deps.redis.clone()).await {
            Ok(()) => {}
            Err(e) => warn!(error = %e, "event listener session ended"),
        }
        if cancel.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
        }
    }
}
