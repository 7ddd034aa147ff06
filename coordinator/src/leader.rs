use std::time::Duration;

use codehub_common::args::PostgresArgs;
use codehub_repository::advisory_lock;
use owo_colors::OwoColorize;
use tokio_postgres::Client;
use tokio_util::sync::CancellationToken;

/// Well-known advisory-lock key electing the leader of the Observer/WC/TTL/GC loops (§4.7).
/// Any 64-bit constant works as long as every replica agrees on it; this one has no meaning
/// beyond uniqueness.
pub const LEADER_LOCK_KEY: i64 = 0x636f_6465_6875_6221;

/// Separate advisory-lock key electing the EventListener leader (§2/§4.5: EventListener holds
/// "a dedicated leader, separate advisory lock" so a `LISTEN` session can be held independently
/// of whichever replica is driving Observer/WC/TTL/GC).
pub const EVENT_LISTENER_LOCK_KEY: i64 = 0x636f_6465_6875_6222;

/// How often a non-leader retries acquiring the lock, and how often the leader re-verifies
/// it still holds the connection that took it.
const RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// Holds the dedicated connection backing the advisory lock for as long as this process
/// leads. Dropping it (or losing the connection) releases the lock (§4.7: "the lock is
/// always released by connection loss").
pub struct Leadership {
    client: Client,
}

impl Leadership {
    /// Re-verifies this process is still leader, within the ~2s tick budget (§4.7). Callers
    /// should skip their tick and fall back to `try_acquire` on a `false` return.
    pub async fn still_held(&self) -> bool {
        advisory_lock::still_held(&self.client).await.unwrap_or(false)
    }
}

/// Tries once to become leader on a fresh dedicated connection. Returns `None` if another
/// replica already holds the lock.
async fn try_acquire(pg_args: &PostgresArgs, lock_key: i64) -> anyhow::Result<Option<Leadership>> {
    let client = codehub_common::postgres::connect_raw(pg_args).await?;
    if advisory_lock::try_acquire(&client, lock_key).await? {
        Ok(Some(Leadership { client }))
    } else {
        Ok(None)
    }
}

/// Runs `on_leading` for as long as this process holds the leader lock, retrying acquisition
/// whenever it doesn't. Mirrors `storage-operator::clusters::reconcile::run`'s
/// acquire-or-renew loop: a ticking `select!` between shutdown and a renew interval, spawning
/// the guarded work on acquisition and aborting it on loss — translated from a Kubernetes
/// `Lease` object to a Postgres advisory lock held on a dedicated connection.
pub async fn run_while_leader<F, Fut>(
    cancel: CancellationToken,
    pg_args: PostgresArgs,
    lock_key: i64,
    component: &str,
    on_leading: F,
) where
    F: Fn(CancellationToken) -> Fut + Send + 'static + Clone,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let mut task: Option<tokio::task::JoinHandle<()>> = None;
    let mut task_cancel: Option<CancellationToken> = None;
    let mut tick = tokio::time::interval(RENEW_INTERVAL);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Some(c) = task_cancel.take() {
                    c.cancel();
                }
                if let Some(t) = task.take() {
                    t.await.ok();
                }
                return;
            }
            _ = tick.tick() => {}
        }

        let still_leading = task.as_ref().is_some_and(|t| !t.is_finished());
        if !still_leading {
            task = None;
            task_cancel = None;
            match try_acquire(&pg_args, lock_key).await {
                Ok(Some(leadership)) => {
                    tracing::info!(component, "acquired leadership");
                    println!(
                        "{} {}",
                        "👑 acquired leadership for".green(),
                        component.green().dimmed()
                    );
                    let inner_cancel = CancellationToken::new();
                    let inner_cancel_for_task = inner_cancel.clone();
                    let on_leading = on_leading.clone();
                    let component = component.to_string();
                    task = Some(tokio::spawn(async move {
                        run_leading(leadership, inner_cancel_for_task.clone(), on_leading).await;
                        tracing::warn!(component, "leadership loop exited");
                    }));
                    task_cancel = Some(inner_cancel);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(component, error = %e, "leader acquisition attempt failed");
                }
            }
        }
    }
}

/// Runs `on_leading` alongside a periodic `still_held` check; cancels both on lock loss or
/// external cancellation.
async fn run_leading<F, Fut>(leadership: Leadership, cancel: CancellationToken, on_leading: F)
where
    F: Fn(CancellationToken) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let watchdog_cancel = cancel.clone();
    let watchdog = async move {
        let mut tick = tokio::time::interval(RENEW_INTERVAL);
        loop {
            tick.tick().await;
            if !leadership.still_held().await {
                tracing::warn!("lost advisory lock; stepping down");
                watchdog_cancel.cancel();
                return;
            }
        }
    };

    tokio::select! {
        _ = watchdog => {}
        _ = on_leading(cancel.clone()) => {}
        _ = cancel.cancelled() => {}
    }
}
