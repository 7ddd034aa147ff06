use codehub_broker::{activity, wake};
use codehub_repository::workspaces;
use codehub_types::DesiredState;
use deadpool_postgres::Pool;
use deadpool_redis::Pool as RedisPool;
use tracing::{info, warn};

/// One TTL loop tick (§4.4): drain the broker's activity set into `last_access_at`, then run
/// the two independent demotion queries, purely from database state.
pub async fn tick(
    pool: &Pool,
    redis: &RedisPool,
    standby_ttl_secs: i64,
    archive_ttl_secs: i64,
) -> anyhow::Result<()> {
    let flushed = activity::drain(redis).await?;
    for (workspace_id, at) in &flushed {
        if let Err(e) = workspaces::bump_last_access(pool, *workspace_id, *at).await {
            warn!(workspace_id = %workspace_id, error = %e, "failed to bump last_access_at");
        }
    }

    let mut demoted = false;

    for id in workspaces::ttl_standby_candidates(pool, standby_ttl_secs).await? {
        workspaces::set_desired_state(pool, id, DesiredState::Standby).await?;
        info!(workspace_id = %id, "ttl demotion: desired_state -> STANDBY");
        demoted = true;
    }

    for id in workspaces::ttl_archive_candidates(pool, archive_ttl_secs).await? {
        workspaces::set_desired_state(pool, id, DesiredState::Archived).await?;
        info!(workspace_id = %id, "ttl demotion: desired_state -> ARCHIVED");
        demoted = true;
    }

    if demoted {
        let _ = wake::publish_wake_wc(redis).await;
    }

    Ok(())
}
