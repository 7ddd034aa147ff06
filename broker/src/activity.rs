use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codehub_types::WorkspaceId;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use crate::channels::ACTIVITY_SET;

/// Records the latest activity timestamp for a workspace. `ZADD ... GT` retains the greater
/// score on collision, so concurrent proxy processes collapse to the newest value without
/// coordinating (§4.4).
pub async fn record(pool: &Pool, workspace_id: WorkspaceId, at: DateTime<Utc>) -> Result<()> {
    let mut conn = pool.get().await.context("failed to get redis connection")?;
    let score = at.timestamp_millis();
    let _: () = redis::cmd("ZADD")
        .arg(ACTIVITY_SET)
        .arg("GT")
        .arg(score)
        .arg(workspace_id.to_string())
        .query_async(&mut conn)
        .await
        .context("failed to record workspace activity")?;
    Ok(())
}

/// Drains every member currently in the activity set, returning `(workspace_id, timestamp)`
/// pairs for the TTL loop to sink into `last_access_at`. Members are removed as they are
/// read; a broker restart between flush and drain costs at most one flush interval of
/// staleness (§4.4), never correctness.
pub async fn drain(pool: &Pool) -> Result<Vec<(WorkspaceId, DateTime<Utc>)>> {
    let mut conn = pool.get().await.context("failed to get redis connection")?;
    let members: Vec<(String, i64)> = conn
        .zrange_withscores(ACTIVITY_SET, 0, -1)
        .await
        .context("failed to read activity set")?;

    if members.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<&str> = members.iter().map(|(id, _)| id.as_str()).collect();
    let _: () = conn
        .zrem(ACTIVITY_SET, ids)
        .await
        .context("failed to drain activity set")?;

    let mut result = Vec::with_capacity(members.len());
    for (id, score) in members {
        let Ok(workspace_id) = id.parse::<WorkspaceId>() else {
            tracing::warn!(id, "skipping malformed workspace id in activity set");
            continue;
        };
        let Some(at) = DateTime::from_timestamp_millis(score) else {
            continue;
        };
        result.push((workspace_id, at));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workspace_id_round_trips_through_string_member() {
        let id = WorkspaceId::new();
        let parsed: WorkspaceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }
}
