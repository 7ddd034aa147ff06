use codehub_agent_client::Client as AgentClient;
use codehub_repository::gc::{compute_protected_paths, load_gc_candidates};
use deadpool_postgres::Pool;
use tracing::info;

/// One GC cycle (§4.6): compute the protection set from the database, then ask the Agent to
/// reclaim everything else under the archive prefix, subject to a per-workspace retention
/// count. Newly detected orphans are not deleted on first sight; `orphan_grace` is passed
/// through for the Agent to enforce against each object's last-modified time, since this loop
/// only knows what the database currently protects, not the bucket's object ages.
pub async fn tick(
    pool: &Pool,
    agent: &AgentClient,
    retention_count: u32,
    orphan_grace: std::time::Duration,
) -> anyhow::Result<()> {
    let candidates = load_gc_candidates(pool).await?;
    let protected = compute_protected_paths(&candidates);

    let protected_workspaces: Vec<String> = candidates.iter().map(|c| c.workspace_id.clone()).collect();
    let archive_keys: Vec<String> = protected.into_iter().collect();

    info!(
        protected_count = archive_keys.len(),
        workspace_count = protected_workspaces.len(),
        orphan_grace_secs = orphan_grace.as_secs(),
        "gc tick: requesting agent reclaim outside protection set"
    );

    agent
        .gc(archive_keys, protected_workspaces, retention_count, orphan_grace.as_secs())
        .await?;
    Ok(())
}
