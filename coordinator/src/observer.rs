use std::collections::HashMap;

use chrono::Utc;
use codehub_agent_client::{types::ObservedWorkspace, Client as AgentClient};
use codehub_repository::workspaces;
use codehub_types::{Condition, Conditions, ObservedFailure, RestoreObservation, WorkspaceId};
use deadpool_postgres::Pool;
use tracing::{error, warn};

/// One bulk Agent listing, then one `conditions` write per workspace observed (§4.3). Never
/// touches `phase`, `operation`, or any WC-owned field — only `conditions`/`observed_at`.
pub async fn tick(pool: &Pool, agent: &AgentClient) -> anyhow::Result<usize> {
    let observation = agent.observe().await?;
    let now = Utc::now();

    let mut written = 0usize;
    for observed in observation.workspaces {
        let Ok(id) = observed.workspace_id.parse::<WorkspaceId>() else {
            warn!(workspace_id = %observed.workspace_id, "agent reported unparseable workspace id");
            continue;
        };
        let conditions = to_conditions(&observed, now);
        if let Err(e) = workspaces::update_conditions(pool, id, &conditions, now).await {
            error!(workspace_id = %id, error = %e, "failed to write observed conditions");
            continue;
        }
        written += 1;
    }

    Ok(written)
}

/// Projects one Agent-reported workspace onto the four named conditions plus the unnamed
/// restore/failure observations (§6.2 → §3.2).
fn to_conditions(observed: &ObservedWorkspace, now: chrono::DateTime<Utc>) -> Conditions {
    let container_ready = observed
        .container
        .as_ref()
        .map(|c| Condition::set(
            codehub_types::ConditionStatus::from_bool(c.running && c.healthy),
            "observed",
            now,
        ))
        .unwrap_or_else(|| Condition::set(codehub_types::ConditionStatus::False, "absent", now));

    let volume_ready = observed
        .volume
        .as_ref()
        .map(|v| Condition::set(codehub_types::ConditionStatus::from_bool(v.exists), "observed", now))
        .unwrap_or_else(|| Condition::set(codehub_types::ConditionStatus::False, "absent", now));

    let archive_ready = observed
        .archive
        .as_ref()
        .map(|a| Condition::set(codehub_types::ConditionStatus::from_bool(a.exists), "observed", now))
        .unwrap_or_else(|| Condition::set(codehub_types::ConditionStatus::False, "absent", now));

    let restore = observed.restore.as_ref().map(|r| RestoreObservation {
        restore_op_id: r.restore_op_id.clone(),
        archive_key: r.archive_key.clone(),
    });

    let observed_failure = observed.error.as_ref().map(|e| ObservedFailure {
        operation: e.operation.clone(),
        error_code: e.error_code,
        error_at: e.error_at,
        archive_op_id: e.archive_op_id.clone(),
    });

    Conditions {
        container_ready,
        volume_ready,
        archive_ready,
        healthy: Condition::unknown(now),
        restore,
        observed_failure,
    }
}

/// Index observed workspaces by id for the Workspace Controller to cross-reference within
/// the same tick, should it ever need a fresher read than the last committed `conditions`.
#[allow(dead_code)]
pub fn index_by_id(observed: Vec<ObservedWorkspace>) -> HashMap<WorkspaceId, ObservedWorkspace> {
    observed
        .into_iter()
        .filter_map(|w| w.workspace_id.parse::<WorkspaceId>().ok().map(|id| (id, w)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use codehub_agent_client::types::{ObservedContainer, ObservedRestore, ObservedVolume};

    fn base(id: &str) -> ObservedWorkspace {
        ObservedWorkspace {
            workspace_id: id.to_string(),
            container: None,
            volume: None,
            archive: None,
            restore: None,
            error: None,
        }
    }

    #[test]
    fn absent_resources_report_false_not_unknown() {
        let observed = base("irrelevant");
        let conditions = to_conditions(&observed, Utc::now());
        assert!(!conditions.container_ready.is_true());
        assert!(!conditions.volume_ready.is_true());
        assert!(!conditions.archive_ready.is_true());
    }

    #[test]
    fn healthy_running_container_sets_container_ready_true() {
        let mut observed = base("irrelevant");
        observed.container = Some(ObservedContainer { running: true, healthy: true });
        observed.volume = Some(ObservedVolume { exists: true });
        let conditions = to_conditions(&observed, Utc::now());
        assert!(conditions.container_ready.is_true());
        assert!(conditions.volume_ready.is_true());
    }

    #[test]
    fn unhealthy_container_reports_container_ready_false() {
        let mut observed = base("irrelevant");
        observed.container = Some(ObservedContainer { running: true, healthy: false });
        let conditions = to_conditions(&observed, Utc::now());
        assert!(!conditions.container_ready.is_true());
    }

    #[test]
    fn restore_observation_carries_through() {
        let mut observed = base("irrelevant");
        observed.restore = Some(ObservedRestore {
            restore_op_id: "op1".to_string(),
            archive_key: "ws1/op1/home.tar.zst".to_string(),
        });
        let conditions = to_conditions(&observed, Utc::now());
        assert_eq!(conditions.restore.unwrap().archive_key, "ws1/op1/home.tar.zst");
    }
}
