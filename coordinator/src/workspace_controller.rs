use chrono::Utc;
use codehub_agent_client::{error::AgentError, Client as AgentClient};
use codehub_broker::wake;
use codehub_repository::workspaces::{self, WcCommit};
use codehub_types::{
    judge, operation_elapsed, plan, ErrorReason, Operation, OperationTimeouts, PlannedAction, Workspace,
};
use deadpool_postgres::Pool;
use deadpool_redis::Pool as RedisPool;
use tracing::{info, warn};
use uuid::Uuid;

/// One Workspace Controller tick across every active workspace (§4.2): judge, plan, drive the
/// Agent, commit — a decided action dispatched to the right side-effecting call, then a single
/// commit per row.
pub async fn tick(
    pool: &Pool,
    redis: &RedisPool,
    agent: &AgentClient,
    max_retry: i32,
    timeouts: &OperationTimeouts,
) -> anyhow::Result<()> {
    let rows = workspaces::list_active(pool).await?;
    let mut any_committed = false;

    for row in rows {
        match tick_one(pool, agent, &row, max_retry, timeouts).await {
            Ok(committed) => any_committed |= committed,
            Err(e) => warn!(workspace_id = %row.id, error = %e, "workspace controller tick failed"),
        }
    }

    if any_committed {
        let _ = wake::publish_wake_wc(redis).await;
        let _ = wake::publish_wake_observer(redis).await;
    }
    Ok(())
}

async fn tick_one(
    pool: &Pool,
    agent: &AgentClient,
    row: &Workspace,
    max_retry: i32,
    timeouts: &OperationTimeouts,
) -> anyhow::Result<bool> {
    let now = Utc::now();
    let judgment = judge(&row.conditions, row.deleted_at.is_some(), row.error_reason);

    let op_elapsed = operation_elapsed(row.op_started_at, now);
    let action = plan(
        judgment.phase,
        row.desired_state,
        row.operation,
        op_elapsed,
        &row.conditions,
        row.archive_key.as_deref(),
        timeouts,
    );

    let commit = match action {
        PlannedAction::NoOp => WcCommit {
            phase: judgment.phase,
            phase_changed: judgment.phase != row.phase,
            operation: row.operation,
            op_started_at: row.op_started_at,
            archive_op_id: row.archive_op_id.clone(),
            archive_key: row.archive_key.clone(),
            home_ctx: row.home_ctx.clone(),
            error_reason: row.error_reason,
            error_count: row.error_count,
            healthy: judgment.healthy,
        },

        PlannedAction::CompleteOperation => WcCommit {
            phase: judgment.phase,
            phase_changed: judgment.phase != row.phase,
            operation: Operation::None,
            op_started_at: None,
            archive_op_id: row.archive_op_id.clone(),
            archive_key: row.archive_key.clone(),
            home_ctx: row.home_ctx.clone(),
            error_reason: None,
            error_count: 0,
            healthy: judgment.healthy,
        },

        PlannedAction::TimeoutToError => WcCommit {
            phase: codehub_types::Phase::Error,
            phase_changed: row.phase != codehub_types::Phase::Error,
            operation: Operation::None,
            op_started_at: None,
            archive_op_id: row.archive_op_id.clone(),
            archive_key: row.archive_key.clone(),
            home_ctx: row.home_ctx.clone(),
            error_reason: Some(ErrorReason::Timeout),
            error_count: row.error_count + 1,
            healthy: false,
        },

        PlannedAction::ReinvokeOperation => {
            let outcome = drive_agent(agent, row, row.operation, row.archive_op_id.as_deref()).await;
            apply_agent_outcome(row, judgment.phase, row.operation, max_retry, outcome)
        }

        PlannedAction::ArchivingCommitAndDeleteVolume => {
            let archive_op_id = row.archive_op_id.clone().unwrap_or_default();
            let archive_key = Workspace::archive_path(row.id, &archive_op_id);
            // Second sub-step of ARCHIVING (§4.2): commit archive_key, then command the volume
            // delete so the completion witness (archive_ready && !volume_ready) can be satisfied.
            let outcome = agent.delete(row.id).await;
            match outcome {
                Ok(_) => WcCommit {
                    phase: row.phase,
                    phase_changed: false,
                    operation: row.operation,
                    op_started_at: row.op_started_at,
                    archive_op_id: row.archive_op_id.clone(),
                    archive_key: Some(archive_key),
                    home_ctx: row.home_ctx.clone(),
                    error_reason: None,
                    error_count: row.error_count,
                    healthy: judgment.healthy,
                },
                Err(e) => apply_agent_outcome(row, judgment.phase, row.operation, max_retry, Err(e)),
            }
        }

        PlannedAction::StartOperation(operation) => {
            let archive_op_id = match operation {
                Operation::Archiving | Operation::CreateEmptyArchive => Some(Uuid::now_v7().to_string()),
                _ => None,
            };
            let outcome = drive_agent(agent, row, operation, archive_op_id.as_deref()).await;
            match outcome {
                Ok(_) => WcCommit {
                    phase: row.phase,
                    phase_changed: false,
                    operation,
                    op_started_at: Some(now),
                    archive_op_id: archive_op_id.or_else(|| row.archive_op_id.clone()),
                    archive_key: row.archive_key.clone(),
                    home_ctx: row.home_ctx.clone(),
                    error_reason: None,
                    error_count: 0,
                    healthy: judgment.healthy,
                },
                Err(e) => {
                    warn!(workspace_id = %row.id, operation = %operation, error = %e, "failed to start operation");
                    WcCommit {
                        phase: row.phase,
                        phase_changed: false,
                        operation: Operation::None,
                        op_started_at: None,
                        archive_op_id: row.archive_op_id.clone(),
                        archive_key: row.archive_key.clone(),
                        home_ctx: row.home_ctx.clone(),
                        error_reason: Some(classify_start_failure(&e)),
                        error_count: row.error_count + 1,
                        healthy: false,
                    }
                }
            }
        }
    };

    info!(
        workspace_id = %row.id,
        from_phase = %row.phase,
        to_phase = %commit.phase,
        operation = %commit.operation,
        "workspace controller tick committing"
    );

    workspaces::commit_wc_tick(pool, row.id, row.operation, &commit).await
}

/// Re-invokes the Agent for `operation`, fanning out to the right call per §4.1's transition
/// table. Every call is idempotent: redriving it with the same inputs (including
/// `archive_op_id`) must not corrupt state.
async fn drive_agent(
    agent: &AgentClient,
    row: &Workspace,
    operation: Operation,
    archive_op_id: Option<&str>,
) -> Result<(), AgentError> {
    match operation {
        Operation::Provisioning => agent.provision(row.id).await.map(|_| ()),
        Operation::CreateEmptyArchive => {
            let op_id = archive_op_id.or(row.archive_op_id.as_deref()).unwrap_or_default();
            agent.archive(row.id, op_id).await.map(|_| ())
        }
        Operation::Restoring => {
            let archive_key = row.archive_key.as_deref().unwrap_or_default();
            agent
                .restore(row.id, archive_key, row.archive_op_id.as_deref().unwrap_or_default())
                .await
                .map(|_| ())
        }
        Operation::Starting => agent.start(row.id, None).await.map(|_| ()),
        Operation::Stopping => agent.stop(row.id).await.map(|_| ()),
        Operation::Archiving => {
            let op_id = archive_op_id.or(row.archive_op_id.as_deref()).unwrap_or_default();
            agent.archive(row.id, op_id).await.map(|_| ())
        }
        Operation::Deleting => agent.delete(row.id).await.map(|_| ()),
        Operation::None => Ok(()),
    }
}

/// Folds an Agent call's outcome onto the re-invoke path (§7): a permanent failure or a
/// surfaced Agent error accrues `error_count`, terminal once `error_count >= max_retry`.
/// Plain non-completion (an `Ok` that simply isn't witnessed yet) never bumps `error_count`.
fn apply_agent_outcome(
    row: &Workspace,
    phase: codehub_types::Phase,
    operation: Operation,
    max_retry: i32,
    outcome: Result<(), AgentError>,
) -> WcCommit {
    match outcome {
        Ok(()) => WcCommit {
            phase,
            phase_changed: phase != row.phase,
            operation,
            op_started_at: row.op_started_at,
            archive_op_id: row.archive_op_id.clone(),
            archive_key: row.archive_key.clone(),
            home_ctx: row.home_ctx.clone(),
            error_reason: row.error_reason,
            error_count: row.error_count,
            healthy: row.error_reason.is_none(),
        },
        Err(e) if !e.is_transient() => {
            let next_count = row.error_count + 1;
            let reason = classify_start_failure(&e);
            let terminal = reason.is_terminal() || next_count >= max_retry;
            WcCommit {
                phase: if terminal { codehub_types::Phase::Error } else { phase },
                phase_changed: terminal && phase != codehub_types::Phase::Error,
                operation: if terminal { Operation::None } else { operation },
                op_started_at: if terminal { None } else { row.op_started_at },
                archive_op_id: row.archive_op_id.clone(),
                archive_key: row.archive_key.clone(),
                home_ctx: row.home_ctx.clone(),
                error_reason: Some(if next_count >= max_retry && !reason.is_terminal() {
                    ErrorReason::RetryExceeded
                } else {
                    reason
                }),
                error_count: next_count,
                healthy: !terminal,
            }
        }
        Err(_transient) => WcCommit {
            phase,
            phase_changed: phase != row.phase,
            operation,
            op_started_at: row.op_started_at,
            archive_op_id: row.archive_op_id.clone(),
            archive_key: row.archive_key.clone(),
            home_ctx: row.home_ctx.clone(),
            error_reason: row.error_reason,
            error_count: row.error_count,
            healthy: row.error_reason.is_none(),
        },
    }
}

/// Maps an Agent error onto the ERROR classification table (§4.2).
fn classify_start_failure(e: &AgentError) -> ErrorReason {
    match e {
        AgentError::Action { code, .. } if code == "IMAGE_PULL_FAILED" => ErrorReason::ImagePullFailed,
        AgentError::Action { code, .. } if code == "ARCHIVE_CORRUPTED" => ErrorReason::ArchiveCorrupted,
        AgentError::Action { code, .. } if code == "DATA_LOST" => ErrorReason::DataLost,
        AgentError::Action { .. } => ErrorReason::ActionFailed,
        AgentError::Unreachable(_) | AgentError::Timeout | AgentError::CircuitOpen => {
            ErrorReason::Unreachable
        }
        AgentError::Decode(_) | AgentError::InvalidJson(_) => ErrorReason::ActionFailed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use codehub_types::{Conditions, WorkspaceId};
    use uuid::Uuid;

    fn workspace() -> Workspace {
        let now = Utc::now();
        Workspace {
            id: WorkspaceId::new(),
            owner_user_id: Uuid::new_v4(),
            name: "demo".to_string(),
            description: None,
            memo: None,
            desired_state: codehub_types::DesiredState::Running,
            deleted_at: None,
            phase: codehub_types::Phase::Pending,
            phase_changed_at: now,
            operation: Operation::Starting,
            op_started_at: Some(now),
            archive_op_id: None,
            conditions: Conditions::unknown(now),
            observed_at: None,
            archive_key: None,
            home_ctx: None,
            last_access_at: None,
            error_reason: None,
            error_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn classify_image_pull_failed_is_terminal() {
        let e = AgentError::Action {
            code: "IMAGE_PULL_FAILED".to_string(),
            message: "no such image".to_string(),
        };
        let reason = classify_start_failure(&e);
        assert_eq!(reason, ErrorReason::ImagePullFailed);
        assert!(reason.is_terminal());
    }

    #[test]
    fn classify_unreachable_is_not_terminal() {
        assert_eq!(classify_start_failure(&AgentError::Timeout), ErrorReason::Unreachable);
        assert!(!ErrorReason::Unreachable.is_terminal());
    }

    #[test]
    fn transient_failure_keeps_row_unchanged_and_healthy() {
        let row = workspace();
        let commit = apply_agent_outcome(&row, row.phase, row.operation, 5, Err(AgentError::CircuitOpen));
        assert_eq!(commit.phase, row.phase);
        assert_eq!(commit.error_count, 0);
        assert!(commit.healthy);
    }

    #[test]
    fn permanent_failure_under_max_retry_accrues_error_count_without_erroring() {
        let mut row = workspace();
        row.error_count = 1;
        let e = AgentError::Action {
            code: "JOB_FAILED".to_string(),
            message: "boom".to_string(),
        };
        let commit = apply_agent_outcome(&row, row.phase, row.operation, 5, Err(e));
        assert_eq!(commit.error_count, 2);
        assert_ne!(commit.phase, codehub_types::Phase::Error);
    }

    #[test]
    fn permanent_failure_at_max_retry_becomes_retry_exceeded_error() {
        let mut row = workspace();
        row.error_count = 4;
        let e = AgentError::Action {
            code: "JOB_FAILED".to_string(),
            message: "boom".to_string(),
        };
        let commit = apply_agent_outcome(&row, row.phase, row.operation, 5, Err(e));
        assert_eq!(commit.phase, codehub_types::Phase::Error);
        assert_eq!(commit.error_reason, Some(ErrorReason::RetryExceeded));
        assert!(!commit.healthy);
    }

    #[test]
    fn terminal_reason_errors_immediately_regardless_of_retry_budget() {
        let row = workspace();
        let e = AgentError::Action {
            code: "DATA_LOST".to_string(),
            message: "volume gone".to_string(),
        };
        let commit = apply_agent_outcome(&row, row.phase, row.operation, 5, Err(e));
        assert_eq!(commit.phase, codehub_types::Phase::Error);
        assert_eq!(commit.error_reason, Some(ErrorReason::DataLost));
    }

    #[test]
    fn success_clears_nothing_and_preserves_sticky_error() {
        let mut row = workspace();
        row.error_reason = Some(ErrorReason::Timeout);
        let commit = apply_agent_outcome(&row, codehub_types::Phase::Error, row.operation, 5, Ok(()));
        assert_eq!(commit.error_reason, Some(ErrorReason::Timeout));
        assert!(!commit.healthy);
    }
}
