use chrono::{DateTime, Utc};

use crate::{Conditions, DesiredState, Operation, OperationTimeouts, Phase};

/// What the Workspace Controller should do this tick, decided purely from `(phase,
/// desired_state, operation)` plus the conditions already on hand (§4.2 Planning). Agent
/// invocation and the eventual commit are the caller's job; this function only decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannedAction {
    /// Nothing to do this tick.
    NoOp,
    /// The in-flight operation's completion witness is satisfied: commit `operation=NONE`,
    /// `error_count=0`.
    CompleteOperation,
    /// The in-flight operation exceeded its timeout budget: transition to `ERROR` with
    /// `ErrorReason::Timeout` (§4.2 ERROR atomicity).
    TimeoutToError,
    /// Re-invoke the Agent for the same in-flight operation; it must be idempotent.
    ReinvokeOperation,
    /// `ARCHIVING`'s first sub-step has been witnessed (commit marker observed): commit
    /// `archive_key`, then instruct the Agent to delete the source volume (§4.2 "ARCHIVING
    /// is two phases").
    ArchivingCommitAndDeleteVolume,
    /// Begin a new operation: step one level toward `desired_state`.
    StartOperation(Operation),
}

/// Decide the next action for one workspace. `op_elapsed` is `now - op_started_at` when an
/// operation is in flight. `current_archive_key` is the row's committed `archive_key`
/// (the `ARCHIVING` source for `RESTORING`'s witness, and the just-committed path for
/// `ARCHIVING`'s second sub-step).
#[allow(clippy::too_many_arguments)]
pub fn plan(
    phase: Phase,
    desired_state: DesiredState,
    operation: Operation,
    op_elapsed: Option<std::time::Duration>,
    conditions: &Conditions,
    current_archive_key: Option<&str>,
    timeouts: &OperationTimeouts,
) -> PlannedAction {
    if operation != Operation::None {
        return plan_in_flight(operation, op_elapsed, conditions, current_archive_key, timeouts);
    }

    if phase == Phase::Error {
        return if desired_state == DesiredState::Deleted {
            PlannedAction::StartOperation(Operation::Deleting)
        } else {
            PlannedAction::NoOp
        };
    }

    if desired_state.target_phase() == Some(phase) {
        return PlannedAction::NoOp;
    }

    if desired_state == DesiredState::Deleted {
        return PlannedAction::StartOperation(Operation::Deleting);
    }

    step_toward(phase, desired_state)
}

fn plan_in_flight(
    operation: Operation,
    op_elapsed: Option<std::time::Duration>,
    conditions: &Conditions,
    current_archive_key: Option<&str>,
    timeouts: &OperationTimeouts,
) -> PlannedAction {
    let witnessed = match operation {
        Operation::Provisioning => conditions.volume_ready.is_true(),
        Operation::CreateEmptyArchive => conditions.archive_ready.is_true(),
        Operation::Restoring => current_archive_key
            .is_some_and(|key| conditions.restore_complete(key)),
        Operation::Starting => conditions.container_ready.is_true(),
        Operation::Stopping => !conditions.container_ready.is_true(),
        Operation::Archiving => conditions.archive_ready.is_true() && !conditions.volume_ready.is_true(),
        Operation::Deleting => {
            !conditions.container_ready.is_true() && !conditions.volume_ready.is_true()
        }
        Operation::None => true,
    };

    if witnessed {
        return PlannedAction::CompleteOperation;
    }

    // ARCHIVING's first sub-step (commit marker observed, volume still up) is not the
    // operation's overall completion, but it does need WC to act: commit archive_key and
    // command the volume delete (§4.2 "ARCHIVING is two phases").
    if operation == Operation::Archiving
        && conditions.archive_ready.is_true()
        && conditions.volume_ready.is_true()
    {
        return PlannedAction::ArchivingCommitAndDeleteVolume;
    }

    let timed_out = op_elapsed.is_some_and(|elapsed| elapsed > timeouts.for_op(operation));
    if timed_out {
        return PlannedAction::TimeoutToError;
    }

    PlannedAction::ReinvokeOperation
}

/// Step exactly one level toward `desired_state`, per the operation/transition map in
/// §4.1, with the single shortcut `PENDING -> ARCHIVED` via `CreateEmptyArchive`.
fn step_toward(phase: Phase, desired_state: DesiredState) -> PlannedAction {
    let Some(target) = desired_state.target_phase() else {
        return PlannedAction::NoOp;
    };
    let (Some(from_level), Some(to_level)) = (phase.level(), target.level()) else {
        return PlannedAction::NoOp;
    };

    if to_level > from_level {
        let operation = match phase {
            Phase::Pending if target == Phase::Archived => Operation::CreateEmptyArchive,
            Phase::Pending => Operation::Provisioning,
            Phase::Archived => Operation::Restoring,
            Phase::Standby => Operation::Starting,
            Phase::Running | Phase::Error | Phase::Deleting | Phase::Deleted => return PlannedAction::NoOp,
        };
        PlannedAction::StartOperation(operation)
    } else {
        let operation = match phase {
            Phase::Running => Operation::Stopping,
            Phase::Standby => Operation::Archiving,
            Phase::Pending | Phase::Archived | Phase::Error | Phase::Deleting | Phase::Deleted => {
                return PlannedAction::NoOp;
            }
        };
        PlannedAction::StartOperation(operation)
    }
}

/// Whether `op_started_at` has run past `now` by more than `operation`'s timeout budget.
pub fn operation_elapsed(
    op_started_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Option<std::time::Duration> {
    op_started_at.map(|started| (now - started).to_std().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conditions::{Condition, ConditionStatus};
    use chrono::Utc;

    fn cond(status: bool) -> Condition {
        Condition {
            status: ConditionStatus::from_bool(status),
            reason: None,
            message: None,
            observed_at: Utc::now(),
        }
    }

    fn timeouts() -> OperationTimeouts {
        OperationTimeouts::default()
    }

    fn conditions(container: bool, volume: bool, archive: bool) -> Conditions {
        Conditions {
            container_ready: cond(container),
            volume_ready: cond(volume),
            archive_ready: cond(archive),
            healthy: cond(true),
            restore: None,
            observed_failure: None,
        }
    }

    #[test]
    fn pending_to_standby_provisions() {
        let action = plan(
            Phase::Pending,
            DesiredState::Standby,
            Operation::None,
            None,
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::StartOperation(Operation::Provisioning));
    }

    #[test]
    fn pending_to_archived_is_the_shortcut() {
        let action = plan(
            Phase::Pending,
            DesiredState::Archived,
            Operation::None,
            None,
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(
            action,
            PlannedAction::StartOperation(Operation::CreateEmptyArchive)
        );
    }

    #[test]
    fn matching_phase_is_noop() {
        let action = plan(
            Phase::Running,
            DesiredState::Running,
            Operation::None,
            None,
            &conditions(true, true, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::NoOp);
    }

    #[test]
    fn running_to_archived_steps_down_one_level_at_a_time() {
        let action = plan(
            Phase::Running,
            DesiredState::Archived,
            Operation::None,
            None,
            &conditions(true, true, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::StartOperation(Operation::Stopping));
    }

    #[test]
    fn error_is_noop_unless_desired_deleted() {
        let noop = plan(
            Phase::Error,
            DesiredState::Running,
            Operation::None,
            None,
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(noop, PlannedAction::NoOp);

        let delete = plan(
            Phase::Error,
            DesiredState::Deleted,
            Operation::None,
            None,
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(delete, PlannedAction::StartOperation(Operation::Deleting));
    }

    #[test]
    fn in_flight_operation_witnessed_completes() {
        let action = plan(
            Phase::Pending,
            DesiredState::Standby,
            Operation::Provisioning,
            Some(std::time::Duration::from_secs(5)),
            &conditions(false, true, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::CompleteOperation);
    }

    #[test]
    fn in_flight_operation_times_out() {
        let action = plan(
            Phase::Pending,
            DesiredState::Standby,
            Operation::Provisioning,
            Some(std::time::Duration::from_secs(600)),
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::TimeoutToError);
    }

    #[test]
    fn in_flight_operation_not_witnessed_reinvokes() {
        let action = plan(
            Phase::Pending,
            DesiredState::Standby,
            Operation::Provisioning,
            Some(std::time::Duration::from_secs(5)),
            &conditions(false, false, false),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::ReinvokeOperation);
    }

    #[test]
    fn archiving_commit_marker_without_volume_gone_advances() {
        let action = plan(
            Phase::Standby,
            DesiredState::Archived,
            Operation::Archiving,
            Some(std::time::Duration::from_secs(5)),
            &conditions(false, true, true),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::ArchivingCommitAndDeleteVolume);
    }

    #[test]
    fn archiving_completes_once_volume_is_gone_too() {
        let action = plan(
            Phase::Standby,
            DesiredState::Archived,
            Operation::Archiving,
            Some(std::time::Duration::from_secs(5)),
            &conditions(false, false, true),
            None,
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::CompleteOperation);
    }

    #[test]
    fn restoring_completes_only_when_marker_matches() {
        let mut conditions = conditions(false, true, false);
        conditions.restore = Some(crate::conditions::RestoreObservation {
            restore_op_id: "r1".into(),
            archive_key: "ws/op/home.tar.zst".into(),
        });
        let action = plan(
            Phase::Archived,
            DesiredState::Standby,
            Operation::Restoring,
            Some(std::time::Duration::from_secs(5)),
            &conditions,
            Some("ws/op/home.tar.zst"),
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::CompleteOperation);
    }

    #[test]
    fn restoring_does_not_complete_on_mismatched_marker() {
        let mut conditions = conditions(false, true, false);
        conditions.restore = Some(crate::conditions::RestoreObservation {
            restore_op_id: "stale".into(),
            archive_key: "ws/other/home.tar.zst".into(),
        });
        let action = plan(
            Phase::Archived,
            DesiredState::Standby,
            Operation::Restoring,
            Some(std::time::Duration::from_secs(5)),
            &conditions,
            Some("ws/op/home.tar.zst"),
            &timeouts(),
        );
        assert_eq!(action, PlannedAction::ReinvokeOperation);
    }
}
