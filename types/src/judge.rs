use crate::{Conditions, ErrorReason, Phase};

/// Outcome of judging a workspace's reality against its intent for one tick (§4.2
/// Judgment). Pure function: no I/O, no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Judgment {
    pub phase: Phase,
    /// Set only when this tick's judgment newly detects an invariant violation.
    /// `None` does not imply the row is healthy — a sticky `error_reason` from a prior
    /// tick is judged separately by the caller, per `judge`'s `sticky_error_reason` input.
    pub violated: Option<ErrorReason>,
    pub healthy: bool,
}

/// Whether any resource the Agent could still hold onto is currently observed present.
/// Used by the `deleted_at` branch of Judgment to distinguish `DELETING` (teardown still
/// in flight) from `DELETED` (nothing left to tear down).
pub fn any_resource_observed(conditions: &Conditions) -> bool {
    conditions.container_ready.is_true()
        || conditions.volume_ready.is_true()
        || conditions.archive_ready.is_true()
}

/// Judge the phase for one tick, in the fixed precedence of §4.2:
///
/// 1. user intent (`deleted_at`)
/// 2. system safety (invariant violations)
/// 3. reality, most to least specific
///
/// `sticky_error_reason` is the row's current `error_reason` (from the prior commit): once
/// set, `ERROR` persists until an operator clears it externally (§4.2 "Recovery from ERROR
/// is external"), independent of whether the originating invariant still holds.
pub fn judge(
    conditions: &Conditions,
    deleted_at_is_set: bool,
    sticky_error_reason: Option<ErrorReason>,
) -> Judgment {
    let invariant_violated = conditions.container_ready.is_true() && !conditions.volume_ready.is_true();
    let healthy = !invariant_violated;

    if deleted_at_is_set {
        let phase = if any_resource_observed(conditions) {
            Phase::Deleting
        } else {
            Phase::Deleted
        };
        return Judgment {
            phase,
            violated: None,
            healthy,
        };
    }

    if sticky_error_reason.is_some() {
        return Judgment {
            phase: Phase::Error,
            violated: None,
            healthy,
        };
    }

    if invariant_violated {
        return Judgment {
            phase: Phase::Error,
            violated: Some(ErrorReason::ContainerWithoutVolume),
            healthy,
        };
    }

    let phase = if conditions.container_ready.is_true() && conditions.volume_ready.is_true() {
        Phase::Running
    } else if conditions.volume_ready.is_true() {
        Phase::Standby
    } else if conditions.archive_ready.is_true() {
        Phase::Archived
    } else {
        Phase::Pending
    };

    Judgment {
        phase,
        violated: None,
        healthy,
    }
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
    fn container_and_volume_is_running() {
        let j = judge(&conditions(true, true, false), false, None);
        assert_eq!(j.phase, Phase::Running);
        assert!(j.healthy);
    }

    #[test]
    fn volume_alone_is_standby() {
        let j = judge(&conditions(false, true, false), false, None);
        assert_eq!(j.phase, Phase::Standby);
    }

    #[test]
    fn archive_alone_is_archived() {
        let j = judge(&conditions(false, false, true), false, None);
        assert_eq!(j.phase, Phase::Archived);
    }

    #[test]
    fn nothing_observed_is_pending() {
        let j = judge(&conditions(false, false, false), false, None);
        assert_eq!(j.phase, Phase::Pending);
    }

    #[test]
    fn container_without_volume_is_error() {
        let j = judge(&conditions(true, false, false), false, None);
        assert_eq!(j.phase, Phase::Error);
        assert_eq!(j.violated, Some(ErrorReason::ContainerWithoutVolume));
        assert!(!j.healthy);
    }

    #[test]
    fn sticky_error_wins_over_recovered_reality() {
        // Reality looks healthy again, but error_reason from a prior tick hasn't been
        // cleared by an operator yet -- ERROR must persist.
        let j = judge(
            &conditions(true, true, false),
            false,
            Some(ErrorReason::Timeout),
        );
        assert_eq!(j.phase, Phase::Error);
    }

    #[test]
    fn deleted_at_with_resources_left_is_deleting() {
        let j = judge(&conditions(false, true, false), true, None);
        assert_eq!(j.phase, Phase::Deleting);
    }

    #[test]
    fn deleted_at_with_nothing_left_is_deleted() {
        let j = judge(&conditions(false, false, false), true, None);
        assert_eq!(j.phase, Phase::Deleted);
    }

    #[test]
    fn deleted_at_takes_priority_over_sticky_error() {
        let j = judge(&conditions(false, false, false), true, Some(ErrorReason::Timeout));
        assert_eq!(j.phase, Phase::Deleted);
    }
}
