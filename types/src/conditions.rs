use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kubernetes-style tri-state condition truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

impl ConditionStatus {
    pub fn from_bool(value: bool) -> Self {
        if value {
            ConditionStatus::True
        } else {
            ConditionStatus::False
        }
    }

    pub fn is_true(self) -> bool {
        matches!(self, ConditionStatus::True)
    }
}

/// One named condition: `{status, reason, message, observed_at}` (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub status: ConditionStatus,
    pub reason: Option<String>,
    pub message: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl Condition {
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self {
            status: ConditionStatus::Unknown,
            reason: None,
            message: None,
            observed_at: now,
        }
    }

    pub fn set(status: ConditionStatus, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            status,
            reason: Some(reason.into()),
            message: None,
            observed_at: now,
        }
    }

    pub fn is_true(&self) -> bool {
        self.status.is_true()
    }
}

/// Extra detail about an archive or restore failure observed by the Agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedFailure {
    pub operation: String,
    pub error_code: i32,
    pub error_at: DateTime<Utc>,
    pub archive_op_id: Option<String>,
}

/// What the Agent's bulk observation reports about an in-progress or finished restore
/// (§6.2's `restore` object). Not one of the four named conditions in §3.2's table, but
/// written by the Observer in the same pass since RESTORING's completion witness needs it
/// (§4.2 "RESTORING completion").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreObservation {
    pub restore_op_id: String,
    pub archive_key: String,
}

/// What the Agent's bulk observation reports about a committed archive (§6.2's `archive`
/// object's `archive_key`). Carried alongside `archive_ready` so completion checks can confirm
/// the commit belongs to the workspace's *current* archive attempt, not a stale one (§3.2 "for
/// the workspace's current archive_key").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveObservation {
    pub archive_key: String,
}

/// The structured observation document written by the Observer and read, never written,
/// by the Workspace Controller in the same tick (§3.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conditions {
    #[serde(rename = "infra.container_ready")]
    pub container_ready: Condition,
    #[serde(rename = "storage.volume_ready")]
    pub volume_ready: Condition,
    #[serde(rename = "storage.archive_ready")]
    pub archive_ready: Condition,
    #[serde(rename = "policy.healthy")]
    pub healthy: Condition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore: Option<RestoreObservation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_failure: Option<ObservedFailure>,
}

impl Conditions {
    pub fn unknown(now: DateTime<Utc>) -> Self {
        Self {
            container_ready: Condition::unknown(now),
            volume_ready: Condition::unknown(now),
            archive_ready: Condition::unknown(now),
            healthy: Condition::unknown(now),
            restore: None,
            observed_failure: None,
        }
    }

    /// RESTORING's completion witness (§4.2): the volume exists, and the observed restore
    /// marker's `archive_key` equals the archive we asked to restore from.
    pub fn restore_complete(&self, expected_archive_key: &str) -> bool {
        self.volume_ready.is_true()
            && self
                .restore
                .as_ref()
                .is_some_and(|r| r.archive_key == expected_archive_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let now = Utc::now();
        let conditions = Conditions::unknown(now);
        let json = serde_json::to_value(&conditions).unwrap();
        let back: Conditions = serde_json::from_value(json).unwrap();
        assert_eq!(back.container_ready.status, ConditionStatus::Unknown);
    }
}
