use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Phase;

/// The in-flight lifecycle transition for a workspace; at most one per row (§3.1, §3.3
/// invariant 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    None,
    Provisioning,
    CreateEmptyArchive,
    Restoring,
    Starting,
    Stopping,
    Archiving,
    Deleting,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::None => "NONE",
            Operation::Provisioning => "PROVISIONING",
            Operation::CreateEmptyArchive => "CREATE_EMPTY_ARCHIVE",
            Operation::Restoring => "RESTORING",
            Operation::Starting => "STARTING",
            Operation::Stopping => "STOPPING",
            Operation::Archiving => "ARCHIVING",
            Operation::Deleting => "DELETING",
        }
    }

    /// The phase this operation lands the workspace in on successful completion, per the
    /// operation/transition map in §4.1. `Deleting` has no single "from" phase, so it is
    /// modeled separately in `plan`.
    pub fn target_phase(self) -> Option<Phase> {
        match self {
            Operation::Provisioning => Some(Phase::Standby),
            Operation::CreateEmptyArchive => Some(Phase::Archived),
            Operation::Restoring => Some(Phase::Standby),
            Operation::Starting => Some(Phase::Running),
            Operation::Stopping => Some(Phase::Standby),
            Operation::Archiving => Some(Phase::Archived),
            Operation::Deleting => Some(Phase::Deleted),
            Operation::None => None,
        }
    }

    /// Default operation-timeout budget (§9 Open Question 2 / SPEC_FULL §14.2). Overridable
    /// per-process via [`OperationTimeouts`]; this is only the fallback those defaults come
    /// from.
    pub fn default_timeout(self) -> std::time::Duration {
        use std::time::Duration;
        match self {
            Operation::Provisioning => Duration::from_secs(60),
            Operation::CreateEmptyArchive => Duration::from_secs(120),
            Operation::Restoring => Duration::from_secs(1800),
            Operation::Starting => Duration::from_secs(120),
            Operation::Stopping => Duration::from_secs(60),
            Operation::Archiving => Duration::from_secs(1800),
            Operation::Deleting => Duration::from_secs(300),
            Operation::None => Duration::ZERO,
        }
    }
}

/// Per-operation timeout budgets, configured once at process startup from the
/// `OPERATION_TIMEOUT_*` knobs (§6.8) and threaded into `plan` by reference. `Default` matches
/// `Operation::default_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationTimeouts {
    pub provisioning: std::time::Duration,
    pub create_empty_archive: std::time::Duration,
    pub restoring: std::time::Duration,
    pub starting: std::time::Duration,
    pub stopping: std::time::Duration,
    pub archiving: std::time::Duration,
    pub deleting: std::time::Duration,
}

impl OperationTimeouts {
    pub fn for_op(&self, operation: Operation) -> std::time::Duration {
        match operation {
            Operation::Provisioning => self.provisioning,
            Operation::CreateEmptyArchive => self.create_empty_archive,
            Operation::Restoring => self.restoring,
            Operation::Starting => self.starting,
            Operation::Stopping => self.stopping,
            Operation::Archiving => self.archiving,
            Operation::Deleting => self.deleting,
            Operation::None => std::time::Duration::ZERO,
        }
    }
}

impl Default for OperationTimeouts {
    fn default() -> Self {
        Self {
            provisioning: Operation::Provisioning.default_timeout(),
            create_empty_archive: Operation::CreateEmptyArchive.default_timeout(),
            restoring: Operation::Restoring.default_timeout(),
            starting: Operation::Starting.default_timeout(),
            stopping: Operation::Stopping.default_timeout(),
            archiving: Operation::Archiving.default_timeout(),
            deleting: Operation::Deleting.default_timeout(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = crate::error::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NONE" => Ok(Operation::None),
            "PROVISIONING" => Ok(Operation::Provisioning),
            "CREATE_EMPTY_ARCHIVE" => Ok(Operation::CreateEmptyArchive),
            "RESTORING" => Ok(Operation::Restoring),
            "STARTING" => Ok(Operation::Starting),
            "STOPPING" => Ok(Operation::Stopping),
            "ARCHIVING" => Ok(Operation::Archiving),
            "DELETING" => Ok(Operation::Deleting),
            other => Err(crate::error::ParseEnumError::unknown("Operation", other)),
        }
    }
}
