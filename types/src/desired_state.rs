use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Phase;

/// User/TTL intent for a workspace's eventual phase. Written only by the API and the TTL
/// loop (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DesiredState {
    Archived,
    Standby,
    Running,
    Deleted,
}

impl DesiredState {
    /// The active phase this intent maps onto, or `None` for `DELETED`, which is not part
    /// of the Ordered State Machine.
    pub fn target_phase(self) -> Option<Phase> {
        match self {
            DesiredState::Archived => Some(Phase::Archived),
            DesiredState::Standby => Some(Phase::Standby),
            DesiredState::Running => Some(Phase::Running),
            DesiredState::Deleted => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DesiredState::Archived => "ARCHIVED",
            DesiredState::Standby => "STANDBY",
            DesiredState::Running => "RUNNING",
            DesiredState::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for DesiredState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DesiredState {
    type Err = crate::error::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARCHIVED" => Ok(DesiredState::Archived),
            "STANDBY" => Ok(DesiredState::Standby),
            "RUNNING" => Ok(DesiredState::Running),
            "DELETED" => Ok(DesiredState::Deleted),
            other => Err(crate::error::ParseEnumError::unknown("DesiredState", other)),
        }
    }
}
