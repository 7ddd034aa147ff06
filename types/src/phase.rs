use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The derived lifecycle state of a workspace, computed by the Workspace Controller.
///
/// `PENDING`, `ARCHIVED`, `STANDBY`, `RUNNING` form the Ordered State Machine; `ERROR`,
/// `DELETING`, `DELETED` sit outside the ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Pending,
    Archived,
    Standby,
    Running,
    Error,
    Deleting,
    Deleted,
}

impl Phase {
    /// The ordering level of an active phase, or `None` for phases outside the Ordered
    /// State Machine (`ERROR`, `DELETING`, `DELETED`).
    pub fn level(self) -> Option<u8> {
        match self {
            Phase::Pending => Some(0),
            Phase::Archived => Some(5),
            Phase::Standby => Some(10),
            Phase::Running => Some(20),
            Phase::Error | Phase::Deleting | Phase::Deleted => None,
        }
    }

    pub fn is_active(self) -> bool {
        self.level().is_some()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Pending => "PENDING",
            Phase::Archived => "ARCHIVED",
            Phase::Standby => "STANDBY",
            Phase::Running => "RUNNING",
            Phase::Error => "ERROR",
            Phase::Deleting => "DELETING",
            Phase::Deleted => "DELETED",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = super::error::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Phase::Pending),
            "ARCHIVED" => Ok(Phase::Archived),
            "STANDBY" => Ok(Phase::Standby),
            "RUNNING" => Ok(Phase::Running),
            "ERROR" => Ok(Phase::Error),
            "DELETING" => Ok(Phase::Deleting),
            "DELETED" => Ok(Phase::Deleted),
            other => Err(super::error::ParseEnumError::unknown("Phase", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_strictly_increasing() {
        assert!(Phase::Pending.level() < Phase::Archived.level());
        assert!(Phase::Archived.level() < Phase::Standby.level());
        assert!(Phase::Standby.level() < Phase::Running.level());
    }

    #[test]
    fn terminal_phases_have_no_level() {
        assert_eq!(Phase::Error.level(), None);
        assert_eq!(Phase::Deleting.level(), None);
        assert_eq!(Phase::Deleted.level(), None);
    }

    #[test]
    fn round_trips_through_str() {
        for phase in [
            Phase::Pending,
            Phase::Archived,
            Phase::Standby,
            Phase::Running,
            Phase::Error,
            Phase::Deleting,
            Phase::Deleted,
        ] {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
        }
    }
}
