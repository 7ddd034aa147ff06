use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Enumerated reason a workspace is in `Phase::Error` (§4.2 ERROR classification table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorReason {
    Timeout,
    RetryExceeded,
    ActionFailed,
    ImagePullFailed,
    ContainerWithoutVolume,
    ArchiveCorrupted,
    DataLost,
    Unreachable,
}

impl ErrorReason {
    /// Whether this reason is terminal (never retried) or transient-until-`MAX_RETRY`.
    pub fn is_terminal(self) -> bool {
        !matches!(self, ErrorReason::ActionFailed | ErrorReason::Unreachable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorReason::Timeout => "Timeout",
            ErrorReason::RetryExceeded => "RetryExceeded",
            ErrorReason::ActionFailed => "ActionFailed",
            ErrorReason::ImagePullFailed => "ImagePullFailed",
            ErrorReason::ContainerWithoutVolume => "ContainerWithoutVolume",
            ErrorReason::ArchiveCorrupted => "ArchiveCorrupted",
            ErrorReason::DataLost => "DataLost",
            ErrorReason::Unreachable => "Unreachable",
        }
    }
}

impl fmt::Display for ErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorReason {
    type Err = crate::error::ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Timeout" => Ok(ErrorReason::Timeout),
            "RetryExceeded" => Ok(ErrorReason::RetryExceeded),
            "ActionFailed" => Ok(ErrorReason::ActionFailed),
            "ImagePullFailed" => Ok(ErrorReason::ImagePullFailed),
            "ContainerWithoutVolume" => Ok(ErrorReason::ContainerWithoutVolume),
            "ArchiveCorrupted" => Ok(ErrorReason::ArchiveCorrupted),
            "DataLost" => Ok(ErrorReason::DataLost),
            "Unreachable" => Ok(ErrorReason::Unreachable),
            other => Err(crate::error::ParseEnumError::unknown("ErrorReason", other)),
        }
    }
}
