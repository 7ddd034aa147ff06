pub mod conditions;
pub mod desired_state;
pub mod error;
pub mod error_reason;
pub mod id;
pub mod judge;
pub mod operation;
pub mod phase;
pub mod plan;
pub mod workspace;

pub use conditions::{
    ArchiveObservation, Condition, ConditionStatus, Conditions, ObservedFailure, RestoreObservation,
};
pub use desired_state::DesiredState;
pub use error::ParseEnumError;
pub use error_reason::ErrorReason;
pub use id::WorkspaceId;
pub use judge::{judge, Judgment};
pub use operation::{Operation, OperationTimeouts};
pub use phase::Phase;
pub use plan::{operation_elapsed, plan, PlannedAction};
pub use workspace::Workspace;
