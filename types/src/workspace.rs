use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Conditions, DesiredState, ErrorReason, Operation, Phase, WorkspaceId};

/// The workspace row (§3.1). One per workspace; soft-deleted rows linger until GC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub owner_user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub memo: Option<String>,

    pub desired_state: DesiredState,
    pub deleted_at: Option<DateTime<Utc>>,

    pub phase: Phase,
    pub phase_changed_at: DateTime<Utc>,

    pub operation: Operation,
    pub op_started_at: Option<DateTime<Utc>>,
    pub archive_op_id: Option<String>,

    pub conditions: Conditions,
    pub observed_at: Option<DateTime<Utc>>,

    pub archive_key: Option<String>,
    pub home_ctx: Option<String>,

    pub last_access_at: Option<DateTime<Utc>>,

    pub error_reason: Option<ErrorReason>,
    pub error_count: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    /// Archive path for an archive created under `archive_op_id`, per §4.2's commit
    /// formula: `{workspace_id}/{archive_op_id}/home.tar.zst`.
    pub fn archive_path(workspace_id: WorkspaceId, archive_op_id: &str) -> String {
        format!("{workspace_id}/{archive_op_id}/home.tar.zst")
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}
