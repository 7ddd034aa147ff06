use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codehub_types::{Conditions, DesiredState, ErrorReason, Operation, Phase, Workspace, WorkspaceId};
use tokio_postgres::Row;
use uuid::Uuid;

/// Every column `workspaces.rs`'s queries select, in the order callers should list them.
pub const WORKSPACE_COLUMNS: &str = "id, owner_user_id, name, description, memo, \
    desired_state, deleted_at, phase, phase_changed_at, operation, op_started_at, \
    archive_op_id, conditions, observed_at, archive_key, home_ctx, last_access_at, \
    error_reason, error_count, created_at, updated_at";

pub fn workspace_from_row(row: &Row) -> Result<Workspace> {
    let id: Uuid = row.get("id");
    let desired_state: String = row.get("desired_state");
    let phase: String = row.get("phase");
    let operation: String = row.get("operation");
    let conditions: serde_json::Value = row.get("conditions");
    let error_reason: Option<String> = row.get("error_reason");

    Ok(Workspace {
        id: WorkspaceId::from(id),
        owner_user_id: row.get("owner_user_id"),
        name: row.get("name"),
        description: row.get("description"),
        memo: row.get("memo"),
        desired_state: desired_state
            .parse::<DesiredState>()
            .context("invalid desired_state in database row")?,
        deleted_at: row.get("deleted_at"),
        phase: phase.parse::<Phase>().context("invalid phase in database row")?,
        phase_changed_at: row.get("phase_changed_at"),
        operation: operation
            .parse::<Operation>()
            .context("invalid operation in database row")?,
        op_started_at: row.get("op_started_at"),
        archive_op_id: row.get("archive_op_id"),
        conditions: serde_json::from_value(conditions)
            .context("invalid conditions document in database row")?,
        observed_at: row.get("observed_at"),
        archive_key: row.get("archive_key"),
        home_ctx: row.get("home_ctx"),
        last_access_at: row.get("last_access_at"),
        error_reason: error_reason
            .map(|r| r.parse::<ErrorReason>())
            .transpose()
            .context("invalid error_reason in database row")?,
        error_count: row.get("error_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub fn conditions_to_json(conditions: &Conditions) -> Result<serde_json::Value> {
    serde_json::to_value(conditions).context("failed to serialize conditions")
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
