use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use codehub_types::{Conditions, DesiredState, ErrorReason, Operation, Phase, Workspace, WorkspaceId};
use deadpool_postgres::Pool;
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use crate::row::{conditions_to_json, workspace_from_row, WORKSPACE_COLUMNS};

/// Creates a new workspace row. Mirrors §3.4: rows are born `phase=PENDING`, `operation=NONE`,
/// with no resources observed yet.
pub async fn create(
    pool: &Pool,
    owner_user_id: Uuid,
    name: &str,
    description: Option<&str>,
    memo: Option<&str>,
    desired_state: DesiredState,
) -> Result<Workspace> {
    let client = pool.get().await.context("failed to get db connection")?;
    let id = WorkspaceId::new();
    let now = Utc::now();
    let conditions = conditions_to_json(&Conditions::unknown(now))?;

    let row = client
        .query_one(
            &format!(
                r#"
                INSERT INTO workspaces (
                    id, owner_user_id, name, description, memo,
                    desired_state, phase, phase_changed_at,
                    operation, conditions, last_access_at,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, 'PENDING', $7, 'NONE', $8, $7, $7, $7)
                RETURNING {WORKSPACE_COLUMNS}
                "#
            ),
            &[
                &id.as_uuid(),
                &owner_user_id,
                &name,
                &description,
                &memo,
                &desired_state.to_string(),
                &now,
                &conditions,
            ],
        )
        .await
        .context("failed to insert workspace")?;

    workspace_from_row(&row)
}

pub async fn get(pool: &Pool, id: WorkspaceId) -> Result<Option<Workspace>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let row = client
        .query_opt(
            &format!("SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE id = $1"),
            &[&id.as_uuid()],
        )
        .await
        .context("failed to query workspace")?;
    row.as_ref().map(workspace_from_row).transpose()
}

pub struct ListPage {
    pub items: Vec<Workspace>,
    pub offset: i64,
    pub limit: i64,
    pub full_count: i64,
}

/// Lists the non-deleted workspaces owned by a user, newest first.
pub async fn list_for_owner(
    pool: &Pool,
    owner_user_id: Uuid,
    offset: i64,
    limit: i64,
) -> Result<ListPage> {
    let client = pool.get().await.context("failed to get db connection")?;
    let rows = client
        .query(
            &format!(
                r#"
                SELECT {WORKSPACE_COLUMNS}, COUNT(*) OVER() AS full_count
                FROM workspaces
                WHERE owner_user_id = $1 AND deleted_at IS NULL
                ORDER BY created_at DESC, id DESC
                LIMIT $2 OFFSET $3
                "#
            ),
            &[&owner_user_id, &limit, &offset],
        )
        .await
        .context("failed to list workspaces")?;

    let full_count: i64 = rows.first().map(|r| r.get("full_count")).unwrap_or(0);
    let items = rows
        .iter()
        .map(workspace_from_row)
        .collect::<Result<Vec<_>>>()?;

    Ok(ListPage {
        items,
        offset,
        limit,
        full_count,
    })
}

/// Every non-deleted workspace, used by the Workspace Controller and Observer ticks.
pub async fn list_active(pool: &Pool) -> Result<Vec<Workspace>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let rows = client
        .query(
            &format!(
                "SELECT {WORKSPACE_COLUMNS} FROM workspaces WHERE phase <> 'DELETED' OR deleted_at IS NULL"
            ),
            &[],
        )
        .await
        .context("failed to list active workspaces")?;
    rows.iter().map(workspace_from_row).collect()
}

pub async fn has_in_flight_operation(pool: &Pool) -> Result<bool> {
    let client = pool.get().await.context("failed to get db connection")?;
    let row = client
        .query_one(
            "SELECT EXISTS (SELECT 1 FROM workspaces WHERE operation <> 'NONE') AS any_in_flight",
            &[],
        )
        .await
        .context("failed to check in-flight operations")?;
    Ok(row.get("any_in_flight"))
}

/// API-owned PATCH: `name`/`description`/`memo` and/or `desired_state`. Rejected once the row
/// is soft-deleted (§3.3 invariant 2: API never writes a terminal row back to life).
pub async fn update_metadata(
    pool: &Pool,
    id: WorkspaceId,
    name: Option<&str>,
    description: Option<&str>,
    memo: Option<&str>,
    desired_state: Option<DesiredState>,
) -> Result<Option<Workspace>> {
    let client = pool.get().await.context("failed to get db connection")?;

    let mut set_clauses = vec!["updated_at = now()".to_string()];
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    let mut idx = 1;

    if let Some(name) = &name {
        idx += 1;
        set_clauses.push(format!("name = ${idx}"));
        params.push(name);
    }
    if let Some(description) = &description {
        idx += 1;
        set_clauses.push(format!("description = ${idx}"));
        params.push(description);
    }
    if let Some(memo) = &memo {
        idx += 1;
        set_clauses.push(format!("memo = ${idx}"));
        params.push(memo);
    }
    let desired_state_str = desired_state.map(|d| d.to_string());
    if let Some(desired_state_str) = &desired_state_str {
        idx += 1;
        set_clauses.push(format!("desired_state = ${idx}"));
        params.push(desired_state_str);
    }

    let query = format!(
        "UPDATE workspaces SET {} WHERE id = $1 AND deleted_at IS NULL RETURNING {WORKSPACE_COLUMNS}",
        set_clauses.join(", ")
    );
    let id_uuid = id.as_uuid();
    let mut all_params: Vec<&(dyn ToSql + Sync)> = vec![&id_uuid];
    all_params.extend(params);

    let row = client
        .query_opt(&query, &all_params)
        .await
        .context("failed to update workspace metadata")?;
    row.as_ref().map(workspace_from_row).transpose()
}

/// API-owned soft delete: sets `deleted_at` and `desired_state=DELETED` in one commit.
pub async fn soft_delete(pool: &Pool, id: WorkspaceId) -> Result<Option<Workspace>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let row = client
        .query_opt(
            &format!(
                r#"
                UPDATE workspaces
                SET deleted_at = now(), desired_state = $2, updated_at = now()
                WHERE id = $1 AND deleted_at IS NULL
                RETURNING {WORKSPACE_COLUMNS}
                "#
            ),
            &[&id.as_uuid(), &DesiredState::Deleted.to_string()],
        )
        .await
        .context("failed to soft-delete workspace")?;
    row.as_ref().map(workspace_from_row).transpose()
}

/// Observer-owned: overwrites `conditions` and `observed_at`. Read-then-write with no
/// compare (§5): the Observer always wins the race against a concurrent WC read.
pub async fn update_conditions(
    pool: &Pool,
    id: WorkspaceId,
    conditions: &Conditions,
    observed_at: DateTime<Utc>,
) -> Result<()> {
    let client = pool.get().await.context("failed to get db connection")?;
    let json = conditions_to_json(conditions)?;
    client
        .execute(
            "UPDATE workspaces SET conditions = $2, observed_at = $3 WHERE id = $1",
            &[&id.as_uuid(), &json, &observed_at],
        )
        .await
        .context("failed to update workspace conditions")?;
    Ok(())
}

/// TTL-owned: records the latest proxy activity, never going backwards (mirrors the
/// broker-side `ZADD … GT` semantics at the database layer).
pub async fn bump_last_access(pool: &Pool, id: WorkspaceId, at: DateTime<Utc>) -> Result<()> {
    let client = pool.get().await.context("failed to get db connection")?;
    client
        .execute(
            r#"
            UPDATE workspaces
            SET last_access_at = GREATEST(COALESCE(last_access_at, $2), $2)
            WHERE id = $1
            "#,
            &[&id.as_uuid(), &at],
        )
        .await
        .context("failed to bump workspace activity")?;
    Ok(())
}

/// TTL-owned: workspaces past the standby TTL (§4.4).
pub async fn ttl_standby_candidates(pool: &Pool, threshold_secs: i64) -> Result<Vec<WorkspaceId>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let rows = client
        .query(
            r#"
            SELECT id FROM workspaces
            WHERE phase = 'RUNNING' AND operation = 'NONE'
              AND last_access_at IS NOT NULL
              AND now() - last_access_at > make_interval(secs => $1)
            "#,
            &[&(threshold_secs as f64)],
        )
        .await
        .context("failed to query standby TTL candidates")?;
    Ok(rows
        .iter()
        .map(|r| WorkspaceId::from(r.get::<_, Uuid>("id")))
        .collect())
}

/// TTL-owned: workspaces past the archive TTL (§4.4).
pub async fn ttl_archive_candidates(pool: &Pool, threshold_secs: i64) -> Result<Vec<WorkspaceId>> {
    let client = pool.get().await.context("failed to get db connection")?;
    let rows = client
        .query(
            r#"
            SELECT id FROM workspaces
            WHERE phase = 'STANDBY' AND operation = 'NONE'
              AND now() - phase_changed_at > make_interval(secs => $1)
            "#,
            &[&(threshold_secs as f64)],
        )
        .await
        .context("failed to query archive TTL candidates")?;
    Ok(rows
        .iter()
        .map(|r| WorkspaceId::from(r.get::<_, Uuid>("id")))
        .collect())
}

/// TTL-owned: sets `desired_state` only (§3.3 invariant 2).
pub async fn set_desired_state(pool: &Pool, id: WorkspaceId, desired_state: DesiredState) -> Result<()> {
    let client = pool.get().await.context("failed to get db connection")?;
    client
        .execute(
            "UPDATE workspaces SET desired_state = $2 WHERE id = $1",
            &[&id.as_uuid(), &desired_state.to_string()],
        )
        .await
        .context("failed to set desired_state")?;
    Ok(())
}

/// What the Workspace Controller writes after judging + planning one workspace. `commit`
/// below is the sole place WC-owned fields are written, and the only writer of `operation`,
/// `phase`, and the failure-bookkeeping fields (§3.3 invariant 2).
pub struct WcCommit {
    pub phase: Phase,
    pub phase_changed: bool,
    pub operation: Operation,
    pub op_started_at: Option<DateTime<Utc>>,
    pub archive_op_id: Option<String>,
    pub archive_key: Option<String>,
    pub home_ctx: Option<String>,
    pub error_reason: Option<ErrorReason>,
    pub error_count: i32,
    pub healthy: bool,
}

/// Commits a WC tick's outcome for one workspace. `expected_operation` is the `operation`
/// value the tick's judgment/planning was computed against; the `WHERE operation = …` clause
/// is the CAS from §4.2 ("Operation-start CAS") generalized to every WC write, not just
/// operation starts — any writer that raced us past that point should lose, not overwrite.
///
/// Returns `false` if the CAS missed (someone else committed a WC write first); the caller
/// should skip this tick for the workspace and re-plan fresh next time.
pub async fn commit_wc_tick(
    pool: &Pool,
    id: WorkspaceId,
    expected_operation: Operation,
    commit: &WcCommit,
) -> Result<bool> {
    let client = pool.get().await.context("failed to get db connection")?;

    let phase_changed_clause = if commit.phase_changed {
        ", phase_changed_at = now()"
    } else {
        ""
    };

    let query = format!(
        r#"
        UPDATE workspaces
        SET phase = $3,
            operation = $4,
            op_started_at = $5,
            archive_op_id = $6,
            archive_key = $7,
            home_ctx = $8,
            error_reason = $9,
            error_count = $10,
            conditions = jsonb_set(conditions, '{{policy.healthy}}', $11::jsonb),
            updated_at = now()
            {phase_changed_clause}
        WHERE id = $1 AND operation = $2
        "#
    );

    let healthy_condition = serde_json::json!({
        "status": if commit.healthy { "TRUE" } else { "FALSE" },
        "reason": commit.error_reason.map(|r| r.to_string()),
        "message": serde_json::Value::Null,
        "observed_at": Utc::now(),
    });

    let rows_affected = client
        .execute(
            &query,
            &[
                &id.as_uuid(),
                &expected_operation.to_string(),
                &commit.phase.to_string(),
                &commit.operation.to_string(),
                &commit.op_started_at,
                &commit.archive_op_id,
                &commit.archive_key,
                &commit.home_ctx,
                &commit.error_reason.map(|r| r.to_string()),
                &commit.error_count,
                &healthy_condition,
            ],
        )
        .await
        .context("failed to commit workspace controller tick")?;

    Ok(rows_affected > 0)
}
