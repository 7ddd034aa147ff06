use anyhow::{Context, Result};
use deadpool_postgres::Pool;

/// Creates the `workspaces` table, its CDC triggers, and the supporting identity tables if
/// they don't already exist. Idempotent: safe to run on every coordinator/API startup.
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await.context("failed to get db connection")?;

    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS workspaces (
                id               UUID PRIMARY KEY,
                owner_user_id    UUID NOT NULL,
                name             TEXT NOT NULL,
                description      TEXT,
                memo             TEXT,

                desired_state    TEXT NOT NULL,
                deleted_at       TIMESTAMPTZ,

                phase            TEXT NOT NULL DEFAULT 'PENDING',
                phase_changed_at TIMESTAMPTZ NOT NULL DEFAULT now(),

                operation        TEXT NOT NULL DEFAULT 'NONE',
                op_started_at    TIMESTAMPTZ,
                archive_op_id    TEXT,

                conditions       JSONB NOT NULL DEFAULT '{}'::jsonb,
                observed_at      TIMESTAMPTZ,

                archive_key      TEXT,
                home_ctx         TEXT,
                last_access_at   TIMESTAMPTZ,

                error_reason     TEXT,
                error_count      INT NOT NULL DEFAULT 0,

                created_at       TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at       TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE INDEX IF NOT EXISTS idx_workspaces_owner ON workspaces (owner_user_id)
                WHERE deleted_at IS NULL;
            CREATE INDEX IF NOT EXISTS idx_workspaces_operation ON workspaces (operation)
                WHERE operation <> 'NONE';
            CREATE INDEX IF NOT EXISTS idx_workspaces_phase_changed
                ON workspaces (phase, phase_changed_at);
            "#,
        )
        .await
        .context("failed to create workspaces table")?;

    client
        .batch_execute(
            r#"
            CREATE OR REPLACE FUNCTION notify_ws_sse() RETURNS trigger AS $$
            BEGIN
                PERFORM pg_notify('ws_sse', json_build_object(
                    'id', NEW.id,
                    'user_id', NEW.owner_user_id,
                    'phase', NEW.phase,
                    'operation', NEW.operation,
                    'error_reason', NEW.error_reason,
                    'name', NEW.name,
                    'description', NEW.description,
                    'memo', NEW.memo
                )::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS workspaces_notify_sse ON workspaces;
            CREATE TRIGGER workspaces_notify_sse
                AFTER UPDATE OF phase, operation, error_reason, name, description, memo
                ON workspaces
                FOR EACH ROW
                WHEN (NEW.* IS DISTINCT FROM OLD.*)
                EXECUTE FUNCTION notify_ws_sse();

            CREATE OR REPLACE FUNCTION notify_ws_wake() RETURNS trigger AS $$
            BEGIN
                PERFORM pg_notify('ws_wake', json_build_object(
                    'id', NEW.id,
                    'desired_state', NEW.desired_state
                )::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS workspaces_notify_wake ON workspaces;
            CREATE TRIGGER workspaces_notify_wake
                AFTER UPDATE OF desired_state ON workspaces
                FOR EACH ROW
                WHEN (NEW.desired_state IS DISTINCT FROM OLD.desired_state)
                EXECUTE FUNCTION notify_ws_wake();

            CREATE OR REPLACE FUNCTION notify_ws_deleted() RETURNS trigger AS $$
            BEGIN
                PERFORM pg_notify('ws_deleted', json_build_object(
                    'id', NEW.id,
                    'user_id', NEW.owner_user_id
                )::text);
                RETURN NEW;
            END;
            $$ LANGUAGE plpgsql;

            DROP TRIGGER IF EXISTS workspaces_notify_deleted ON workspaces;
            CREATE TRIGGER workspaces_notify_deleted
                AFTER UPDATE OF deleted_at ON workspaces
                FOR EACH ROW
                WHEN (OLD.deleted_at IS NULL AND NEW.deleted_at IS NOT NULL)
                EXECUTE FUNCTION notify_ws_deleted();
            "#,
        )
        .await
        .context("failed to install CDC triggers")?;

    tracing::info!("database schema initialized");
    Ok(())
}
