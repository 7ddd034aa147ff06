use anyhow::{Context, Result};
use tokio_postgres::Client;

/// Tries to take a session-level Postgres advisory lock on `key`, returning immediately
/// either way. The lock lives on `client`'s connection and is released automatically if that
/// connection drops (§4.7: "the lock is always released by connection loss, eliminating
/// zombie-lock scenarios"). Callers must hold a dedicated, non-pooled connection — see
/// `codehub_common::postgres::connect_raw`.
pub async fn try_acquire(client: &Client, key: i64) -> Result<bool> {
    let row = client
        .query_one("SELECT pg_try_advisory_lock($1) AS acquired", &[&key])
        .await
        .context("failed to attempt advisory lock")?;
    Ok(row.get("acquired"))
}

/// Releases the advisory lock this connection holds on `key`, if any.
pub async fn release(client: &Client, key: i64) -> Result<()> {
    client
        .execute("SELECT pg_advisory_unlock($1)", &[&key])
        .await
        .context("failed to release advisory lock")?;
    Ok(())
}

/// Re-verifies the connection that holds the lock is still alive, per §4.7's "~2s budget"
/// pre-tick check. The advisory lock can only be lost by this connection closing, so a
/// successful round trip on it is sufficient proof leadership still holds.
pub async fn still_held(client: &Client) -> Result<bool> {
    Ok(client.simple_query("SELECT 1").await.is_ok())
}
