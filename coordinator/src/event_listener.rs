use codehub_broker::wake;
use codehub_common::args::PostgresArgs;
use deadpool_redis::Pool as RedisPool;
use futures::StreamExt;
use postgres::NoTls;
use serde::Deserialize;
use tokio_postgres::{AsyncMessage, Config as PostgresConfig};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
struct WsSsePayload {
    id: String,
    user_id: String,
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    operation: Option<String>,
    #[serde(default)]
    error_reason: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    memo: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WsDeletedPayload {
    id: String,
    user_id: String,
}

/// Holds a dedicated `LISTEN` session open on three channels and fans each notification out
/// to the broker (§4.5). Called back into by `leader::run_while_leader` under
/// `leader::EVENT_LISTENER_LOCK_KEY`, a separate advisory lock from the one electing the
/// Observer/WC/TTL/GC leader, so at most one process holds the `LISTEN` at a time independent
/// of which replica drives the other loops; a lost lock ends this loop and the caller
/// re-acquires (§4.7).
///
/// Unlike `codehub_common::postgres::connect_raw` (which spawns the connection away and
/// discards it, fine for a plain query session), this needs the connection's own message
/// stream to observe `NOTIFY` payloads, so it drives the connection itself.
pub async fn run(cancel: CancellationToken, pg_args: PostgresArgs, redis: RedisPool) -> anyhow::Result<()> {
    let mut pg_cfg = PostgresConfig::new();
    pg_cfg.host(&pg_args.postgres_host);
    pg_cfg.port(pg_args.postgres_port);
    pg_cfg.dbname(&pg_args.postgres_database);
    pg_cfg.user(&pg_args.postgres_username);
    if let Some(pw) = &pg_args.postgres_password {
        pg_cfg.password(pw);
    }
    let (client, mut connection) = pg_cfg.connect(NoTls).await?;

    for channel in ["ws_sse", "ws_wake", "ws_deleted"] {
        client.execute(&format!("LISTEN {channel}"), &[]).await?;
    }
    info!("event listener subscribed to ws_sse, ws_wake, ws_deleted");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            next = connection.next() => {
                let Some(message) = next else {
                    warn!("postgres notification connection closed; reconnecting");
                    return Ok(());
                };
                match message {
                    Ok(AsyncMessage::Notification(n)) => {
                        handle(&redis, n.channel(), n.payload()).await;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "error polling postgres notifications");
                        return Ok(());
                    }
                }
            }
        }
    }
}

async fn handle(redis: &RedisPool, channel: &str, payload: &str) {
    match channel {
        "ws_sse" => match serde_json::from_str::<WsSsePayload>(payload) {
            Ok(event) => {
                let body = serde_json::json!({
                    "type": "workspace_updated",
                    "id": event.id,
                    "phase": event.phase,
                    "operation": event.operation,
                    "error_reason": event.error_reason,
                    "name": event.name,
                    "description": event.description,
                    "memo": event.memo,
                });
                publish_to_user(redis, &event.user_id, &body.to_string()).await;
            }
            Err(e) => warn!(error = %e, "failed to decode ws_sse payload"),
        },
        "ws_deleted" => match serde_json::from_str::<WsDeletedPayload>(payload) {
            Ok(event) => {
                let body = serde_json::json!({"type": "workspace_deleted", "id": event.id});
                publish_to_user(redis, &event.user_id, &body.to_string()).await;
            }
            Err(e) => warn!(error = %e, "failed to decode ws_deleted payload"),
        },
        "ws_wake" => {
            let _ = wake::publish_wake_wc(redis).await;
            let _ = wake::publish_wake_observer(redis).await;
        }
        other => warn!(channel = other, "unexpected notification channel"),
    }
}

async fn publish_to_user(redis: &RedisPool, user_id: &str, payload: &str) {
    let Ok(user_id) = user_id.parse::<uuid::Uuid>() else {
        warn!(user_id, "ws_sse/ws_deleted payload carried an unparseable user id");
        return;
    };
    if let Err(e) = codehub_broker::sse::publish(redis, user_id, payload).await {
        warn!(error = %e, "failed to publish sse event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_minimal_ws_sse_payload() {
        let payload = serde_json::json!({
            "id": "0198f4c2-0000-7000-8000-000000000000",
            "user_id": "0198f4c2-0000-7000-8000-000000000001",
        })
        .to_string();
        let decoded: WsSsePayload = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.phase, None);
        assert_eq!(decoded.error_reason, None);
    }

    #[test]
    fn decodes_full_ws_sse_payload() {
        let payload = serde_json::json!({
            "id": "0198f4c2-0000-7000-8000-000000000000",
            "user_id": "0198f4c2-0000-7000-8000-000000000001",
            "phase": "RUNNING",
            "operation": "NONE",
            "error_reason": null,
            "name": "demo",
            "description": "a workspace",
            "memo": null,
        })
        .to_string();
        let decoded: WsSsePayload = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.phase.as_deref(), Some("RUNNING"));
        assert_eq!(decoded.name.as_deref(), Some("demo"));
    }

    #[test]
    fn decodes_ws_deleted_payload() {
        let payload = serde_json::json!({
            "id": "0198f4c2-0000-7000-8000-000000000000",
            "user_id": "0198f4c2-0000-7000-8000-000000000001",
        })
        .to_string();
        let decoded: WsDeletedPayload = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded.id, "0198f4c2-0000-7000-8000-000000000000");
    }
}
