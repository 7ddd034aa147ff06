use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use tracing::warn;

use crate::auth::UserId;
use crate::state::AppState;

/// `GET /api/v1/events` (§6.7, §12): one dedicated Redis subscription per connection to the
/// caller's per-user SSE channel, re-emitted as `workspace_updated`/`workspace_deleted`
/// events. `axum`'s `KeepAlive` covers the `heartbeat` event.
pub async fn events(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let heartbeat = Duration::from_secs(state_heartbeat_secs(&state));

    let pubsub = match codehub_broker::sse::subscribe_user(&state.redis_args, user_id).await {
        Ok(pubsub) => pubsub,
        Err(e) => {
            warn!(error = %e, %user_id, "failed to open SSE subscription");
            return Sse::new(stream::empty().boxed()).keep_alive(KeepAlive::new().interval(heartbeat));
        }
    };

    let events = pubsub.into_on_message().filter_map(|msg| async move {
        let payload = msg.get_payload::<String>().ok()?;
        let event_type = event_type_of(&payload);
        Some(Ok(Event::default().event(event_type).data(payload)))
    });

    Sse::new(events.boxed()).keep_alive(KeepAlive::new().interval(heartbeat).text("heartbeat"))
}

fn state_heartbeat_secs(state: &AppState) -> u64 {
    state.heartbeat_interval_secs
}

/// Reads the `type` discriminant the CDC fan-out stamped onto the payload, falling back to
/// `workspace_updated` for anything malformed rather than dropping the event.
fn event_type_of(payload: &str) -> &'static str {
    let Ok(parsed) = serde_json::from_str::<serde_json::Value>(payload) else {
        return "workspace_updated";
    };
    match parsed.get("type").and_then(|t| t.as_str()) {
        Some("workspace_deleted") => "workspace_deleted",
        _ => "workspace_updated",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_workspace_deleted() {
        assert_eq!(event_type_of(r#"{"type":"workspace_deleted","id":"x"}"#), "workspace_deleted");
    }

    #[test]
    fn defaults_to_workspace_updated() {
        assert_eq!(event_type_of(r#"{"type":"workspace_updated","id":"x"}"#), "workspace_updated");
        assert_eq!(event_type_of("not json"), "workspace_updated");
        assert_eq!(event_type_of(r#"{"id":"x"}"#), "workspace_updated");
    }
}
