use uuid::Uuid;

/// Hint channel consumed by the Observer (§6.6). Producers: EventListener.
pub const WAKE_OBSERVER: &str = "codehub:wake:ob";

/// Hint channel consumed by the Workspace Controller (§6.6). Producers: EventListener,
/// Observer (after a condition change).
pub const WAKE_WC: &str = "codehub:wake:wc";

/// Ordered set of `(workspace_id, ts)` flushed by proxies, drained by the TTL loop (§6.6).
pub const ACTIVITY_SET: &str = "codehub:activity";

/// Per-user SSE fan-out channel (§6.6). Producers: EventListener.
pub fn sse_user_channel(user_id: Uuid) -> String {
    format!("codehub:sse:{user_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_channel_is_namespaced_per_user() {
        let a = Uuid::nil();
        assert_eq!(sse_user_channel(a), "codehub:sse:00000000-0000-0000-0000-000000000000");
    }
}
