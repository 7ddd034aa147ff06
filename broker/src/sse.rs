use anyhow::{Context, Result};
use codehub_common::args::RedisArgs;
use deadpool_redis::Pool;
use redis::{AsyncCommands, Client};
use uuid::Uuid;

use crate::channels::sse_user_channel;

/// Publishes one SSE payload (already JSON-encoded) to a user's fan-out channel. Consumed by
/// every `GET /api/v1/events` connection that user currently has open (§4.5, §6.7).
pub async fn publish(pool: &Pool, user_id: Uuid, payload: &str) -> Result<()> {
    let mut conn = pool.get().await.context("failed to get redis connection")?;
    let _: () = conn
        .publish(sse_user_channel(user_id), payload)
        .await
        .context("failed to publish SSE event")?;
    Ok(())
}

/// Opens a dedicated subscription to one user's SSE channel. Each browser connection gets its
/// own `PubSub`, since the channel name is keyed dynamically per user — unlike the wake
/// channels, this can't be multiplexed through one shared broadcast subscriber.
pub async fn subscribe_user(redis_args: &RedisArgs, user_id: Uuid) -> Result<redis::aio::PubSub> {
    let mut pubsub = Client::open(redis_args.url())
        .context("failed to create redis client")?
        .get_async_pubsub()
        .await
        .context("failed to open redis pubsub")?;
    pubsub
        .subscribe(sse_user_channel(user_id))
        .await
        .context("failed to subscribe to SSE channel")?;
    Ok(pubsub)
}
