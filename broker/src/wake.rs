use anyhow::{Context, Result};
use bytes::Bytes;
use codehub_common::args::RedisArgs;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::channels::{WAKE_OBSERVER, WAKE_WC};

/// Publishes a wake hint. Fire-and-forget: a lost or reordered hint never causes
/// incorrectness, only latency (§5 "Ordering guarantees").
pub async fn publish(pool: &Pool, channel: &str) -> Result<()> {
    let mut conn = pool.get().await.context("failed to get redis connection")?;
    let _: () = conn
        .publish(channel, b"wake".as_slice())
        .await
        .context("failed to publish wake hint")?;
    Ok(())
}

pub async fn publish_wake_observer(pool: &Pool) -> Result<()> {
    publish(pool, WAKE_OBSERVER).await
}

pub async fn publish_wake_wc(pool: &Pool) -> Result<()> {
    publish(pool, WAKE_WC).await
}

/// Subscribes to a wake channel, broadcasting every message to `tx` until `cancel` fires.
/// Reconnects on subscription drop, per `codehub_common::redis::listen_for_work`'s loop shape.
pub async fn subscribe(
    cancel: CancellationToken,
    redis_args: RedisArgs,
    channel: &str,
    tx: broadcast::Sender<Bytes>,
) -> Result<()> {
    codehub_common::redis::listen_for_work(cancel, redis_args, tx, channel).await
}

pub async fn subscribe_observer(
    cancel: CancellationToken,
    redis_args: RedisArgs,
    tx: broadcast::Sender<Bytes>,
) -> Result<()> {
    subscribe(cancel, redis_args, WAKE_OBSERVER, tx).await
}

pub async fn subscribe_wc(
    cancel: CancellationToken,
    redis_args: RedisArgs,
    tx: broadcast::Sender<Bytes>,
) -> Result<()> {
    subscribe(cancel, redis_args, WAKE_WC, tx).await
}
