use codehub_common::args::RedisArgs;
use deadpool_postgres::Pool;
use deadpool_redis::Pool as RedisPool;

/// Shared application state, grounded on `meta::server::AppState` (§12).
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool,
    pub redis: RedisPool,
    pub redis_args: RedisArgs,
    pub heartbeat_interval_secs: u64,
}
