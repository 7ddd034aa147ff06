use std::time::Duration;

use clap::Parser;
use codehub_agent_client::AgentClientArgs;
use codehub_common::args::{PostgresArgs, RedisArgs};
use codehub_types::OperationTimeouts;

/// Process-wide configuration, parsed once in `main` and passed down by reference (SPEC_FULL
/// §11.1's "no module-level singletons" redesign). Every knob from spec.md §6.8.
#[derive(Parser, Debug, Clone)]
pub struct CoordinatorArgs {
    #[command(flatten)]
    pub postgres: PostgresArgs,

    #[command(flatten)]
    pub redis: RedisArgs,

    #[command(flatten)]
    pub agent: AgentClientArgs,

    /// Loop polling interval when no operation is in flight. Default 15s.
    #[arg(long, env = "COORDINATOR_IDLE_INTERVAL", default_value_t = 15)]
    pub coordinator_idle_interval_secs: u64,

    /// Polling interval while any operation is in flight. Default 1s.
    #[arg(long, env = "COORDINATOR_ACTIVE_INTERVAL", default_value_t = 1)]
    pub coordinator_active_interval_secs: u64,

    /// TTL loop tick. Default 60s.
    #[arg(long, env = "COORDINATOR_TTL_INTERVAL", default_value_t = 60)]
    pub coordinator_ttl_interval_secs: u64,

    /// RUNNING→STANDBY idleness threshold. Default 600s.
    #[arg(long, env = "TTL_STANDBY_SECONDS", default_value_t = 600)]
    pub ttl_standby_seconds: i64,

    /// STANDBY→ARCHIVED idleness threshold. Default 1800s.
    #[arg(long, env = "TTL_ARCHIVE_SECONDS", default_value_t = 1800)]
    pub ttl_archive_seconds: i64,

    /// Max `error_count` before a retryable ERROR becomes terminal (`RetryExceeded`).
    #[arg(long, env = "MAX_RETRY", default_value_t = 5)]
    pub max_retry: i32,

    /// `PROVISIONING` timeout budget (§6.8, §9 Open Question 2). Default 60s.
    #[arg(long, env = "OPERATION_TIMEOUT_PROVISIONING", default_value_t = 60)]
    pub operation_timeout_provisioning_secs: u64,

    /// `CREATE_EMPTY_ARCHIVE` timeout budget. Default 120s.
    #[arg(long, env = "OPERATION_TIMEOUT_CREATE_EMPTY_ARCHIVE", default_value_t = 120)]
    pub operation_timeout_create_empty_archive_secs: u64,

    /// `RESTORING` timeout budget. Default 1800s.
    #[arg(long, env = "OPERATION_TIMEOUT_RESTORING", default_value_t = 1800)]
    pub operation_timeout_restoring_secs: u64,

    /// `STARTING` timeout budget. Default 120s.
    #[arg(long, env = "OPERATION_TIMEOUT_STARTING", default_value_t = 120)]
    pub operation_timeout_starting_secs: u64,

    /// `STOPPING` timeout budget. Default 60s.
    #[arg(long, env = "OPERATION_TIMEOUT_STOPPING", default_value_t = 60)]
    pub operation_timeout_stopping_secs: u64,

    /// `ARCHIVING` timeout budget. Default 1800s.
    #[arg(long, env = "OPERATION_TIMEOUT_ARCHIVING", default_value_t = 1800)]
    pub operation_timeout_archiving_secs: u64,

    /// `DELETING` timeout budget. Default 300s.
    #[arg(long, env = "OPERATION_TIMEOUT_DELETING", default_value_t = 300)]
    pub operation_timeout_deleting_secs: u64,

    /// GC loop cadence. Default 4h.
    #[arg(long, env = "GC_INTERVAL", default_value_t = 4 * 3600)]
    pub gc_interval_secs: u64,

    /// Archives kept per workspace even if unreferenced. Default 3.
    #[arg(long, env = "GC_RETENTION_COUNT", default_value_t = 3)]
    pub gc_retention_count: u32,

    /// Grace period before a newly detected orphan is eligible for reclaim. Default 6h.
    #[arg(long, env = "GC_ORPHAN_GRACE", default_value_t = 6 * 3600)]
    pub gc_orphan_grace_secs: u64,

    #[arg(long, env = "CIRCUIT_BREAKER_FAILS", default_value_t = 5)]
    pub circuit_breaker_fails: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_SUCCESSES", default_value_t = 2)]
    pub circuit_breaker_successes: u32,

    #[arg(long, env = "CIRCUIT_BREAKER_TIMEOUT", default_value_t = 30)]
    pub circuit_breaker_timeout_secs: u64,

    #[arg(long, env = "REDIS_CHANNEL_SSE_PREFIX", default_value = "codehub:sse")]
    pub redis_channel_sse_prefix: String,

    #[arg(long, env = "REDIS_CHANNEL_WAKE_PREFIX", default_value = "codehub:wake")]
    pub redis_channel_wake_prefix: String,

    /// UI keep-alive. Default 30s.
    #[arg(long, env = "SSE_HEARTBEAT_INTERVAL", default_value_t = 30)]
    pub sse_heartbeat_interval_secs: u64,
}

impl CoordinatorArgs {
    pub fn idle_interval(&self) -> Duration {
        Duration::from_secs(self.coordinator_idle_interval_secs)
    }

    pub fn active_interval(&self) -> Duration {
        Duration::from_secs(self.coordinator_active_interval_secs)
    }

    pub fn ttl_interval(&self) -> Duration {
        Duration::from_secs(self.coordinator_ttl_interval_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs)
    }

    pub fn gc_orphan_grace(&self) -> Duration {
        Duration::from_secs(self.gc_orphan_grace_secs)
    }

    pub fn operation_timeouts(&self) -> OperationTimeouts {
        OperationTimeouts {
            provisioning: Duration::from_secs(self.operation_timeout_provisioning_secs),
            create_empty_archive: Duration::from_secs(self.operation_timeout_create_empty_archive_secs),
            restoring: Duration::from_secs(self.operation_timeout_restoring_secs),
            starting: Duration::from_secs(self.operation_timeout_starting_secs),
            stopping: Duration::from_secs(self.operation_timeout_stopping_secs),
            archiving: Duration::from_secs(self.operation_timeout_archiving_secs),
            deleting: Duration::from_secs(self.operation_timeout_deleting_secs),
        }
    }
}
