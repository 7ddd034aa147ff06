use std::time::Duration;

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct AgentClientArgs {
    /// Base URL of the Workspace Runtime Agent for this cluster, e.g. http://agent.local:8080
    #[arg(long, env = "CODEHUB_AGENT_ENDPOINT")]
    pub agent_endpoint: String,

    /// Per-request timeout against the Agent, in milliseconds.
    #[arg(long, env = "CODEHUB_AGENT_TIMEOUT_MS", default_value_t = 15_000)]
    pub agent_timeout_ms: u64,
}

impl AgentClientArgs {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.agent_timeout_ms)
    }
}
