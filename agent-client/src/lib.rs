pub mod args;
pub mod circuit_breaker;
pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use args::AgentClientArgs;
pub use circuit_breaker::CircuitBreakerConfig;
pub use client::Client;
pub use error::AgentError;

impl Client {
    pub fn from_args(args: &AgentClientArgs) -> Self {
        Self::new(&args.agent_endpoint, args.request_timeout())
    }
}
