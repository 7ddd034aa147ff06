use thiserror::Error;

/// How an Agent call failed, classified per §4.7's retry policy.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent reported error {code}: {message}")]
    Action { code: String, message: String },

    #[error("agent unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("agent request timed out")]
    Timeout,

    #[error("circuit breaker open for this agent")]
    CircuitOpen,

    #[error("failed to decode agent response: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("agent response was not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
}

impl AgentError {
    /// §4.7: "Classify error as transient (5xx, timeout, rate-limited, connection-closed)
    /// or permanent (4xx other than 429, not-found, access-denied)."
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Unreachable(_) | AgentError::Timeout | AgentError::CircuitOpen => true,
            AgentError::Decode(_) | AgentError::InvalidJson(_) => false,
            AgentError::Action { code, .. } => matches!(code.as_str(), "RATE_LIMITED" | "VOLUME_IN_USE"),
        }
    }
}
