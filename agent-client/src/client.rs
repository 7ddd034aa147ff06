use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use codehub_types::WorkspaceId;
use reqwest::StatusCode;
use tracing::debug;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::error::AgentError;
use crate::retry::with_retry;
use crate::types::{
    ArchiveRequest, ErrorEnvelope, GcRequest, ObservationResponse, OperationAck, RestoreRequest,
    StartRequest, UpstreamResponse,
};

pub struct ClientInner {
    http: reqwest::Client,
    endpoint: String,
    breaker: CircuitBreaker,
}

/// Cheap to clone: everything behind the `Arc` is shared, including the per-Agent circuit
/// breaker, so all callers talking to the same Agent see the same breaker state.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Deref for Client {
    type Target = ClientInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Client {
    pub fn new(endpoint: &str, request_timeout: Duration) -> Self {
        Self::with_breaker_config(endpoint, request_timeout, CircuitBreakerConfig::default())
    }

    pub fn with_breaker_config(
        endpoint: &str,
        request_timeout: Duration,
        breaker_config: CircuitBreakerConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder should not fail with these settings");
        Self {
            inner: Arc::new(ClientInner {
                http,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                breaker: CircuitBreaker::new(breaker_config),
            }),
        }
    }

    /// GET /api/v1/workspaces — bulk observe (§6.2).
    pub async fn observe(&self) -> Result<ObservationResponse, AgentError> {
        let url = format!("{}/api/v1/workspaces", self.endpoint);
        with_retry(|| self.send_json(self.http.get(&url))).await
    }

    /// POST /api/v1/workspaces/{id}/provision — create volume (sync).
    pub async fn provision(&self, id: WorkspaceId) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/provision", self.endpoint, id);
        with_retry(|| self.send_json(self.http.post(&url))).await
    }

    /// POST /api/v1/workspaces/{id}/start body:{image?} — start container (async).
    pub async fn start(
        &self,
        id: WorkspaceId,
        image: Option<&str>,
    ) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/start", self.endpoint, id);
        let body = StartRequest {
            image: image.map(str::to_string),
        };
        with_retry(|| self.send_json(self.http.post(&url).json(&body))).await
    }

    /// POST /api/v1/workspaces/{id}/stop — stop+remove container (async).
    pub async fn stop(&self, id: WorkspaceId) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/stop", self.endpoint, id);
        with_retry(|| self.send_json(self.http.post(&url))).await
    }

    /// DELETE /api/v1/workspaces/{id} — delete container+volume (async).
    pub async fn delete(&self, id: WorkspaceId) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}", self.endpoint, id);
        with_retry(|| self.send_json(self.http.delete(&url))).await
    }

    /// POST /api/v1/workspaces/{id}/archive body:{archive_op_id} — archive job (async).
    pub async fn archive(
        &self,
        id: WorkspaceId,
        archive_op_id: &str,
    ) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/archive", self.endpoint, id);
        let body = ArchiveRequest {
            archive_op_id: archive_op_id.to_string(),
        };
        with_retry(|| self.send_json(self.http.post(&url).json(&body))).await
    }

    /// POST /api/v1/workspaces/{id}/restore body:{archive_key, restore_op_id} — restore job (async).
    pub async fn restore(
        &self,
        id: WorkspaceId,
        archive_key: &str,
        restore_op_id: &str,
    ) -> Result<OperationAck, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/restore", self.endpoint, id);
        let body = RestoreRequest {
            archive_key: archive_key.to_string(),
            restore_op_id: restore_op_id.to_string(),
        };
        with_retry(|| self.send_json(self.http.post(&url).json(&body))).await
    }

    /// DELETE /api/v1/workspaces/archives?archive_key=… — delete one archive.
    pub async fn delete_archive(&self, archive_key: &str) -> Result<(), AgentError> {
        let url = format!("{}/api/v1/workspaces/archives", self.endpoint);
        with_retry(|| async {
            self.dispatch(
                self.http
                    .delete(&url)
                    .query(&[("archive_key", archive_key)]),
            )
            .await?;
            Ok(())
        })
        .await
    }

    /// GET /api/v1/workspaces/{id}/upstream — {hostname, port, url}.
    pub async fn upstream(&self, id: WorkspaceId) -> Result<UpstreamResponse, AgentError> {
        let url = format!("{}/api/v1/workspaces/{}/upstream", self.endpoint, id);
        with_retry(|| self.send_json(self.http.get(&url))).await
    }

    /// POST /api/v1/workspaces/gc body:{archive_keys, protected_workspaces, retention_count,
    /// orphan_grace_secs}.
    pub async fn gc(
        &self,
        archive_keys: Vec<String>,
        protected_workspaces: Vec<String>,
        retention_count: u32,
        orphan_grace_secs: u64,
    ) -> Result<(), AgentError> {
        let url = format!("{}/api/v1/workspaces/gc", self.endpoint);
        let body = GcRequest {
            archive_keys,
            protected_workspaces,
            retention_count,
            orphan_grace_secs,
        };
        with_retry(|| async {
            self.dispatch(self.http.post(&url).json(&body)).await?;
            Ok(())
        })
        .await
    }

    async fn send_json<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AgentError> {
        let resp = self.dispatch(req).await?;
        let bytes = resp.bytes().await.map_err(AgentError::Decode)?;
        serde_json::from_slice(&bytes).map_err(AgentError::InvalidJson)
    }

    /// Runs one attempt through the circuit breaker, sending the request and turning a
    /// non-2xx status or transport error into a classified [`AgentError`].
    async fn dispatch(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, AgentError> {
        self.breaker.check()?;

        let result = req.send().await;
        let resp = match result {
            Ok(resp) => resp,
            Err(err) if err.is_timeout() => {
                self.breaker.record_failure(true);
                return Err(AgentError::Timeout);
            }
            Err(err) => {
                self.breaker.record_failure(true);
                return Err(AgentError::Unreachable(err));
            }
        };

        if resp.status().is_success() {
            self.breaker.record_success();
            return Ok(resp);
        }

        let status = resp.status();
        let body = resp.bytes().await.unwrap_or_default();
        let (code, message) = match serde_json::from_slice::<ErrorEnvelope>(&body) {
            Ok(envelope) => (envelope.error.code, envelope.error.message),
            Err(_) => (status_to_code(status), status.to_string()),
        };
        debug!(%status, %code, "agent returned error status");

        let err = AgentError::Action { code, message };
        self.breaker.record_failure(err.is_transient());
        Err(err)
    }
}

fn status_to_code(status: StatusCode) -> String {
    if status == StatusCode::TOO_MANY_REQUESTS {
        "RATE_LIMITED".to_string()
    } else if status.is_server_error() {
        "AGENT_ERROR".to_string()
    } else {
        format!("HTTP_{}", status.as_u16())
    }
}

