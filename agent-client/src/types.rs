use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `{status: "in_progress" | "completed" | "already_exists", workspace_id, ...}` (§6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct OperationAck {
    pub status: AckStatus,
    pub workspace_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    InProgress,
    Completed,
    AlreadyExists,
}

/// §6.2's stable observation contract, one element per workspace.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservedWorkspace {
    pub workspace_id: String,
    pub container: Option<ObservedContainer>,
    pub volume: Option<ObservedVolume>,
    pub archive: Option<ObservedArchive>,
    pub restore: Option<ObservedRestore>,
    pub error: Option<ObservedError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedContainer {
    pub running: bool,
    pub healthy: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedVolume {
    pub exists: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedArchive {
    pub exists: bool,
    pub archive_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedRestore {
    pub restore_op_id: String,
    pub archive_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservedError {
    pub operation: String,
    pub error_code: i32,
    pub error_at: DateTime<Utc>,
    pub archive_op_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObservationResponse {
    pub workspaces: Vec<ObservedWorkspace>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArchiveRequest {
    pub archive_op_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RestoreRequest {
    pub archive_key: String,
    pub restore_op_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GcRequest {
    pub archive_keys: Vec<String>,
    pub protected_workspaces: Vec<String>,
    pub retention_count: u32,
    /// Seconds an unprotected object must sit before it is eligible for reclaim (§4.6,
    /// `GC_ORPHAN_GRACE`), enforced Agent-side against each object's last-modified time.
    pub orphan_grace_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamResponse {
    pub hostname: String,
    pub port: u16,
    pub url: String,
}

/// `{"error":{"code":"...", "message":"..."}}` (§6.1).
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}
