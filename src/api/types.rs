use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success envelope. Failures go through `ApiError::into_response`, which
/// produces the matching `{"success": false, "error": {...}}` shape.
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message_only(message: impl Into<String>) -> ApiResponse<Value> {
        ApiResponse {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }
}

/// Update responses carry the stored record plus whether it now shadows a
/// base entry.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult<T: Serialize> {
    pub record: T,
    pub is_override: bool,
}

#[derive(Deserialize)]
pub struct CreateRequest {
    pub id: String,
    pub data: Value,
}

#[derive(Deserialize)]
pub struct SimulateRequest {
    #[serde(default = "default_simulate_ticks")]
    pub ticks: u64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_simulate_ticks() -> u64 {
    600
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    pub name: String,
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}
