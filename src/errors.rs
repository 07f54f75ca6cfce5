use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// One field-level validation failure, reported back to the client in the
/// error envelope's `details` array.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Which file operation a `FileOperation` error came from. The code reported
/// to clients is derived from this (`FILE_READ_ERROR` / `FILE_WRITE_ERROR`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileOp {
    Read,
    Write,
}

/// Error taxonomy for the editing API and the overlay store beneath it.
///
/// Every variant maps to a stable machine-readable code and an HTTP status.
/// Store-level failures never leave a partially-mutated target file behind;
/// see the write protocol in `overlay`.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed or out-of-range input; carries per-field details.
    Validation(Vec<FieldError>),
    /// Single-message validation failure (bad id, bad category, bad upload).
    ValidationMessage(String),
    NotFound {
        resource: &'static str,
        id: String,
    },
    Conflict {
        resource: &'static str,
        id: String,
    },
    /// I/O or parse failure against the backing store: missing required
    /// file, invalid JSON, or missing required top-level key.
    FileOperation {
        op: FileOp,
        message: String,
    },
    /// Write serialization exhausted its lock retries.
    LockAcquisition {
        path: String,
        message: String,
    },
    /// The temp-file round-trip check failed before promotion; the live
    /// file was not touched.
    WriteVerification {
        path: String,
        message: String,
    },
    /// Attempt to delete an entry that exists only in the base config.
    ImmutableEntry {
        resource: &'static str,
        id: String,
    },
    /// Missing or wrong API token.
    Unauthorized,
    /// Per-client request budget exhausted.
    RateLimited,
}

impl ApiError {
    pub fn read(message: impl Into<String>) -> Self {
        ApiError::FileOperation {
            op: FileOp::Read,
            message: message.into(),
        }
    }

    pub fn write(message: impl Into<String>) -> Self {
        ApiError::FileOperation {
            op: FileOp::Write,
            message: message.into(),
        }
    }

    pub fn code(&self) -> String {
        match self {
            ApiError::Validation(_) | ApiError::ValidationMessage(_) => {
                "VALIDATION_ERROR".to_string()
            }
            ApiError::NotFound { resource, .. } => {
                format!("{}_NOT_FOUND", resource.to_uppercase())
            }
            ApiError::Conflict { resource, .. } => {
                format!("{}_EXISTS", resource.to_uppercase())
            }
            ApiError::FileOperation { op: FileOp::Read, .. } => "FILE_READ_ERROR".to_string(),
            ApiError::FileOperation { op: FileOp::Write, .. } => "FILE_WRITE_ERROR".to_string(),
            ApiError::LockAcquisition { .. } => "LOCK_ACQUISITION_ERROR".to_string(),
            ApiError::WriteVerification { .. } => "WRITE_VERIFICATION_ERROR".to_string(),
            ApiError::ImmutableEntry { .. } => "IMMUTABLE_ENTRY".to_string(),
            ApiError::Unauthorized => "UNAUTHORIZED".to_string(),
            ApiError::RateLimited => "RATE_LIMITED".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_)
            | ApiError::ValidationMessage(_)
            | ApiError::ImmutableEntry { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::FileOperation { .. } | ApiError::WriteVerification { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::LockAcquisition { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::Validation(_) => "Validation failed".to_string(),
            ApiError::ValidationMessage(msg) => msg.clone(),
            ApiError::NotFound { resource, id } => {
                format!("{resource} with ID '{id}' not found")
            }
            ApiError::Conflict { resource, id } => {
                format!("{resource} with ID '{id}' already exists")
            }
            ApiError::FileOperation { message, .. } => message.clone(),
            ApiError::LockAcquisition { path, message } => {
                format!("Failed to lock {path}: {message}")
            }
            ApiError::WriteVerification { path, message } => {
                format!("Write verification failed for {path}: {message}")
            }
            ApiError::ImmutableEntry { resource, id } => format!(
                "Cannot delete base {} '{}'. Only custom entries or custom overrides can be deleted.",
                resource.to_lowercase(),
                id
            ),
            ApiError::Unauthorized => {
                "Unauthorized: send the API token as 'Authorization: Bearer <token>' or 'x-api-key'"
                    .to_string()
            }
            ApiError::RateLimited => "Rate limit exceeded".to_string(),
        }
    }

    pub fn details(&self) -> Option<&[FieldError]> {
        match self {
            ApiError::Validation(details) if !details.is_empty() => Some(details),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<FieldError>>,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: ErrorBody,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                code: self.code(),
                message: self.message(),
                details: self.details().map(|d| d.to_vec()),
            },
        };
        (self.status(), Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_resource_names() {
        let err = ApiError::NotFound {
            resource: "Character",
            id: "ghost".to_string(),
        };
        assert_eq!(err.code(), "CHARACTER_NOT_FOUND");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let err = ApiError::Conflict {
            resource: "Item",
            id: "mic".to_string(),
        };
        assert_eq!(err.code(), "ITEM_EXISTS");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn validation_details_survive_into_body() {
        let err = ApiError::Validation(vec![FieldError::new("stats.health", "out of range")]);
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert_eq!(err.details().map(|d| d.len()), Some(1));
    }

    #[test]
    fn immutable_entry_is_a_client_error() {
        let err = ApiError::ImmutableEntry {
            resource: "Character",
            id: "skeleton".to_string(),
        };
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(err.message().contains("skeleton"));
    }

    #[test]
    fn guard_errors_carry_their_own_codes() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(ApiError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ApiError::RateLimited.code(), "RATE_LIMITED");
    }

    #[test]
    fn lock_errors_map_to_service_unavailable() {
        let err = ApiError::LockAcquisition {
            path: "custom/enemies.json".to_string(),
            message: "retries exhausted".to_string(),
        };
        assert_eq!(err.code(), "LOCK_ACQUISITION_ERROR");
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
