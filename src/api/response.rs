use serde::Serialize;

use crate::error::FieldErrors;
use crate::steps::StepName;
use crate::workflow::SubmitOutcome;

/// Successful step submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub ok: bool,
    pub granted: bool,

    /// Step the caller should render next; absent once the workflow is
    /// finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<StepName>,
}

impl From<SubmitOutcome> for SubmitResponse {
    fn from(outcome: SubmitOutcome) -> Self {
        SubmitResponse {
            ok: true,
            granted: outcome.granted,
            next_step: outcome.next_step,
        }
    }
}

/// Step re-rendered with per-field errors (local or remote rejection).
#[derive(Debug, Serialize)]
pub struct ValidationErrorResponse {
    pub error: String,
    pub code: String,
    pub fields: FieldErrors,
}

impl ValidationErrorResponse {
    pub fn local(fields: FieldErrors) -> Self {
        ValidationErrorResponse {
            error: "step input failed validation".to_string(),
            code: "INVALID".to_string(),
            fields,
        }
    }

    pub fn remote(fields: FieldErrors) -> Self {
        ValidationErrorResponse {
            error: "census registry rejected the submission".to_string(),
            code: "INVALID".to_string(),
            fields,
        }
    }
}

/// Generic error envelope.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,

    /// Step to restart from after an ordering violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_to: Option<StepName>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        ErrorResponse {
            error: error.into(),
            code: code.into(),
            reset_to: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "BAD_REQUEST")
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "SERVICE_UNAVAILABLE")
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        ErrorResponse::new(message, "INTERNAL_ERROR")
    }

    pub fn ordering(reset_to: StepName) -> Self {
        ErrorResponse {
            error: "step requested out of sequence".to_string(),
            code: "ORDERING_VIOLATION".to_string(),
            reset_to: Some(reset_to),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}
