use serde::Deserialize;

use crate::steps::LocalUser;

/// Body for a step submission: the caller's email (needed for the
/// registry payload) plus the raw step input, validated by the step's
/// handler.
#[derive(Debug, Deserialize)]
pub struct SubmitStepRequest {
    pub email: String,

    #[serde(default)]
    pub input: serde_json::Value,
}

impl SubmitStepRequest {
    pub fn local_user(&self, user_id: &str) -> LocalUser {
        LocalUser {
            id: user_id.to_string(),
            email: self.email.clone(),
        }
    }
}

/// Query parameters for the workflow status endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    #[serde(default)]
    pub email: Option<String>,
}

impl StatusQuery {
    pub fn local_user(&self, user_id: &str) -> LocalUser {
        LocalUser {
            id: user_id.to_string(),
            email: self.email.clone().unwrap_or_default(),
        }
    }
}
