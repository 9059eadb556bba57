use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::steps::StepName;

/// Per-field validation failures for one step submission.
///
/// Values are message codes (`required`, `invalid_format`, ...) to be
/// localized by the caller, never rendered text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors {
    errors: BTreeMap<String, Vec<String>>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure code against a field.
    pub fn add(&mut self, field: impl Into<String>, code: impl Into<String>) {
        self.errors.entry(field.into()).or_default().push(code.into());
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.errors.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.errors.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    /// Build from the `errors` object of a registry 4xx body:
    /// `{"errors": {"document_id": ["taken"], ...}}`.
    pub fn from_remote(body: &serde_json::Value) -> Self {
        let mut out = FieldErrors::new();
        if let Some(map) = body.get("errors").and_then(|e| e.as_object()) {
            for (field, codes) in map {
                match codes {
                    serde_json::Value::Array(items) => {
                        for item in items {
                            if let Some(code) = item.as_str() {
                                out.add(field.clone(), code);
                            }
                        }
                    }
                    serde_json::Value::String(code) => out.add(field.clone(), code.clone()),
                    _ => out.add(field.clone(), "invalid"),
                }
            }
        }
        out
    }

    /// Finish a validation pass: empty means the value is good.
    pub fn into_result<T>(self, value: T) -> Result<T, FieldErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Errors surfaced by census registry calls.
#[derive(Error, Debug)]
pub enum CensusError {
    /// Network failure, timeout or 5xx: the caller should retry later.
    #[error("census registry unavailable: {0}")]
    Unavailable(String),

    /// 4xx with field-level detail to map back onto the step's fields.
    #[error("census registry rejected the submission")]
    Rejected(FieldErrors),

    /// 2xx body that does not match the expected envelope.
    #[error("unexpected census response: {0}")]
    InvalidResponse(String),
}

/// Errors surfaced by step submission.
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Local validation failed; no remote call was made.
    #[error("step input failed validation")]
    Validation(FieldErrors),

    /// The registry rejected an input the local pass accepted
    /// (e.g. a duplicate document id).
    #[error("census registry rejected the submission")]
    RemoteValidation(FieldErrors),

    /// Registry unreachable or erroring; the record is left untouched.
    #[error("census registry unavailable: {0}")]
    Unavailable(String),

    /// Step requested before the identity exists remotely.
    #[error("step {requested} submitted before an identity exists")]
    Ordering { requested: StepName },

    #[error("authorization storage failure")]
    Store(#[source] anyhow::Error),
}

impl From<CensusError> for WorkflowError {
    fn from(err: CensusError) -> Self {
        match err {
            CensusError::Rejected(fields) => WorkflowError::RemoteValidation(fields),
            CensusError::Unavailable(msg) => WorkflowError::Unavailable(msg),
            CensusError::InvalidResponse(msg) => WorkflowError::Unavailable(msg),
        }
    }
}

/// Errors surfaced by decision evaluation.
///
/// "Could not verify" is deliberately distinct from an unauthorized
/// decision; the caller must not conflate the two.
#[derive(Error, Debug)]
pub enum AuthorizeError {
    #[error("census registry unavailable: {0}")]
    Unavailable(String),

    #[error("authorization storage failure")]
    Store(#[source] anyhow::Error),
}

impl From<CensusError> for AuthorizeError {
    fn from(err: CensusError) -> Self {
        match err {
            CensusError::Unavailable(msg) | CensusError::InvalidResponse(msg) => {
                AuthorizeError::Unavailable(msg)
            }
            // A 4xx while reading a stored identity means the snapshot is
            // gone or malformed; the decision cannot be made either way.
            CensusError::Rejected(_) => {
                AuthorizeError::Unavailable("identity snapshot rejected".to_string())
            }
        }
    }
}
