use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use super::person::DocumentType;

/// Outcome category of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// Granted authorization satisfies every active policy constraint.
    Ok,
    /// Granted authorization exists but at least one constraint failed.
    Unauthorized,
    /// No granted authorization for this user.
    Missing,
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuthorizationStatus::Ok => "ok",
            AuthorizationStatus::Unauthorized => "unauthorized",
            AuthorizationStatus::Missing => "missing",
        };
        write!(f, "{s}")
    }
}

/// Per-action policy constraints, as configured by the protecting feature.
///
/// Absent options are no-ops; unrecognized options (`membership_level`,
/// `scope`, ...) are preserved but never evaluated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_document_types: Option<Vec<DocumentType>>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PolicyOptions {
    pub fn is_empty(&self) -> bool {
        self.minimum_age.is_none() && self.allowed_document_types.is_none()
    }
}

/// Which constraint families were active when a check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationKey {
    Age,
    DocumentType,
    AgeAndDocumentType,
}

/// Structured, parameterized failure message. Localization happens in the
/// caller; this layer only selects the variant and carries raw values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    pub key: ExplanationKey,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_age: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_document_types: Vec<DocumentType>,
}

/// Aggregated result of evaluating every active policy predicate.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub status: AuthorizationStatus,

    /// One entry per failed predicate, keyed by field name, carrying the
    /// offending value. Never populated for `missing`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub unmatched_fields: BTreeMap<String, serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_explanation: Option<Explanation>,

    /// Active policy parameters, exposed so callers can re-display them
    /// without re-deriving the option set.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub redirect_params: BTreeMap<String, String>,
}

impl Decision {
    pub fn missing() -> Self {
        Decision {
            status: AuthorizationStatus::Missing,
            unmatched_fields: BTreeMap::new(),
            extra_explanation: None,
            redirect_params: BTreeMap::new(),
        }
    }

    pub fn ok(options: &PolicyOptions) -> Self {
        Decision {
            status: AuthorizationStatus::Ok,
            unmatched_fields: BTreeMap::new(),
            extra_explanation: None,
            redirect_params: redirect_params(options),
        }
    }

    pub fn unauthorized(
        unmatched_fields: BTreeMap<String, serde_json::Value>,
        options: &PolicyOptions,
    ) -> Self {
        let explanation = explanation_for(&unmatched_fields, options);
        Decision {
            status: AuthorizationStatus::Unauthorized,
            unmatched_fields,
            extra_explanation: explanation,
            redirect_params: redirect_params(options),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == AuthorizationStatus::Ok
    }
}

fn redirect_params(options: &PolicyOptions) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    if let Some(age) = options.minimum_age {
        params.insert("minimum_age".to_string(), age.to_string());
    }
    if let Some(types) = &options.allowed_document_types {
        let joined = types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join("-");
        params.insert("document_types".to_string(), joined);
    }
    params
}

fn explanation_for(
    unmatched: &BTreeMap<String, serde_json::Value>,
    options: &PolicyOptions,
) -> Option<Explanation> {
    let age = unmatched.contains_key("age");
    let document_type = unmatched.contains_key("document_type");

    let key = match (age, document_type) {
        (true, true) => ExplanationKey::AgeAndDocumentType,
        (true, false) => ExplanationKey::Age,
        (false, true) => ExplanationKey::DocumentType,
        (false, false) => return None,
    };

    Some(Explanation {
        key,
        minimum_age: options.minimum_age,
        allowed_document_types: options.allowed_document_types.clone().unwrap_or_default(),
    })
}
