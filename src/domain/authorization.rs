use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::person::PersonId;

/// Name of the verification scheme this service manages.
pub const SCHEME_NAME: &str = "census";

/// Metadata key holding the registry-issued person id.
pub const PERSON_ID_KEY: &str = "person_id";

/// Metadata key recording that document verification was submitted.
///
/// The registry does not expose verification completion, so the workflow
/// tracks it locally as an explicit input to step derivation.
pub const VERIFICATION_REQUESTED_KEY: &str = "verification_requested";

/// Durable per-user outcome of the verification workflow.
///
/// Created empty on first visit; `metadata` gains the person id once the
/// remote identity exists; `granted_at` is set exactly once when the
/// registry reports the person as enabled. Revocation is not this
/// subsystem's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationRecord {
    pub user_id: String,
    pub scheme: String,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    pub granted_at: Option<DateTime<Utc>>,
}

impl AuthorizationRecord {
    /// Fresh, ungranted record for a user.
    pub fn new(user_id: impl Into<String>) -> Self {
        AuthorizationRecord {
            user_id: user_id.into(),
            scheme: SCHEME_NAME.to_string(),
            metadata: serde_json::Map::new(),
            granted_at: None,
        }
    }

    pub fn person_id(&self) -> Option<PersonId> {
        self.metadata
            .get(PERSON_ID_KEY)
            .and_then(|v| v.as_i64())
            .map(PersonId)
    }

    pub fn set_person_id(&mut self, id: PersonId) {
        self.metadata
            .insert(PERSON_ID_KEY.to_string(), serde_json::Value::from(id.0));
    }

    pub fn verification_requested(&self) -> bool {
        self.metadata
            .get(VERIFICATION_REQUESTED_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_verification_requested(&mut self) {
        self.metadata
            .insert(VERIFICATION_REQUESTED_KEY.to_string(), serde_json::Value::Bool(true));
    }

    pub fn granted(&self) -> bool {
        self.granted_at.is_some()
    }

    /// Grant the authorization. Monotonic: a record granted once stays
    /// granted, later calls keep the original timestamp.
    pub fn grant(&mut self, now: DateTime<Utc>) {
        if self.granted_at.is_none() {
            self.granted_at = Some(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_record_is_empty() {
        let record = AuthorizationRecord::new("u1");
        assert_eq!(record.scheme, SCHEME_NAME);
        assert!(record.person_id().is_none());
        assert!(!record.verification_requested());
        assert!(!record.granted());
    }

    #[test]
    fn test_person_id_round_trip() {
        let mut record = AuthorizationRecord::new("u1");
        record.set_person_id(PersonId(99));
        assert_eq!(record.person_id(), Some(PersonId(99)));
    }

    #[test]
    fn test_grant_is_monotonic() {
        let mut record = AuthorizationRecord::new("u1");
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        record.grant(first);
        record.grant(later);

        assert_eq!(record.granted_at, Some(first));
    }
}
