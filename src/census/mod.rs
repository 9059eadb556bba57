pub mod client;
pub mod mock;

pub use client::HttpCensusClient;
pub use mock::MockCensus;

use async_trait::async_trait;
use base64::Engine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DocumentType, Gender, MembershipLevel, Person, PersonId, PersonRef};
use crate::error::CensusError;

/// Normalized person attributes in the exact shape the registry expects.
///
/// Scope fields are codes, not local ids; the local user id travels under
/// `extra` alongside the email, as the registry's people endpoint requires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonPayload {
    pub first_name: String,
    pub last_name1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name2: Option<String>,

    pub document_type: DocumentType,
    pub document_id: String,

    pub born_at: NaiveDate,
    pub gender: Gender,

    pub address: String,
    pub postal_code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_scope_code: Option<String>,
    pub address_scope_code: String,
    pub scope_code: String,

    pub email: String,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One document image submitted for verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationFile {
    pub filename: String,
    pub content_type: String,
    pub base64_content: String,
}

impl VerificationFile {
    /// Encode raw file bytes for the registry's upload body.
    pub fn from_bytes(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        VerificationFile {
            filename: filename.into(),
            content_type: content_type.into(),
            base64_content: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipPayload {
    pub membership_level: MembershipLevel,
}

/// Contract to the external census registry.
///
/// All calls are network I/O with bounded timeouts; implementations must
/// classify failures per `CensusError` so callers can tell a validation
/// rejection from an outage.
#[async_trait]
pub trait CensusApi: Send + Sync {
    async fn create_person(&self, payload: &PersonPayload) -> Result<PersonId, CensusError>;

    async fn find_person(&self, person: &PersonRef) -> Result<Person, CensusError>;

    async fn update_person(
        &self,
        person: &PersonRef,
        payload: &PersonPayload,
    ) -> Result<Person, CensusError>;

    async fn create_verification(
        &self,
        person: &PersonRef,
        files: &[VerificationFile],
    ) -> Result<(), CensusError>;

    async fn create_membership_level(
        &self,
        person: &PersonRef,
        payload: &MembershipPayload,
    ) -> Result<(), CensusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_file_encodes_bytes() {
        let file = VerificationFile::from_bytes("front.jpg", "image/jpeg", b"hello");
        assert_eq!(file.base64_content, "aGVsbG8=");
        assert_eq!(file.filename, "front.jpg");
    }

    #[test]
    fn test_payload_serializes_scope_codes() {
        let payload = PersonPayload {
            first_name: "Marta".into(),
            last_name1: "Pérez".into(),
            last_name2: None,
            document_type: DocumentType::Dni,
            document_id: "12345678Z".into(),
            born_at: NaiveDate::from_ymd_opt(1990, 5, 4).unwrap(),
            gender: Gender::Female,
            address: "C/ Mayor 1".into(),
            postal_code: "08001".into(),
            document_scope_code: Some("ES".into()),
            address_scope_code: "ES.CT.B".into(),
            scope_code: "ES.CT.B".into(),
            email: "marta@example.org".into(),
            extra: serde_json::Map::new(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["scope_code"], "ES.CT.B");
        assert_eq!(json["born_at"], "1990-05-04");
        // Absent optional fields stay out of the body.
        assert!(json.get("last_name2").is_none());
    }
}
