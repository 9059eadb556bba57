use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::domain::{Person, PersonId, PersonRef};
use crate::error::{CensusError, FieldErrors};

use super::{CensusApi, MembershipPayload, PersonPayload, VerificationFile};

/// Default per-request timeout for registry calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP client for the census registry's people API.
pub struct HttpCensusClient {
    base_url: String,
    http_client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct CreatePersonResponse {
    person_id: i64,
}

#[derive(Debug, Serialize)]
struct VerificationBody<'a> {
    files: &'a [VerificationFile],
}

impl HttpCensusClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Build the client, failing fast when the underlying HTTP client
    /// cannot be constructed rather than running without the configured
    /// timeouts.
    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(HttpCensusClient {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn people_url(&self, suffix: &str) -> String {
        format!("{}/api/v1/people{}", self.base_url, suffix)
    }

    /// Send a request and apply the registry's response envelope rules:
    /// network failures and 5xx are outages, 4xx carries field errors,
    /// 2xx carries the JSON body.
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, CensusError> {
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CensusError::Unavailable(format!("request timed out: {e}"))
            } else if e.is_connect() {
                CensusError::Unavailable(format!("connection failed: {e}"))
            } else {
                CensusError::Unavailable(e.to_string())
            }
        })?;

        let status = response.status();
        debug!(status = %status, "census registry response");

        if status.is_server_error() {
            return Err(CensusError::Unavailable(format!("HTTP status {status}")));
        }

        if status.is_client_error() {
            let body: serde_json::Value = response.json().await.unwrap_or_default();
            return Err(CensusError::Rejected(FieldErrors::from_remote(&body)));
        }

        response
            .json()
            .await
            .map_err(|e| CensusError::InvalidResponse(format!("malformed body: {e}")))
    }

    fn parse<T: serde::de::DeserializeOwned>(body: serde_json::Value) -> Result<T, CensusError> {
        serde_json::from_value(body)
            .map_err(|e| CensusError::InvalidResponse(format!("unexpected shape: {e}")))
    }
}

#[async_trait]
impl CensusApi for HttpCensusClient {
    async fn create_person(&self, payload: &PersonPayload) -> Result<PersonId, CensusError> {
        let body = self
            .send(self.http_client.post(self.people_url("")).json(payload))
            .await?;
        let created: CreatePersonResponse = Self::parse(body)?;
        Ok(PersonId(created.person_id))
    }

    async fn find_person(&self, person: &PersonRef) -> Result<Person, CensusError> {
        let url = self.people_url(&format!("/{}", person.as_path_segment()));
        let body = self.send(self.http_client.get(url)).await?;
        Self::parse(body)
    }

    async fn update_person(
        &self,
        person: &PersonRef,
        payload: &PersonPayload,
    ) -> Result<Person, CensusError> {
        let url = self.people_url(&format!("/{}", person.as_path_segment()));
        let body = self.send(self.http_client.patch(url).json(payload)).await?;
        Self::parse(body)
    }

    async fn create_verification(
        &self,
        person: &PersonRef,
        files: &[VerificationFile],
    ) -> Result<(), CensusError> {
        let url = self.people_url(&format!("/{}/document_verifications", person.as_path_segment()));
        self.send(self.http_client.post(url).json(&VerificationBody { files }))
            .await?;
        Ok(())
    }

    async fn create_membership_level(
        &self,
        person: &PersonRef,
        payload: &MembershipPayload,
    ) -> Result<(), CensusError> {
        let url = self.people_url(&format!("/{}/membership_levels", person.as_path_segment()));
        self.send(self.http_client.post(url).json(payload)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_construction() {
        let client = HttpCensusClient::new("https://census.example.org/").unwrap();
        assert_eq!(client.people_url(""), "https://census.example.org/api/v1/people");
        assert_eq!(
            client.people_url("/42/membership_levels"),
            "https://census.example.org/api/v1/people/42/membership_levels"
        );
    }

    #[test]
    fn test_parse_create_response() {
        let body = serde_json::json!({ "person_id": 42, "http_response_code": 201 });
        let parsed: CreatePersonResponse = HttpCensusClient::parse(body).unwrap();
        assert_eq!(parsed.person_id, 42);
    }

    #[test]
    fn test_parse_rejects_wrong_shape() {
        let body = serde_json::json!({ "id": 42 });
        let parsed: Result<CreatePersonResponse, _> = HttpCensusClient::parse(body);
        assert!(matches!(parsed, Err(CensusError::InvalidResponse(_))));
    }
}
