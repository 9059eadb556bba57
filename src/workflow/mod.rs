pub mod guard;

pub use guard::MutationGuard;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::census::CensusApi;
use crate::domain::authorization::SCHEME_NAME;
use crate::domain::{AuthorizationRecord, Person, PersonRef};
use crate::error::WorkflowError;
use crate::scopes::ScopeRegistry;
use crate::steps::{handler_for, DataHandler, LocalUser, StepAction, StepContext, StepName};
use crate::storage::AuthorizationStore;

/// Where a user stands in the workflow, as derived state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatus {
    /// Earliest unsatisfied step; `None` once the workflow is complete.
    pub current_step: Option<StepName>,
    pub next_step: Option<StepName>,
    pub has_person: bool,
    pub granted: bool,
    /// Form prefill for a first visit to the data step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<serde_json::Value>,
}

/// Outcome of a successful step submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub granted: bool,
    /// Step to redirect to; `None` means the workflow is finished.
    pub next_step: Option<StepName>,
}

/// Orchestrates step sequencing against the census registry and the
/// authorization store.
///
/// The current step is always derived, never stored: `data` until a
/// remote identity exists, then the earliest step whose completion
/// evidence is missing.
pub struct VerificationEngine {
    census: Arc<dyn CensusApi>,
    store: Arc<dyn AuthorizationStore>,
    scopes: Arc<ScopeRegistry>,
    guard: MutationGuard,
    local_scope_code: String,
    minimum_age: u32,
}

impl VerificationEngine {
    pub fn new(
        census: Arc<dyn CensusApi>,
        store: Arc<dyn AuthorizationStore>,
        scopes: Arc<ScopeRegistry>,
        local_scope_code: impl Into<String>,
        minimum_age: u32,
    ) -> Self {
        VerificationEngine {
            census,
            store,
            scopes,
            guard: MutationGuard::new(),
            local_scope_code: local_scope_code.into(),
            minimum_age,
        }
    }

    /// Derive the user's position in the workflow. Creates the empty
    /// authorization record on first visit.
    pub async fn status(&self, user: &LocalUser) -> Result<WorkflowStatus, WorkflowError> {
        let record = self
            .store
            .find_or_create(&user.id, SCHEME_NAME)
            .await
            .map_err(WorkflowError::Store)?;

        let person = self.fetch_person(&record).await?;
        let current_step = derive_current_step(&record, person.as_ref());

        let defaults = if person.is_none() {
            let ctx = self.context(user, &record, None);
            Some(DataHandler::default_values(&ctx))
        } else {
            None
        };

        Ok(WorkflowStatus {
            current_step,
            next_step: current_step.and_then(|s| s.next()),
            has_person: record.person_id().is_some(),
            granted: record.granted(),
            defaults,
        })
    }

    /// Validate and perform one step submission.
    ///
    /// Holds the per-user guard for the whole read, remote call, re-fetch
    /// and write sequence; the guard drops on every exit path.
    pub async fn submit(
        &self,
        user: &LocalUser,
        step: StepName,
        raw_input: &serde_json::Value,
    ) -> Result<SubmitOutcome, WorkflowError> {
        let _guard = self.guard.acquire(&user.id).await;

        let mut record = self
            .store
            .find_or_create(&user.id, SCHEME_NAME)
            .await
            .map_err(WorkflowError::Store)?;

        // Steps after the first require the remote identity to exist.
        if step != StepName::Data && record.person_id().is_none() {
            return Err(WorkflowError::Ordering { requested: step });
        }

        let person = self.fetch_person(&record).await?;

        let action = {
            let ctx = self.context(user, &record, person.as_ref());
            handler_for(step)
                .validate(raw_input, &ctx)
                .map_err(WorkflowError::Validation)?
        };

        match action {
            StepAction::UpsertPerson(payload) => match record.person_id() {
                // Re-submitting the data step is an edit, never a second create.
                Some(id) => {
                    self.census.update_person(&PersonRef::Id(id), &payload).await?;
                    debug!(user_id = %user.id, person_id = %id, "person updated");
                }
                None => {
                    let id = self.census.create_person(&payload).await?;
                    record.set_person_id(id);
                    self.store.save(&record).await.map_err(WorkflowError::Store)?;
                    info!(user_id = %user.id, person_id = %id, "person created");
                }
            },
            StepAction::SubmitVerification(files) => {
                let Some(id) = record.person_id() else {
                    return Err(WorkflowError::Ordering { requested: step });
                };
                self.census
                    .create_verification(&PersonRef::Id(id), &files)
                    .await?;
                record.set_verification_requested();
                self.store.save(&record).await.map_err(WorkflowError::Store)?;
                info!(user_id = %user.id, files = files.len(), "verification submitted");
            }
            StepAction::SetMembershipLevel(payload) => {
                let Some(id) = record.person_id() else {
                    return Err(WorkflowError::Ordering { requested: step });
                };
                self.census
                    .create_membership_level(&PersonRef::Id(id), &payload)
                    .await?;
                debug!(user_id = %user.id, level = %payload.membership_level, "membership level set");
            }
        }

        // Re-fetch and grant once the registry reports the person enabled.
        // The grant is monotonic; a later pending snapshot never revokes it.
        let refreshed = self.fetch_person(&record).await?;
        if refreshed.as_ref().is_some_and(|p| p.state.is_enabled()) && !record.granted() {
            record.grant(Utc::now());
            info!(user_id = %user.id, "authorization granted");
        }
        self.store.save(&record).await.map_err(WorkflowError::Store)?;

        let current = derive_current_step(&record, refreshed.as_ref());
        Ok(SubmitOutcome {
            granted: record.granted(),
            next_step: current,
        })
    }

    async fn fetch_person(
        &self,
        record: &AuthorizationRecord,
    ) -> Result<Option<Person>, WorkflowError> {
        match record.person_id() {
            Some(id) => Ok(Some(self.census.find_person(&PersonRef::Id(id)).await?)),
            None => Ok(None),
        }
    }

    fn context<'a>(
        &'a self,
        user: &'a LocalUser,
        record: &AuthorizationRecord,
        person: Option<&'a Person>,
    ) -> StepContext<'a> {
        StepContext {
            user,
            person_id: record.person_id(),
            person,
            scopes: &self.scopes,
            local_scope_code: &self.local_scope_code,
            minimum_age: self.minimum_age,
            today: Utc::now().date_naive(),
        }
    }
}

/// Earliest step in the fixed order not yet satisfied, or `None` when the
/// workflow is complete. A granted record is complete regardless of the
/// snapshot: the grant is what moves the user past the step sequence.
fn derive_current_step(
    record: &AuthorizationRecord,
    person: Option<&Person>,
) -> Option<StepName> {
    if record.granted() {
        return None;
    }
    let Some(person) = person else {
        return Some(StepName::Data);
    };
    if !record.verification_requested() {
        return Some(StepName::Verification);
    }
    if person.membership_level.is_none() {
        return Some(StepName::MembershipLevel);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::census::mock::{FailureMode, MockCensus};
    use crate::domain::{PersonId, PersonState};
    use crate::error::FieldErrors;
    use crate::scopes::{Scope, ScopeRegistry};
    use crate::storage::MemoryAuthorizationStore;

    fn scopes() -> Arc<ScopeRegistry> {
        Arc::new(
            ScopeRegistry::from_scopes(vec![
                Scope { id: 1, code: "ES".into(), name: "España".into(), parent: None },
                Scope { id: 2, code: "ES.CT".into(), name: "Catalunya".into(), parent: Some("ES".into()) },
            ])
            .unwrap(),
        )
    }

    fn engine(census: Arc<MockCensus>, store: Arc<MemoryAuthorizationStore>) -> VerificationEngine {
        VerificationEngine::new(census, store, scopes(), "ES", 16)
    }

    fn user() -> LocalUser {
        LocalUser { id: "7".into(), email: "marta@example.org".into() }
    }

    fn data_input() -> serde_json::Value {
        serde_json::json!({
            "first_name": "Marta",
            "last_name1": "Pérez",
            "document_type": "dni",
            "document_id": "12345678Z",
            "born_at": "1990-05-04",
            "gender": "female",
            "address": "C/ Mayor 1",
            "document_scope_id": 1,
            "address_scope_id": 2,
            "scope_id": 1,
            "postal_code": "08001"
        })
    }

    fn verification_input() -> serde_json::Value {
        serde_json::json!({
            "document_file1": {
                "filename": "front.jpg",
                "content_type": "image/jpeg",
                "base64_content": "aGVsbG8="
            }
        })
    }

    #[tokio::test]
    async fn test_first_visit_starts_at_data_with_defaults() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census, store.clone());

        let status = engine.status(&user()).await.unwrap();
        assert_eq!(status.current_step, Some(StepName::Data));
        assert!(!status.has_person);
        assert_eq!(status.defaults.unwrap()["scope_id"], 1);

        // The empty record exists after the first visit.
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_data_step_creates_then_updates() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        assert_eq!(census.create_calls(), 1);
        assert_eq!(census.update_calls(), 0);

        // Every later submission is an update, never a second create.
        for _ in 0..3 {
            engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        }
        assert_eq!(census.create_calls(), 1);
        assert_eq!(census.update_calls(), 3);
    }

    #[tokio::test]
    async fn test_ordering_violation_before_identity_exists() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census, store);

        let result = engine
            .submit(&user(), StepName::Verification, &verification_input())
            .await;
        assert!(matches!(
            result,
            Err(WorkflowError::Ordering { requested: StepName::Verification })
        ));
    }

    #[tokio::test]
    async fn test_validation_failure_makes_no_remote_call() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store);

        let result = engine.submit(&user(), StepName::Data, &serde_json::json!({})).await;
        assert!(matches!(result, Err(WorkflowError::Validation(_))));
        assert_eq!(census.create_calls(), 0);
    }

    #[tokio::test]
    async fn test_remote_rejection_maps_to_field_errors() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        let mut fields = FieldErrors::new();
        fields.add("document_id", "taken");
        census.fail_next(FailureMode::Rejected(fields));

        let result = engine.submit(&user, StepName::Data, &data_input()).await;
        match result {
            Err(WorkflowError::RemoteValidation(errors)) => {
                assert_eq!(errors.get("document_id"), Some(&["taken".to_string()][..]));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // Record untouched: next submission still creates.
        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        assert!(record.person_id().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_leaves_record_unchanged() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        census.fail_next(FailureMode::Unavailable);
        let result = engine.submit(&user, StepName::Data, &data_input()).await;
        assert!(matches!(result, Err(WorkflowError::Unavailable(_))));

        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        assert!(record.person_id().is_none());
        assert!(!record.granted());
    }

    #[tokio::test]
    async fn test_full_workflow_grants_when_registry_enables() {
        crate::observability::init_test_tracing();
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        // Registry approves after the third mutating call.
        census.enable_after_mutations(3);

        let outcome = engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        assert!(!outcome.granted);
        assert_eq!(outcome.next_step, Some(StepName::Verification));

        let outcome = engine
            .submit(&user, StepName::Verification, &verification_input())
            .await
            .unwrap();
        assert!(!outcome.granted);
        assert_eq!(outcome.next_step, Some(StepName::MembershipLevel));

        let outcome = engine
            .submit(
                &user,
                StepName::MembershipLevel,
                &serde_json::json!({ "membership_level": "follower" }),
            )
            .await
            .unwrap();
        assert!(outcome.granted);
        assert_eq!(outcome.next_step, None);

        let status = engine.status(&user).await.unwrap();
        assert_eq!(status.current_step, None);
        assert!(status.granted);
    }

    #[tokio::test]
    async fn test_grant_is_never_revoked_by_later_submissions() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        census.enable_after_mutations(1);
        engine.submit(&user, StepName::Data, &data_input()).await.unwrap();

        let granted_at = store
            .find("7", SCHEME_NAME)
            .await
            .unwrap()
            .unwrap()
            .granted_at
            .expect("granted");

        // Registry flips back to pending; an edit must not revoke.
        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        census.set_state(record.person_id().unwrap(), PersonState::Pending);

        let outcome = engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        assert!(outcome.granted);

        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        assert_eq!(record.granted_at, Some(granted_at));
    }

    #[tokio::test]
    async fn test_status_reports_complete_after_early_grant() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store);
        let user = user();

        // Registry enables the person right after the data step.
        census.enable_after_mutations(1);
        let outcome = engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        assert!(outcome.granted);
        assert_eq!(outcome.next_step, None);

        // Both surfaces agree: a granted workflow is finished.
        let status = engine.status(&user).await.unwrap();
        assert!(status.granted);
        assert_eq!(status.current_step, None);
        assert_eq!(status.next_step, None);
    }

    #[tokio::test]
    async fn test_verification_completion_tracked_locally() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        let status = engine.status(&user).await.unwrap();
        assert_eq!(status.current_step, Some(StepName::Verification));

        engine
            .submit(&user, StepName::Verification, &verification_input())
            .await
            .unwrap();
        let status = engine.status(&user).await.unwrap();
        assert_eq!(status.current_step, Some(StepName::MembershipLevel));

        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        assert!(record.verification_requested());
    }

    #[tokio::test]
    async fn test_concurrent_first_submissions_create_once() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = Arc::new(engine(census.clone(), store));
        let user = user();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let engine = engine.clone();
            let user = user.clone();
            handles.push(tokio::spawn(async move {
                engine.submit(&user, StepName::Data, &data_input()).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(census.create_calls(), 1);
        assert_eq!(census.update_calls(), 3);
    }

    #[tokio::test]
    async fn test_person_id_persisted_even_when_refetch_fails() {
        let census = Arc::new(MockCensus::new());
        let store = Arc::new(MemoryAuthorizationStore::new());
        let engine = engine(census.clone(), store.clone());
        let user = user();

        // Call 1 is the create, call 2 the follow-up re-fetch.
        census.fail_on_call(2, FailureMode::Unavailable);
        let result = engine.submit(&user, StepName::Data, &data_input()).await;
        assert!(matches!(result, Err(WorkflowError::Unavailable(_))));

        // The issued id was saved before the re-fetch, so the retry
        // updates instead of creating a duplicate.
        let record = store.find("7", SCHEME_NAME).await.unwrap().unwrap();
        assert_eq!(record.person_id(), Some(PersonId(1)));

        engine.submit(&user, StepName::Data, &data_input()).await.unwrap();
        assert_eq!(census.create_calls(), 1);
        assert_eq!(census.update_calls(), 1);
    }
}
