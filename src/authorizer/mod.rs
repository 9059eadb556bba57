pub mod predicates;

pub use predicates::{AgePredicate, DocumentTypePredicate, PolicyPredicate};

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use crate::census::CensusApi;
use crate::domain::authorization::SCHEME_NAME;
use crate::domain::{Decision, PersonRef, PolicyOptions};
use crate::error::AuthorizeError;
use crate::storage::AuthorizationStore;

/// Post-authorization decision engine.
///
/// Given a user and a per-action option set, evaluates every configured
/// predicate against the stored identity snapshot and aggregates the
/// result. Read-only: safe to run concurrently across and within users.
pub struct ActionAuthorizer {
    census: Arc<dyn CensusApi>,
    store: Arc<dyn AuthorizationStore>,
    predicates: Vec<Box<dyn PolicyPredicate>>,
}

impl ActionAuthorizer {
    pub fn new(census: Arc<dyn CensusApi>, store: Arc<dyn AuthorizationStore>) -> Self {
        ActionAuthorizer {
            census,
            store,
            predicates: predicates::default_predicates(),
        }
    }

    /// Evaluate the user's authorization against the action's options.
    ///
    /// `missing` short-circuits before any registry call; every predicate
    /// failure is collected, never just the first.
    pub async fn authorize(
        &self,
        user_id: &str,
        options: &PolicyOptions,
    ) -> Result<Decision, AuthorizeError> {
        let record = self
            .store
            .find(user_id, SCHEME_NAME)
            .await
            .map_err(AuthorizeError::Store)?;

        let person_id = match record {
            Some(ref record) if record.granted() => match record.person_id() {
                Some(id) => id,
                None => return Ok(Decision::missing()),
            },
            _ => return Ok(Decision::missing()),
        };

        let person = self.census.find_person(&PersonRef::Id(person_id)).await?;

        let today = Utc::now().date_naive();
        let mut unmatched = BTreeMap::new();
        for predicate in &self.predicates {
            if let Some(value) = predicate.evaluate(&person, options, today) {
                unmatched.insert(predicate.field().to_string(), value);
            }
        }

        debug!(
            user_id,
            unmatched = unmatched.len(),
            "authorization check evaluated"
        );

        if unmatched.is_empty() {
            Ok(Decision::ok(options))
        } else {
            Ok(Decision::unauthorized(unmatched, options))
        }
    }
}
