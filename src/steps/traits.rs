use chrono::NaiveDate;

use crate::census::{MembershipPayload, PersonPayload, VerificationFile};
use crate::domain::{Person, PersonId};
use crate::error::FieldErrors;
use crate::scopes::{Scope, ScopeRegistry};

use super::StepName;

/// The local user driving the workflow.
#[derive(Debug, Clone)]
pub struct LocalUser {
    pub id: String,
    pub email: String,
}

/// Everything a handler may consult while validating: the user, the known
/// remote person (if any), the scope taxonomy and deployment constants.
pub struct StepContext<'a> {
    pub user: &'a LocalUser,
    pub person_id: Option<PersonId>,
    pub person: Option<&'a Person>,
    pub scopes: &'a ScopeRegistry,
    pub local_scope_code: &'a str,
    pub minimum_age: u32,
    pub today: NaiveDate,
}

impl StepContext<'_> {
    pub fn local_scope(&self) -> Option<&Scope> {
        self.scopes.find_by_code(self.local_scope_code)
    }
}

/// Validated step output: the remote mutation the state machine should
/// perform. Handlers never call the registry themselves.
#[derive(Debug)]
pub enum StepAction {
    UpsertPerson(PersonPayload),
    SubmitVerification(Vec<VerificationFile>),
    SetMembershipLevel(MembershipPayload),
}

/// One handler per step: enforces the step's field rules and normalizes
/// input into the registry payload shape.
pub trait StepHandler: Send + Sync {
    fn step(&self) -> StepName;

    fn validate(
        &self,
        raw: &serde_json::Value,
        ctx: &StepContext<'_>,
    ) -> Result<StepAction, FieldErrors>;
}
