use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::domain::{Person, PersonId, PersonRef, PersonState};
use crate::error::{CensusError, FieldErrors};

use super::{CensusApi, MembershipPayload, PersonPayload, VerificationFile};

/// Scripted failure for the next registry call.
#[derive(Debug)]
pub enum FailureMode {
    Unavailable,
    Rejected(FieldErrors),
}

#[derive(Default)]
struct Inner {
    next_id: i64,
    persons: HashMap<i64, Person>,
    qualified: HashMap<String, i64>,
    create_calls: u32,
    update_calls: u32,
    verification_calls: u32,
    membership_calls: u32,
    mutations: u32,
    enable_after_mutations: Option<u32>,
    calls: u32,
    scripted_failures: HashMap<u32, FailureMode>,
}

/// In-memory census registry for tests: records calls, scripts state
/// transitions and injects failures.
#[derive(Default)]
pub struct MockCensus {
    inner: Mutex<Inner>,
}

impl MockCensus {
    pub fn new() -> Self {
        MockCensus {
            inner: Mutex::new(Inner { next_id: 1, ..Inner::default() }),
        }
    }

    /// After `n` successful mutating calls the touched person flips to
    /// `enabled`, mimicking a registry-side approval.
    pub fn enable_after_mutations(&self, n: u32) {
        self.inner.lock().enable_after_mutations = Some(n);
    }

    /// Fail the next call.
    pub fn fail_next(&self, mode: FailureMode) {
        let mut inner = self.inner.lock();
        let next = inner.calls + 1;
        inner.scripted_failures.insert(next, mode);
    }

    /// Fail the nth call from now (1-based), letting earlier calls pass.
    pub fn fail_on_call(&self, n: u32, mode: FailureMode) {
        let mut inner = self.inner.lock();
        let target = inner.calls + n;
        inner.scripted_failures.insert(target, mode);
    }

    /// Force a person's registry state (for scripting edge cases).
    pub fn set_state(&self, id: PersonId, state: PersonState) {
        if let Some(person) = self.inner.lock().persons.get_mut(&id.0) {
            person.state = state;
        }
    }

    /// Map a qualified id onto a stored person.
    pub fn alias_qualified(&self, qualified: &str, id: PersonId) {
        self.inner.lock().qualified.insert(qualified.to_string(), id.0);
    }

    pub fn person(&self, id: PersonId) -> Option<Person> {
        self.inner.lock().persons.get(&id.0).cloned()
    }

    pub fn create_calls(&self) -> u32 {
        self.inner.lock().create_calls
    }

    pub fn update_calls(&self) -> u32 {
        self.inner.lock().update_calls
    }

    pub fn verification_calls(&self) -> u32 {
        self.inner.lock().verification_calls
    }

    pub fn membership_calls(&self) -> u32 {
        self.inner.lock().membership_calls
    }
}

impl Inner {
    fn take_failure(&mut self) -> Result<(), CensusError> {
        self.calls += 1;
        match self.scripted_failures.remove(&self.calls) {
            Some(FailureMode::Unavailable) => {
                Err(CensusError::Unavailable("no route to host".to_string()))
            }
            Some(FailureMode::Rejected(fields)) => Err(CensusError::Rejected(fields)),
            None => Ok(()),
        }
    }

    fn resolve(&self, person: &PersonRef) -> Result<i64, CensusError> {
        let id = match person {
            PersonRef::Id(id) => id.0,
            PersonRef::Qualified(qid) => *self
                .qualified
                .get(&qid.to_string())
                .ok_or_else(|| CensusError::Rejected(FieldErrors::new()))?,
        };
        if self.persons.contains_key(&id) {
            Ok(id)
        } else {
            Err(CensusError::Rejected(FieldErrors::new()))
        }
    }

    fn record_mutation(&mut self, touched: i64) {
        self.mutations += 1;
        if let Some(threshold) = self.enable_after_mutations {
            if self.mutations >= threshold {
                if let Some(person) = self.persons.get_mut(&touched) {
                    person.state = PersonState::Enabled;
                }
            }
        }
    }

    fn person_from_payload(payload: &PersonPayload) -> Person {
        Person {
            first_name: payload.first_name.clone(),
            last_name1: payload.last_name1.clone(),
            last_name2: payload.last_name2.clone(),
            document_type: payload.document_type,
            document_id: payload.document_id.clone(),
            born_at: payload.born_at,
            gender: payload.gender,
            address: payload.address.clone(),
            postal_code: payload.postal_code.clone(),
            document_scope_code: payload.document_scope_code.clone(),
            address_scope_code: Some(payload.address_scope_code.clone()),
            scope_code: Some(payload.scope_code.clone()),
            membership_level: None,
            state: PersonState::Pending,
        }
    }
}

#[async_trait]
impl CensusApi for MockCensus {
    async fn create_person(&self, payload: &PersonPayload) -> Result<PersonId, CensusError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let id = inner.next_id;
        inner.next_id += 1;
        inner.persons.insert(id, Inner::person_from_payload(payload));
        inner.create_calls += 1;
        inner.record_mutation(id);
        Ok(PersonId(id))
    }

    async fn find_person(&self, person: &PersonRef) -> Result<Person, CensusError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let id = inner.resolve(person)?;
        Ok(inner.persons[&id].clone())
    }

    async fn update_person(
        &self,
        person: &PersonRef,
        payload: &PersonPayload,
    ) -> Result<Person, CensusError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let id = inner.resolve(person)?;
        let state = inner.persons[&id].state;
        let membership = inner.persons[&id].membership_level;

        let mut updated = Inner::person_from_payload(payload);
        updated.state = state;
        updated.membership_level = membership;
        inner.persons.insert(id, updated);

        inner.update_calls += 1;
        inner.record_mutation(id);
        Ok(inner.persons[&id].clone())
    }

    async fn create_verification(
        &self,
        person: &PersonRef,
        files: &[VerificationFile],
    ) -> Result<(), CensusError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let id = inner.resolve(person)?;
        if files.is_empty() {
            let mut errors = FieldErrors::new();
            errors.add("files", "required");
            return Err(CensusError::Rejected(errors));
        }

        inner.verification_calls += 1;
        inner.record_mutation(id);
        Ok(())
    }

    async fn create_membership_level(
        &self,
        person: &PersonRef,
        payload: &MembershipPayload,
    ) -> Result<(), CensusError> {
        let mut inner = self.inner.lock();
        inner.take_failure()?;

        let id = inner.resolve(person)?;
        if let Some(stored) = inner.persons.get_mut(&id) {
            stored.membership_level = Some(payload.membership_level);
        }

        inner.membership_calls += 1;
        inner.record_mutation(id);
        Ok(())
    }
}
