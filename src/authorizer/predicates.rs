use chrono::NaiveDate;

use crate::domain::{Person, PolicyOptions};

/// One independent policy constraint.
///
/// A predicate with no matching option configured is a no-op. On failure
/// it reports the offending value to be keyed under `field` in the
/// decision's unmatched set.
pub trait PolicyPredicate: Send + Sync {
    /// Field name used in `unmatched_fields`.
    fn field(&self) -> &'static str;

    /// `Some(offending_value)` when the constraint fails, `None` otherwise.
    fn evaluate(
        &self,
        person: &Person,
        options: &PolicyOptions,
        today: NaiveDate,
    ) -> Option<serde_json::Value>;
}

/// Fails when a minimum age is configured and the person's whole-year age
/// is below it.
pub struct AgePredicate;

impl PolicyPredicate for AgePredicate {
    fn field(&self) -> &'static str {
        "age"
    }

    fn evaluate(
        &self,
        person: &Person,
        options: &PolicyOptions,
        today: NaiveDate,
    ) -> Option<serde_json::Value> {
        let minimum = options.minimum_age?;
        let age = person.age_on(today);
        (age < minimum).then(|| serde_json::json!(age))
    }
}

/// Fails when an allowed-type set is configured and the person's document
/// type is not a member of it.
pub struct DocumentTypePredicate;

impl PolicyPredicate for DocumentTypePredicate {
    fn field(&self) -> &'static str {
        "document_type"
    }

    fn evaluate(
        &self,
        person: &Person,
        options: &PolicyOptions,
        _today: NaiveDate,
    ) -> Option<serde_json::Value> {
        let allowed = options.allowed_document_types.as_ref()?;
        (!allowed.contains(&person.document_type))
            .then(|| serde_json::json!(person.document_type.as_str()))
    }
}

/// The predicate set evaluated on every check.
pub fn default_predicates() -> Vec<Box<dyn PolicyPredicate>> {
    vec![Box::new(AgePredicate), Box::new(DocumentTypePredicate)]
}
