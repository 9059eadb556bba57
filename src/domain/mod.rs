pub mod authorization;
pub mod decision;
pub mod person;

pub use authorization::AuthorizationRecord;
pub use decision::{AuthorizationStatus, Decision, Explanation, ExplanationKey, PolicyOptions};
pub use person::{
    DocumentType, Gender, MembershipLevel, Person, PersonId, PersonRef, PersonState, QualifiedId,
};
