pub mod api;
pub mod authorizer;
pub mod census;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod scopes;
pub mod steps;
pub mod storage;
pub mod workflow;

pub use authorizer::ActionAuthorizer;
pub use config::Config;
pub use domain::{AuthorizationRecord, Decision, Person, PolicyOptions};
pub use error::{AuthorizeError, CensusError, FieldErrors, WorkflowError};
pub use workflow::VerificationEngine;
