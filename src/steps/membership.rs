use serde::Deserialize;

use crate::census::MembershipPayload;
use crate::domain::MembershipLevel;
use crate::error::FieldErrors;

use super::traits::{StepAction, StepContext, StepHandler};
use super::StepName;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MembershipInput {
    pub membership_level: Option<String>,
}

/// Handler for the `membership_level` step: a single value drawn from the
/// fixed level set.
pub struct MembershipLevelHandler;

impl StepHandler for MembershipLevelHandler {
    fn step(&self) -> StepName {
        StepName::MembershipLevel
    }

    fn validate(
        &self,
        raw: &serde_json::Value,
        _ctx: &StepContext<'_>,
    ) -> Result<StepAction, FieldErrors> {
        let mut errors = FieldErrors::new();

        let input: MembershipInput = match serde_json::from_value(raw.clone()) {
            Ok(input) => input,
            Err(_) => {
                errors.add("input", "invalid");
                return Err(errors);
            }
        };

        let level = match input.membership_level.as_deref() {
            Some(raw_level) => match MembershipLevel::from_str(raw_level) {
                Some(level) => level,
                None => {
                    errors.add("membership_level", "invalid_value");
                    return Err(errors);
                }
            },
            None => {
                errors.add("membership_level", "required");
                return Err(errors);
            }
        };

        Ok(StepAction::SetMembershipLevel(MembershipPayload {
            membership_level: level,
        }))
    }
}
