pub mod data;
pub mod membership;
pub mod traits;
pub mod verification;

pub use data::DataHandler;
pub use membership::MembershipLevelHandler;
pub use traits::{LocalUser, StepAction, StepContext, StepHandler};
pub use verification::VerificationHandler;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered steps of the verification workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Data,
    Verification,
    MembershipLevel,
}

impl StepName {
    /// Fixed workflow order.
    pub const ORDER: [StepName; 3] = [
        StepName::Data,
        StepName::Verification,
        StepName::MembershipLevel,
    ];

    pub fn first() -> StepName {
        StepName::ORDER[0]
    }

    /// The step after this one, or `None` when the workflow is complete.
    pub fn next(&self) -> Option<StepName> {
        let idx = StepName::ORDER.iter().position(|s| s == self)?;
        StepName::ORDER.get(idx + 1).copied()
    }

    pub fn from_str(s: &str) -> Option<StepName> {
        match s {
            "data" => Some(StepName::Data),
            "verification" => Some(StepName::Verification),
            "membership_level" => Some(StepName::MembershipLevel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Data => "data",
            StepName::Verification => "verification",
            StepName::MembershipLevel => "membership_level",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static dispatch table from step name to handler. Steps are resolved by
/// this mapping, never by reflection.
pub fn handler_for(step: StepName) -> &'static dyn StepHandler {
    match step {
        StepName::Data => &DataHandler,
        StepName::Verification => &VerificationHandler,
        StepName::MembershipLevel => &MembershipLevelHandler,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_and_next() {
        assert_eq!(StepName::first(), StepName::Data);
        assert_eq!(StepName::Data.next(), Some(StepName::Verification));
        assert_eq!(StepName::Verification.next(), Some(StepName::MembershipLevel));
        assert_eq!(StepName::MembershipLevel.next(), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(StepName::from_str("membership_level"), Some(StepName::MembershipLevel));
        assert_eq!(StepName::from_str("bogus"), None);
    }

    #[test]
    fn test_registry_covers_every_step() {
        for step in StepName::ORDER {
            assert_eq!(handler_for(step).step(), step);
        }
    }
}
