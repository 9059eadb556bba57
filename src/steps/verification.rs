use serde::Deserialize;

use crate::census::VerificationFile;
use crate::domain::DocumentType;
use crate::error::FieldErrors;

use super::traits::{StepAction, StepContext, StepHandler};
use super::StepName;

/// Raw input for the document-verification step. Files arrive already
/// encoded; the upload handling itself is the caller's concern.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerificationInput {
    pub document_file1: Option<VerificationFile>,
    pub document_file2: Option<VerificationFile>,
    pub tos_agreement: Option<bool>,
}

/// Handler for the `verification` step: one document image always, a
/// second one only for passports, and an optional terms acceptance that
/// must be affirmative when present.
pub struct VerificationHandler;

impl StepHandler for VerificationHandler {
    fn step(&self) -> StepName {
        StepName::Verification
    }

    fn validate(
        &self,
        raw: &serde_json::Value,
        ctx: &StepContext<'_>,
    ) -> Result<StepAction, FieldErrors> {
        let mut errors = FieldErrors::new();

        let input: VerificationInput = match serde_json::from_value(raw.clone()) {
            Ok(input) => input,
            Err(_) => {
                errors.add("input", "invalid");
                return Err(errors);
            }
        };

        if input.document_file1.is_none() {
            errors.add("document_file1", "required");
        }

        let document_type = ctx.person.map(|p| p.document_type);
        let needs_second_file = document_type == Some(DocumentType::Passport);
        if needs_second_file && input.document_file2.is_none() {
            errors.add("document_file2", "required");
        }

        if input.tos_agreement == Some(false) {
            errors.add("tos_agreement", "must_be_accepted");
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut files = Vec::with_capacity(2);
        files.extend(input.document_file1);
        files.extend(input.document_file2);

        Ok(StepAction::SubmitVerification(files))
    }
}
