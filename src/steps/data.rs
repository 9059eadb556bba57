use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::census::PersonPayload;
use crate::domain::{DocumentType, Gender};
use crate::error::FieldErrors;
use crate::scopes::Scope;

use super::traits::{StepAction, StepContext, StepHandler};
use super::StepName;

/// Raw input for the personal-data step. Everything is optional at the
/// wire level; presence rules live in `validate`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DataInput {
    pub first_name: Option<String>,
    pub last_name1: Option<String>,
    pub last_name2: Option<String>,

    pub document_type: Option<String>,
    pub document_id: Option<String>,
    pub document_scope_id: Option<i64>,

    pub born_at: Option<NaiveDate>,
    pub gender: Option<String>,

    pub address: Option<String>,
    pub address_scope_id: Option<i64>,
    pub scope_id: Option<i64>,
    pub postal_code: Option<String>,
}

/// Handler for the `data` step: identity fields, document constraints,
/// the deployment-wide age floor and scope resolution.
pub struct DataHandler;

impl DataHandler {
    /// Prefill for a first visit, mirroring the form defaults: every scope
    /// field points at the local scope and the first document type is
    /// selected.
    pub fn default_values(ctx: &StepContext<'_>) -> serde_json::Value {
        let local_id = ctx.local_scope().map(|s| s.id);
        serde_json::json!({
            "document_type": DocumentType::ALL[0].as_str(),
            "document_scope_id": local_id,
            "address_scope_id": local_id,
            "scope_id": local_id,
        })
    }
}

fn require<'a>(errors: &mut FieldErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Some(v),
        _ => {
            errors.add(field, "required");
            None
        }
    }
}

/// The same calendar day `years` years earlier, clamping Feb 29 to Feb 28.
fn years_before(date: NaiveDate, years: u32) -> NaiveDate {
    let year = date.year() - years as i32;
    NaiveDate::from_ymd_opt(year, date.month(), date.day())
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 2, 28).expect("valid clamp date"))
}

impl StepHandler for DataHandler {
    fn step(&self) -> StepName {
        StepName::Data
    }

    fn validate(
        &self,
        raw: &serde_json::Value,
        ctx: &StepContext<'_>,
    ) -> Result<StepAction, FieldErrors> {
        let mut errors = FieldErrors::new();

        let input: DataInput = match serde_json::from_value(raw.clone()) {
            Ok(input) => input,
            Err(_) => {
                errors.add("input", "invalid");
                return Err(errors);
            }
        };

        let first_name = require(&mut errors, "first_name", &input.first_name);
        let last_name1 = require(&mut errors, "last_name1", &input.last_name1);
        let address = require(&mut errors, "address", &input.address);

        let document_type = match require(&mut errors, "document_type", &input.document_type) {
            Some(raw_type) => match DocumentType::from_str(raw_type) {
                Some(doc) => Some(doc),
                None => {
                    errors.add("document_type", "invalid_value");
                    None
                }
            },
            None => None,
        };

        let document_id = require(&mut errors, "document_id", &input.document_id);
        if let Some(id) = document_id {
            if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
                errors.add("document_id", "invalid_format");
            }
        }

        let gender = match require(&mut errors, "gender", &input.gender) {
            Some(raw_gender) => match Gender::from_str(raw_gender) {
                Some(g) => Some(g),
                None => {
                    errors.add("gender", "invalid_value");
                    None
                }
            },
            None => None,
        };

        let postal_code = require(&mut errors, "postal_code", &input.postal_code);
        if let Some(code) = postal_code {
            if !code.chars().all(|c| c.is_ascii_digit()) {
                errors.add("postal_code", "invalid_format");
            }
        }

        let born_at = match input.born_at {
            Some(date) => {
                // Strictly before the boundary: born exactly minimum_age
                // years ago today is still under age.
                let boundary = years_before(ctx.today, ctx.minimum_age);
                if date >= boundary {
                    errors.add("born_at", "under_minimum_age");
                }
                Some(date)
            }
            None => {
                errors.add("born_at", "required");
                None
            }
        };

        // Passport holders are exempt from the document-scope requirement;
        // local documents must name their issuing scope.
        let local_document = document_type.is_some_and(|d| d.is_local());
        let document_scope: Option<&Scope> = match input.document_scope_id {
            Some(id) => match ctx.scopes.find_by_id(id) {
                Some(scope) => Some(scope),
                None => {
                    errors.add("document_scope_id", "not_found");
                    None
                }
            },
            None if local_document => {
                errors.add("document_scope_id", "required");
                None
            }
            None => None,
        };

        let address_scope = match input.address_scope_id {
            Some(id) => match ctx.scopes.find_by_id(id) {
                Some(scope) => Some(scope),
                None => {
                    errors.add("address_scope_id", "not_found");
                    None
                }
            },
            None => {
                errors.add("address_scope_id", "required");
                None
            }
        };

        if input.scope_id.is_none() {
            errors.add("scope_id", "required");
        }

        // Effective scope: the address scope when it falls inside the
        // local jurisdiction, the explicit scope otherwise.
        let scope = match (ctx.local_scope(), address_scope) {
            (Some(local), Some(addr)) if ctx.scopes.ancestor_of(local, addr) => Some(addr),
            _ => match input.scope_id {
                Some(id) => match ctx.scopes.find_by_id(id) {
                    Some(scope) => Some(scope),
                    None => {
                        errors.add("scope_id", "not_found");
                        None
                    }
                },
                None => None,
            },
        };

        let (
            Some(first_name),
            Some(last_name1),
            Some(document_type),
            Some(document_id),
            Some(born_at),
            Some(gender),
            Some(address),
            Some(postal_code),
            Some(address_scope),
            Some(scope),
        ) = (
            first_name,
            last_name1,
            document_type,
            document_id,
            born_at,
            gender,
            address,
            postal_code,
            address_scope,
            scope,
        )
        else {
            return Err(errors);
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut extra = serde_json::Map::new();
        extra.insert(
            "local_user_id".to_string(),
            serde_json::Value::String(ctx.user.id.clone()),
        );

        let payload = PersonPayload {
            first_name: first_name.to_string(),
            last_name1: last_name1.to_string(),
            last_name2: input.last_name2.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from),
            document_type,
            document_id: document_id.to_string(),
            born_at,
            gender,
            address: address.to_string(),
            postal_code: postal_code.to_string(),
            document_scope_code: document_scope.map(|s| s.code.clone()),
            address_scope_code: address_scope.code.clone(),
            scope_code: scope.code.clone(),
            email: ctx.user.email.clone(),
            extra,
        };

        Ok(StepAction::UpsertPerson(payload))
    }
}
