//! Create-time argument checks and shared entity invariants.

use crate::error::{PortalError, PortalResult};
use crate::models::{
    qualification::CreateQualification, reference::CreateReference,
    requirement::CreateRequirement,
};

/// Collects the names of absent required fields and reports them together.
#[derive(Debug, Default)]
pub struct RequiredFields {
    missing: Vec<&'static str>,
}

impl RequiredFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, field: &'static str, value: &str) -> Self {
        if value.trim().is_empty() {
            self.missing.push(field);
        }
        self
    }

    pub fn present<T>(mut self, field: &'static str, value: Option<&T>) -> Self {
        if value.is_none() {
            self.missing.push(field);
        }
        self
    }

    pub fn positive(mut self, field: &'static str, value: u32) -> Self {
        if value == 0 {
            self.missing.push(field);
        }
        self
    }

    pub fn check(self) -> PortalResult<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(PortalError::MissingArgs {
                fields: self.missing,
            })
        }
    }
}

/// `expires` holds exactly when a positive day count is present.
pub fn expiration_is_consistent(expires: bool, expiration_days: Option<u32>) -> bool {
    match (expires, expiration_days) {
        (true, Some(days)) => days > 0,
        (false, None) => true,
        _ => false,
    }
}

pub fn validate_new_qualification(input: &CreateQualification) -> PortalResult<()> {
    let mut required = RequiredFields::new().text("name", &input.name);
    if input.expires {
        required = required.positive("expiration_days", input.expiration_days.unwrap_or(0));
    }
    required.check()?;

    if !input.expires && input.expiration_days.is_some() {
        return Err(PortalError::InvalidInput {
            message: "expiration_days given for a qualification that does not expire".into(),
        });
    }
    Ok(())
}

pub fn validate_new_requirement(input: &CreateRequirement) -> PortalResult<()> {
    RequiredFields::new()
        .text("name", &input.name)
        .text("description", &input.description)
        .positive("days_valid_for", input.days_valid_for)
        .check()
}

pub fn validate_new_reference(input: &CreateReference) -> PortalResult<()> {
    RequiredFields::new()
        .text("name", &input.name)
        .text("paragraph", &input.paragraph)
        .check()
}
