//! Field-level input validation for registration and login.

use serde::Deserialize;

use crate::error::{CoreError, CoreResult, FieldError};

pub const NAME_MIN: usize = 3;
pub const NAME_MAX: usize = 100;
pub const IDENTIFIER_MIN: usize = 3;
pub const IDENTIFIER_MAX: usize = 64;
pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 32;

#[derive(Clone, Default, Deserialize)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Clone, Default, Deserialize)]
pub struct LoginInput {
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub password: String,
}

fn check_length(
    errors: &mut Vec<FieldError>,
    field: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if value.trim().is_empty() {
        errors.push(FieldError::new(field, "required", "This field is required"));
    } else if len < min {
        errors.push(FieldError::new(
            field,
            "min",
            format!("Should be at least {min} characters long"),
        ));
    } else if len > max {
        errors.push(FieldError::new(
            field,
            "max",
            format!("Should not be longer than {max} characters"),
        ));
    }
}

fn check_password(errors: &mut Vec<FieldError>, password: &str) {
    let len = password.chars().count();
    if password.is_empty() {
        errors.push(FieldError::new("password", "required", "This field is required"));
    } else if !(PASSWORD_MIN..=PASSWORD_MAX).contains(&len) {
        errors.push(FieldError::new(
            "password",
            "password",
            format!("Password must be {PASSWORD_MIN}-{PASSWORD_MAX} characters long"),
        ));
    }
}

fn finish(errors: Vec<FieldError>) -> CoreResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(errors))
    }
}

impl RegisterInput {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = Vec::new();
        check_length(&mut errors, "name", &self.name, NAME_MIN, NAME_MAX);
        check_length(
            &mut errors,
            "identifier",
            &self.identifier,
            IDENTIFIER_MIN,
            IDENTIFIER_MAX,
        );
        if self.identifier.chars().any(char::is_whitespace) {
            errors.push(FieldError::new(
                "identifier",
                "no_whitespace",
                "Should not contain whitespace",
            ));
        }
        check_password(&mut errors, &self.password);
        finish(errors)
    }
}

impl LoginInput {
    pub fn validate(&self) -> CoreResult<()> {
        let mut errors = Vec::new();
        check_length(
            &mut errors,
            "identifier",
            &self.identifier,
            IDENTIFIER_MIN,
            IDENTIFIER_MAX,
        );
        check_password(&mut errors, &self.password);
        finish(errors)
    }
}
