#![allow(clippy::result_large_err)]

use super::Settings;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;

const FORBIDDEN_REF_CHARS: &[char] = &['~', '^', ':', '?', '*', '[', '\\'];

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(settings: &Settings) -> Result<(), AppError> {
        if settings.remote.trim().is_empty() {
            return Err(AppError::new(
                ErrorCategory::ValidationError,
                "remote cannot be empty",
            ));
        }

        if let Some(url) = &settings.repository_url {
            if url.trim().is_empty() {
                return Err(AppError::new(
                    ErrorCategory::ValidationError,
                    "repository_url cannot be blank; remove it instead",
                ));
            }
        }

        for (name, branch) in &settings.environments {
            Self::validate_ref_name("environment name", name)?;
            Self::validate_ref_name(&format!("branch for environment '{}'", name), branch)?;
        }

        Ok(())
    }

    /// Reject names git would refuse as refs, or that would be parsed as options.
    pub fn validate_ref_name(label: &str, value: &str) -> Result<(), AppError> {
        let problem = if value.is_empty() {
            Some("cannot be empty")
        } else if value.starts_with('-') {
            Some("cannot start with '-'")
        } else if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
            Some("cannot contain whitespace or control characters")
        } else if value.contains("..") {
            Some("cannot contain '..'")
        } else if value.contains(FORBIDDEN_REF_CHARS) {
            Some("cannot contain any of ~ ^ : ? * [ \\")
        } else if value.ends_with('/') || value.ends_with(".lock") || value.starts_with('/') {
            Some("is not a valid git ref name")
        } else {
            None
        };

        match problem {
            Some(reason) => Err(AppError::new(
                ErrorCategory::ValidationError,
                format!("{} '{}' {}", label, value, reason),
            )),
            None => Ok(()),
        }
    }
}
