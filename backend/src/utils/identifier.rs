//! Identifier normalization and syntax validation.

use validator::Validate;

use crate::errors::{AuthError, AuthResult};

#[derive(Debug, Validate)]
struct EmailIdentifier {
    #[validate(
        email(message = "Must be a valid email"),
        length(max = 255, message = "Email too long")
    )]
    email: String,
}

/// Trims and lower-cases an email-like identifier, then checks its syntax.
///
/// # Errors
/// Returns `AuthError::InvalidIdentifier` carrying the validation messages.
pub fn normalize_identifier(raw: &str) -> AuthResult<String> {
    let candidate = EmailIdentifier {
        email: raw.trim().to_lowercase(),
    };

    if let Err(validation_errors) = candidate.validate() {
        let error_messages: Vec<String> = validation_errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        return Err(AuthError::invalid_identifier(error_messages.join(", ")));
    }

    Ok(candidate.email)
}
