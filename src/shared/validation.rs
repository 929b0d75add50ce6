//! Request validation helpers.

use validator::{Validate, ValidationErrors};

use super::error::{AppError, FieldError};

/// Flatten validator output into field errors, sorted by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    let mut fields: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| e.code.to_string()),
            })
        })
        .collect();
    fields.sort_by(|a, b| a.field.cmp(&b.field));
    fields
}

/// Run a request's validation rules, reporting the first failing field.
pub fn validate_request<T: Validate>(request: &T) -> Result<(), AppError> {
    request.validate().map_err(|errors| {
        let message = field_errors(&errors)
            .first()
            .map(|e| format!("{}: {}", e.field, e.message))
            .unwrap_or_else(|| "Validation failed".into());
        AppError::Validation(message)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Body {
        #[validate(length(min = 1, message = "must not be empty"))]
        text: String,
    }

    #[test]
    fn test_first_field_error_is_reported() {
        let err = validate_request(&Body { text: String::new() }).unwrap_err();
        assert!(matches!(err, AppError::Validation(m) if m == "text: must not be empty"));
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_request(&Body { text: "hi".into() }).is_ok());
    }
}
