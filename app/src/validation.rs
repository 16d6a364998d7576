use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

pub const REQUIRED_FIELD: &str = "This field is required";
pub const INVALID_EMAIL: &str = "Invalid email address";
pub const MIN_QUANTITY: &str = "Quantity must be at least 1";
pub const POSITIVE_NUMBER: &str = "Must be a positive number";
pub const MAX_PERCENTAGE: &str = "Cannot exceed 100%";
pub const MIN_ITEMS: &str = "At least one item is required";

/// Form message for a rule `code` used in the model derives.
pub fn message_for(code: &str) -> Option<&'static str> {
    match code {
        "required" => Some(REQUIRED_FIELD),
        "email" => Some(INVALID_EMAIL),
        "min_quantity" => Some(MIN_QUANTITY),
        "positive" => Some(POSITIVE_NUMBER),
        "max_percentage" => Some(MAX_PERCENTAGE),
        "min_items" => Some(MIN_ITEMS),
        _ => None,
    }
}

fn describe(err: &ValidationError) -> String {
    match &err.message {
        Some(m) => m.to_string(),
        None => message_for(&err.code)
            .map(str::to_string)
            .unwrap_or_else(|| err.code.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", .0.join("; "))]
pub struct InvalidInput(pub Vec<String>);

pub fn check<T: Validate>(value: &T) -> Result<(), InvalidInput> {
    value
        .validate()
        .map_err(|errors| InvalidInput(error_messages(&errors)))
}

/// `field: message` lines, nested paths joined with dots and list indexes in
/// brackets, sorted for stable output.
pub fn error_messages(errors: &ValidationErrors) -> Vec<String> {
    let mut out = Vec::new();
    collect(errors, "", &mut out);
    out.sort();
    out
}

fn collect(errors: &ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                for err in list {
                    out.push(format!("{path}: {}", describe(err)));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(inner, &path, out),
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    collect(inner, &format!("{path}[{idx}]"), out);
                }
            }
        }
    }
}
