pub mod account_service;
pub mod file_service;
pub mod group_service;
pub mod membership_service;
pub mod process_service;
pub mod project_service;
pub mod storage;

use std::collections::HashMap;

use crate::auth::AuthError;
use crate::clients::UpstreamError;

pub use account_service::AccountService;
pub use file_service::FileService;
pub use group_service::GroupService;
pub use membership_service::MembershipService;
pub use process_service::ProcessService;
pub use project_service::ProjectService;
pub use storage::FileStorage;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("Validation failed")]
    Fields(HashMap<String, String>),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ServiceError::BadRequest(message.into())
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ServiceError::Conflict(message.into())
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// True when the error is a UNIQUE / PRIMARY KEY constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// `%term%` for `LIKE ... ESCAPE '\'`, with wildcards in the term escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    format!("%{}%", escape_like(term))
}

/// Escape `%`, `_` and `\` for use inside a `LIKE ... ESCAPE '\'` pattern.
pub(crate) fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Trimmed, length-checked required text field.
pub(crate) fn required_text(field: &'static str, value: &str, max_chars: usize) -> ServiceResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::validation(field, "must not be empty"));
    }
    if trimmed.chars().count() > max_chars {
        return Err(ServiceError::validation(field, format!("must be at most {} characters", max_chars)));
    }
    Ok(trimmed.to_string())
}

/// Optional text: blank becomes `None`.
pub(crate) fn optional_text(
    field: &'static str,
    value: Option<&str>,
    max_chars: usize,
) -> ServiceResult<Option<String>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(text) if text.chars().count() > max_chars => Err(ServiceError::validation(
            field,
            format!("must be at most {} characters", max_chars),
        )),
        Some(text) => Ok(Some(text.to_string())),
    }
}

/// Parse `1,2,3` into ids, rejecting junk and lists longer than `max`.
pub fn parse_id_list(raw: &str, max: usize) -> ServiceResult<Vec<i64>> {
    let mut ids = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id = part
            .parse::<i64>()
            .map_err(|_| ServiceError::bad_request(format!("Invalid user id: {}", part)))?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ServiceError::bad_request("At least one id is required"));
    }
    if ids.len() > max {
        return Err(ServiceError::bad_request(format!("At most {} ids per request", max)));
    }
    Ok(ids)
}

/// Collected per-field problems, reported together.
#[derive(Debug, Default)]
pub struct FieldErrors(HashMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn check(&mut self, field: &str, result: Result<(), String>) {
        if let Err(message) = result {
            self.add(field, message);
        }
    }

    pub fn into_result(self) -> ServiceResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Fields(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("ab"), "%ab%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn required_text_trims_and_bounds() {
        assert_eq!(required_text("name", "  Team  ", 100).unwrap(), "Team");
        assert!(required_text("name", "   ", 100).is_err());
        assert!(required_text("name", &"x".repeat(101), 100).is_err());
        assert_eq!(optional_text("description", Some("  "), 500).unwrap(), None);
    }

    #[test]
    fn parses_id_lists() {
        assert_eq!(parse_id_list("1, 2,2,3", 10).unwrap(), vec![1, 2, 3]);
        assert!(parse_id_list("1,x", 10).is_err());
        assert!(parse_id_list("", 10).is_err());
        assert!(parse_id_list("1,2,3", 2).is_err());
    }
}
