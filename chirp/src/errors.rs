use std::borrow::Cow;

use serde::Deserialize;
use thiserror::Error;

/// Top-level error type returned by the chirp API boundary.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credentials were missing, expired, or rejected after a refresh.
    #[error("authentication failed: {message}")]
    Authentication { message: Cow<'static, str> },

    /// Validation failed for one or more fields.
    #[error("validation failed")]
    Validation(#[from] ValidationError),

    /// A unique field (username, email) is already taken.
    #[error("conflict on fields {fields:?}: {message}")]
    Conflict { fields: Vec<String>, message: String },

    /// Requested resource does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Authenticated, but not allowed to touch this resource.
    #[error("forbidden: {message}")]
    Forbidden { message: String },

    /// Any other non-success status.
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// The caller must navigate to the login flow, then come back to `redirect_to`.
    #[error("login required (redirectTo={redirect_to})")]
    Redirect { redirect_to: String },

    /// Transport failure below HTTP.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("decode error: {message}")]
    Decode { message: String },

    /// Invalid input supplied by the caller before any request was made.
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    /// The query was cancelled while in flight; its result was discarded.
    #[error("query cancelled")]
    Cancelled,

    /// Client could not be built from its configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    /// Expected, user-facing failures. Everything else goes to the top-level fallback.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            ApiError::Authentication { .. }
                | ApiError::Validation(_)
                | ApiError::Conflict { .. }
                | ApiError::NotFound { .. }
                | ApiError::Forbidden { .. }
                | ApiError::InvalidRequest { .. }
        )
    }

    pub(crate) fn auth(message: impl Into<Cow<'static, str>>) -> Self {
        ApiError::Authentication { message: message.into() }
    }

    /// Maps a non-success HTTP status and its body onto the error taxonomy.
    pub fn from_status(status: u16, resource: &str, body: &str) -> Self {
        let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
        let message = parsed.message.clone().unwrap_or_else(|| body.trim().to_string());

        match status {
            400 | 422 => {
                let issues: Vec<ValidationIssue> = parsed
                    .issues
                    .into_iter()
                    .map(|issue| {
                        ValidationIssue::new(
                            issue.field.unwrap_or_else(|| "body".to_string()),
                            issue.code.unwrap_or_else(|| "invalid".to_string()),
                            issue.message,
                        )
                    })
                    .collect();
                if issues.is_empty() {
                    ApiError::Validation(ValidationError::single("body", "invalid", message))
                } else {
                    ApiError::Validation(ValidationError::new(issues))
                }
            }
            401 => ApiError::Authentication { message: Cow::Owned(message) },
            403 => ApiError::Forbidden { message },
            404 => ApiError::NotFound {
                resource: resource.to_string(),
            },
            409 => ApiError::Conflict {
                fields: parsed.fields,
                message,
            },
            _ => ApiError::Server { status, message },
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    issues: Vec<ErrorBodyIssue>,
    #[serde(default)]
    fields: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBodyIssue {
    #[serde(default, alias = "path")]
    field: Option<String>,
    #[serde(default)]
    code: Option<String>,
    message: String,
}

/// Collection of validation issues, from the server or from local checks.
#[derive(Debug, Error)]
#[error("validation errors: {issues:?}")]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new<I>(issues: I) -> Self
    where
        I: IntoIterator<Item = ValidationIssue>,
    {
        Self {
            issues: issues.into_iter().collect(),
        }
    }

    /// Convenience helper for constructing a single-field validation error.
    pub fn single(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new([ValidationIssue::new(field, code, message)])
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn field(&self, field: &str) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.field == field)
    }
}

/// Detailed validation failure for a single field or logical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(field: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Failure loading `config.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("environment variable {0} not set")]
    MissingEnv(String),

    #[error("invalid base url {url}: {source}")]
    BaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_validation_issues_from_body() {
        let body = r#"{"message":"bad","issues":[{"path":"username","code":"too_short","message":"min 3"}]}"#;
        let err = ApiError::from_status(422, "auth/signup", body);
        let ApiError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.field("username").map(|i| i.code.as_str()), Some("too_short"));
    }

    #[test]
    fn plain_text_400_becomes_single_issue() {
        let err = ApiError::from_status(400, "tweets", "nope");
        let ApiError::Validation(validation) = err else {
            panic!("expected validation error");
        };
        assert_eq!(validation.issues.len(), 1);
        assert_eq!(validation.issues[0].message, "nope");
    }

    #[test]
    fn maps_conflict_fields() {
        let err = ApiError::from_status(409, "auth/signup", r#"{"message":"taken","fields":["email"]}"#);
        assert!(matches!(err, ApiError::Conflict { ref fields, .. } if fields == &["email".to_string()]));
        assert!(err.is_operational());
    }

    #[test]
    fn server_errors_are_not_operational() {
        let err = ApiError::from_status(503, "tweets", "");
        assert!(matches!(err, ApiError::Server { status: 503, .. }));
        assert!(!err.is_operational());
        assert!(ApiError::from_status(404, "users/x", "").is_operational());
    }
}
