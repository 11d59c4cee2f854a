extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::fmt;

use serde::{Deserialize, Serialize};
use simd_json::OwnedValue;
use simd_json::prelude::*;

/// The media type the Passwordless API uses for structured error bodies.
pub const PROBLEM_JSON: &str = "application/problem+json";

/// Name of the extension member carrying the machine readable error code.
pub const ERROR_CODE_EXTENSION: &str = "errorCode";

const DEFAULT_TYPE: &str = "about:blank";
const VALIDATION_TYPE: &str = "https://tools.ietf.org/html/rfc9110#section-15.5.1";
const VALIDATION_TITLE: &str = "One or more validation errors occurred.";

/// A problem details contract as defined in RFC 7807.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct ProblemDetails {
    #[serde(rename = "type", default = "default_type")]
    pub problem_type: String,
    #[serde(default)]
    pub title: String,
    /// Zero when the body omitted it; the transport fills it from the HTTP status.
    #[serde(default)]
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    /// Additional domain-specific members of the problem.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, OwnedValue>,
}

fn default_type() -> String {
    DEFAULT_TYPE.to_owned()
}

impl ProblemDetails {
    #[must_use]
    pub fn new(status: u16, title: impl Into<String>) -> Self {
        Self {
            problem_type: default_type(),
            title: title.into(),
            status,
            detail: None,
            instance: None,
            extensions: BTreeMap::new(),
        }
    }

    /// Builds a `400` problem listing field level validation failures under `errors`.
    #[must_use]
    pub fn validation(errors: BTreeMap<String, Vec<String>>) -> Self {
        let errors = errors
            .into_iter()
            .map(|(field, messages)| {
                let messages = messages.into_iter().map(OwnedValue::from).collect::<Vec<_>>();
                (field, OwnedValue::from(messages))
            })
            .collect::<simd_json::owned::Object>();

        let mut problem = Self::new(400, VALIDATION_TITLE);
        problem.problem_type = VALIDATION_TYPE.to_owned();
        problem
            .extensions
            .insert("errors".to_owned(), OwnedValue::from(errors));
        problem
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn with_error_code(mut self, code: &ErrorCode) -> Self {
        self.extensions.insert(
            ERROR_CODE_EXTENSION.to_owned(),
            OwnedValue::from(code.as_str().to_owned()),
        );
        self
    }

    /// The raw `errorCode` extension, if the API sent one as a string.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.extensions
            .get(ERROR_CODE_EXTENSION)
            .and_then(|value| value.as_str())
    }

    /// The typed error code, if present.
    #[must_use]
    pub fn code(&self) -> Option<ErrorCode> {
        self.error_code().map(ErrorCode::from_code)
    }

    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.status >= 400 && self.status < 500
    }

    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status >= 500
    }
}

impl fmt::Display for ProblemDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status, self.title)?;
        if let Some(code) = self.error_code() {
            write!(f, " ({code})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl core::error::Error for ProblemDetails {}

/// Well known values of the `errorCode` extension.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub enum ErrorCode {
    MissingUserId,
    MissingRegisterToken,
    AliasConflict,
    UnknownCredential,
    InvalidSignature,
    InvalidToken,
    MaxUsersReached,
    // Any other code
    Other(String),
}

impl ErrorCode {
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "missing_userid" => Self::MissingUserId,
            "missing_register_token" => Self::MissingRegisterToken,
            "alias_conflict" => Self::AliasConflict,
            "unknown_credential" => Self::UnknownCredential,
            "invalid_signature" => Self::InvalidSignature,
            "invalid_token" => Self::InvalidToken,
            "max_users_reached" => Self::MaxUsersReached,
            other => Self::Other(other.to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::MissingUserId => "missing_userid",
            Self::MissingRegisterToken => "missing_register_token",
            Self::AliasConflict => "alias_conflict",
            Self::UnknownCredential => "unknown_credential",
            Self::InvalidSignature => "invalid_signature",
            Self::InvalidToken => "invalid_token",
            Self::MaxUsersReached => "max_users_reached",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(body: &str) -> ProblemDetails {
        let mut bytes = body.as_bytes().to_vec();
        simd_json::from_slice::<ProblemDetails>(bytes.as_mut_slice()).unwrap()
    }

    #[test]
    fn test_parse_problem_with_error_code() {
        let problem = parse(
            r#"{
                "type": "https://docs.passwordless.dev/guide/errors.html#missing_userid",
                "title": "Missing UserId",
                "status": 400,
                "errorCode": "missing_userid"
            }"#,
        );

        assert_eq!(problem.status, 400);
        assert_eq!(problem.title, "Missing UserId");
        assert_eq!(problem.detail, None);
        assert_eq!(problem.error_code(), Some("missing_userid"));
        assert_eq!(problem.code(), Some(ErrorCode::MissingUserId));
        assert!(problem.is_client_error());
    }

    #[test]
    fn test_unknown_members_are_kept_as_extensions() {
        let problem = parse(
            r#"{"title": "Boom", "status": 500, "traceId": "00-abc", "retryable": false}"#,
        );

        assert_eq!(problem.problem_type, "about:blank");
        assert_eq!(problem.extensions.len(), 2);
        assert_eq!(
            problem.extensions.get("traceId").and_then(|v| v.as_str()),
            Some("00-abc")
        );
        assert_eq!(problem.error_code(), None);
        assert!(problem.is_server_error());
    }

    #[test]
    fn test_unknown_error_code_is_preserved() {
        let code = ErrorCode::from_code("quota_exhausted");
        assert_eq!(code, ErrorCode::Other("quota_exhausted".to_owned()));
        assert_eq!(code.as_str(), "quota_exhausted");
    }

    #[test]
    fn test_validation_problem_lists_errors() {
        let mut errors = BTreeMap::new();
        errors.insert(
            "invalid_email".to_owned(),
            vec!["Email cannot be null or empty.".to_owned()],
        );
        let problem = ProblemDetails::validation(errors);

        assert_eq!(problem.status, 400);
        assert_eq!(problem.title, VALIDATION_TITLE);

        let serialized = simd_json::to_string(&problem).unwrap();
        assert!(serialized.contains("\"invalid_email\":[\"Email cannot be null or empty.\"]"));
        assert!(!serialized.contains("detail"));
    }

    #[test]
    fn test_display() {
        let problem = ProblemDetails::new(409, "Alias already in use")
            .with_detail("alias 'bob' belongs to another user")
            .with_error_code(&ErrorCode::AliasConflict);

        assert_eq!(
            problem.to_string(),
            "[409] Alias already in use (alias_conflict): alias 'bob' belongs to another user"
        );
    }
}
