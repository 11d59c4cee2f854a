use alloc::collections::BTreeMap;

use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use rp_passwordless_client::PasswordlessError;
use rp_passwordless_problem::{PROBLEM_JSON, ProblemDetails};

use crate::store::UserStoreError;

#[derive(thiserror::Error, Debug)]
pub enum IntegrationError {
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(&'static str),
    #[error("Validation failed")]
    Validation(BTreeMap<String, Vec<String>>),
    /// A problem reported by the Passwordless API, relayed as is.
    #[error("Passwordless API error {0}")]
    Api(Box<ProblemDetails>),
    #[error("Passwordless client error {0}")]
    Client(PasswordlessError),
    #[error("User store error {0}")]
    Store(String),
    #[error("Session error {0}")]
    Session(#[from] tower_sessions::session::Error),
}

impl IntegrationError {
    pub(crate) fn validation(code: &str, message: &str) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(code.to_owned(), vec![message.to_owned()]);
        Self::Validation(errors)
    }

    /// The problem details sent to the browser.
    #[must_use]
    pub fn to_problem(&self) -> ProblemDetails {
        match self {
            Self::Unauthorized => ProblemDetails::new(401, "Unauthorized"),
            Self::Forbidden(reason) => ProblemDetails::new(403, "Forbidden").with_detail(*reason),
            Self::Validation(errors) => ProblemDetails::validation(errors.clone()),
            Self::Api(problem) => relayed(problem),
            Self::Client(_) | Self::Store(_) | Self::Session(_) => {
                ProblemDetails::new(500, "An error occurred while processing your request.")
            }
        }
    }
}

/// Only the standard members of an API problem are passed on to the browser.
fn relayed(problem: &ProblemDetails) -> ProblemDetails {
    let mut relayed = ProblemDetails::new(problem.status, problem.title.clone());
    relayed.problem_type.clone_from(&problem.problem_type);
    relayed.detail.clone_from(&problem.detail);
    relayed.instance.clone_from(&problem.instance);
    relayed
}

impl From<PasswordlessError> for IntegrationError {
    fn from(err: PasswordlessError) -> Self {
        match err {
            PasswordlessError::Api(problem) => Self::Api(problem),
            other => Self::Client(other),
        }
    }
}

impl From<UserStoreError> for IntegrationError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::Validation(errors) => Self::Validation(errors),
            UserStoreError::Backend(message) => Self::Store(message),
        }
    }
}

impl IntoResponse for IntegrationError {
    fn into_response(self) -> Response {
        let problem = self.to_problem();
        match &self {
            Self::Client(_) | Self::Store(_) | Self::Session(_) => {
                tracing::error!(error = %self, "Passwordless integration failure");
            }
            Self::Api(_) => {
                tracing::debug!(problem = %problem, "Relaying Passwordless API problem");
            }
            Self::Unauthorized | Self::Forbidden(_) | Self::Validation(_) => {
                tracing::debug!(error = %self, "Rejected request");
            }
        }

        let status =
            StatusCode::from_u16(problem.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match simd_json::to_vec(&problem) {
            Ok(body) => (status, [(header::CONTENT_TYPE, PROBLEM_JSON)], body).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize problem details");
                status.into_response()
            }
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;
    use rp_passwordless_problem::ErrorCode;

    use super::*;

    #[test]
    fn test_api_problem_is_relayed_without_extensions() {
        let problem = ProblemDetails::new(409, "Alias already in use")
            .with_detail("bob")
            .with_error_code(&ErrorCode::AliasConflict);
        let err = IntegrationError::from(PasswordlessError::from(problem));

        let relayed = err.to_problem();

        assert_eq!(relayed.status, 409);
        assert_eq!(relayed.title, "Alias already in use");
        assert_eq!(relayed.detail.as_deref(), Some("bob"));
        assert!(relayed.extensions.is_empty());
    }

    #[test]
    fn test_response_is_problem_json() {
        let response = IntegrationError::validation("invalid_email", "Email cannot be null or empty.")
            .into_response();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            PROBLEM_JSON
        );
    }
}
