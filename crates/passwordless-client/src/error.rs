use reqwest::StatusCode;
use reqwest::header::InvalidHeaderValue;
use rp_passwordless_problem::ProblemDetails;

#[derive(thiserror::Error, Debug)]
pub enum PasswordlessError {
    #[error("Passwordless: Missing ApiSecret")]
    MissingApiSecret,
    #[error("Passwordless API error {0}")]
    Api(Box<ProblemDetails>),
    #[error("Unexpected status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("Reqwest error {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Url parse error {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("JSON error {0}")]
    Json(#[from] simd_json::Error),
    #[error("Invalid header value {0}")]
    InvalidHeaderValue(#[from] InvalidHeaderValue),
}

impl PasswordlessError {
    /// The problem details the API responded with, if the failure was a structured one.
    #[must_use]
    pub fn problem(&self) -> Option<&ProblemDetails> {
        match self {
            Self::Api(problem) => Some(&**problem),
            _ => None,
        }
    }

    /// The HTTP status of a failed response, if a response was received at all.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api(problem) => StatusCode::from_u16(problem.status).ok(),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::Reqwest(err) => err.status(),
            Self::MissingApiSecret |
            Self::UrlParse(_) |
            Self::Json(_) |
            Self::InvalidHeaderValue(_) => None,
        }
    }
}

impl From<ProblemDetails> for PasswordlessError {
    fn from(problem: ProblemDetails) -> Self {
        Self::Api(Box::new(problem))
    }
}
