use reqwest::header::{self, HeaderMap};
use rp_passwordless_problem::{PROBLEM_JSON, ProblemDetails};
use tracing::instrument;

use crate::error::PasswordlessError;

/// Executes requests on a shared [`reqwest::Client`] and turns `application/problem+json` error
/// responses into [`PasswordlessError::Api`].
///
/// Every other response, successful or not, is handed back with its status, headers and body
/// intact so the caller can decide what to do with it.
#[derive(Clone, Debug)]
pub struct ProblemDetailsTransport {
    inner: reqwest::Client,
}

impl ProblemDetailsTransport {
    #[must_use]
    pub const fn new(inner: reqwest::Client) -> Self {
        Self { inner }
    }

    #[must_use]
    pub const fn client(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Sends the request, translating problem details error bodies.
    ///
    /// # Errors
    ///
    /// - [`PasswordlessError::Api`] if the API responded with a problem details document
    /// - [`PasswordlessError::Reqwest`] on transport failures
    #[instrument(name = "transport_send", skip_all, err)]
    pub async fn send(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, PasswordlessError> {
        let response = self.inner.execute(request).await?;
        let status = response.status();
        if status.is_success() || !is_problem_json(response.headers()) {
            return Ok(response);
        }

        let version = response.version();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;

        let mut body = bytes.to_vec();
        match simd_json::from_slice::<ProblemDetails>(body.as_mut_slice()) {
            Ok(mut problem) => {
                if problem.status == 0 {
                    problem.status = status.as_u16();
                }
                tracing::error!(
                    status = %status,
                    problem = %problem,
                    "Passwordless API returned a problem"
                );
                Err(PasswordlessError::from(problem))
            }
            Err(err) => {
                tracing::warn!(
                    status = %status,
                    error = %err,
                    "problem+json body could not be parsed, passing the response through"
                );
                let mut rebuilt = http::Response::new(bytes.to_vec());
                *rebuilt.status_mut() = status;
                *rebuilt.version_mut() = version;
                *rebuilt.headers_mut() = headers;
                Ok(reqwest::Response::from(rebuilt))
            }
        }
    }

    /// Sends the request without looking at the response.
    ///
    /// # Errors
    ///
    /// On transport failures only.
    #[instrument(name = "transport_send_raw", skip_all, err)]
    pub async fn send_raw(
        &self,
        request: reqwest::Request,
    ) -> Result<reqwest::Response, PasswordlessError> {
        Ok(self.inner.execute(request).await?)
    }
}

/// `true` if the media type of the `Content-Type` header is `application/problem+json`.
/// Parameters such as `charset` are ignored and the comparison is case-insensitive.
pub(crate) fn is_problem_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|media_type| media_type.trim().eq_ignore_ascii_case(PROBLEM_JSON))
}
