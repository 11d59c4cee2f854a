//! Time boxed elevation for sensitive pages.
//!
//! A successful step-up stores a claim named after the purpose (e.g. `Elevated`) whose value is
//! the RFC 3339 instant it stops being valid. [`step_up_guard`] only lets a request through while
//! such a claim exists and `now < expiry`; otherwise the browser is redirected to the login page
//! or to the step-up page, with the purpose and return url in the query string.

use alloc::sync::Arc;

use axum::extract::{OriginalUri, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse as _, Redirect, Response};
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::Deserialize;
use tower_sessions::Session;

use crate::clock::Clock;
use crate::error::IntegrationError;
use crate::options::StepUpOptions;
use crate::principal::ClaimsPrincipal;

/// Form posted by the step-up page once the browser obtained a fresh token.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpRequest {
    pub step_up_token: String,
    #[serde(default)]
    pub return_url: String,
    pub purpose: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpOutcome {
    Allowed,
    /// Nobody is signed in.
    LoginRequired,
    /// Signed in, but the claim for the purpose is missing, expired or unreadable.
    StepUpRequired,
}

/// Decides whether `principal` may access something guarded by `purpose` at `now`.
#[must_use]
pub fn evaluate(
    principal: Option<&ClaimsPrincipal>,
    purpose: &str,
    now: DateTime<Utc>,
) -> StepUpOutcome {
    let Some(principal) = principal else {
        return StepUpOutcome::LoginRequired;
    };
    match principal.find_first(purpose).and_then(parse_expiry) {
        Some(expiry) if now < expiry => StepUpOutcome::Allowed,
        _ => StepUpOutcome::StepUpRequired,
    }
}

fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|expiry| expiry.with_timezone(&Utc))
}

/// Grants `purpose` until `now + ttl`, replacing any earlier grant.
///
/// The stored value keeps sub-second precision, so it parses back to exactly the returned expiry.
pub fn mint_claim(
    principal: &mut ClaimsPrincipal,
    purpose: &str,
    now: DateTime<Utc>,
    ttl: core::time::Duration,
) -> DateTime<Utc> {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    let expiry = now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
    principal.set_claim(purpose, expiry.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    expiry
}

/// Only same-site relative paths are followed; anything else falls back to `/`.
#[must_use]
pub fn local_return_url(return_url: &str) -> &str {
    let is_local = return_url.starts_with('/') &&
        !return_url.starts_with("//") &&
        !return_url.starts_with("/\\") &&
        !return_url.contains(['\r', '\n']);
    if is_local { return_url } else { "/" }
}

pub(crate) fn login_location(options: &StepUpOptions, return_url: &str) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("returnUrl", return_url)
        .finish();
    format!("{}?{query}", options.login_path)
}

pub(crate) fn challenge_location(
    options: &StepUpOptions,
    purpose: &str,
    return_url: &str,
) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("purpose", purpose)
        .append_pair("returnUrl", return_url)
        .finish();
    format!("{}?{query}", options.challenge_path)
}

/// State for [`step_up_guard`], one per guarded purpose.
#[derive(Clone)]
pub struct RequireStepUp {
    purpose: Arc<str>,
    options: Arc<StepUpOptions>,
    clock: Arc<dyn Clock>,
}

impl RequireStepUp {
    #[must_use]
    pub fn new(purpose: &str, options: StepUpOptions, clock: Arc<dyn Clock>) -> Self {
        Self {
            purpose: Arc::from(purpose),
            options: Arc::new(options),
            clock,
        }
    }

    #[must_use]
    pub fn purpose(&self) -> &str {
        &self.purpose
    }
}

impl core::fmt::Debug for RequireStepUp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequireStepUp")
            .field("purpose", &self.purpose)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Middleware enforcing a step-up purpose, for use with
/// `axum::middleware::from_fn_with_state(RequireStepUp, step_up_guard)`.
///
/// # Errors
///
/// If the session cannot be read.
#[tracing::instrument(name = "step_up_guard", skip_all, fields(purpose = %guard.purpose))]
pub async fn step_up_guard(
    State(guard): State<RequireStepUp>,
    session: Session,
    request: Request,
    next: Next,
) -> Result<Response, IntegrationError> {
    let principal = ClaimsPrincipal::from_session(&session).await?;
    // `OriginalUri` keeps the prefix of routers mounted with `Router::nest`
    let uri = request
        .extensions()
        .get::<OriginalUri>()
        .map_or_else(|| request.uri(), |original| &original.0);
    let return_url = uri
        .path_and_query()
        .map_or_else(|| "/".to_owned(), ToString::to_string);

    match evaluate(principal.as_ref(), &guard.purpose, guard.clock.now()) {
        StepUpOutcome::Allowed => Ok(next.run(request).await),
        StepUpOutcome::LoginRequired => {
            tracing::debug!("Not signed in, redirecting to login");
            let location = login_location(&guard.options, &return_url);
            Ok(Redirect::to(&location).into_response())
        }
        StepUpOutcome::StepUpRequired => {
            tracing::debug!("Step-up required");
            let location = challenge_location(&guard.options, &guard.purpose, &return_url);
            Ok(Redirect::to(&location).into_response())
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::principal::Claim;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn signed_in(claims: &[(&str, &str)]) -> ClaimsPrincipal {
        let mut principal = ClaimsPrincipal::new(vec![Claim::new("sub", "user123")]);
        for (kind, value) in claims {
            principal.add_claim(Claim::new(*kind, *value));
        }
        principal
    }

    #[test]
    fn test_not_signed_in() {
        assert_eq!(
            evaluate(None, "Elevated", at("2024-01-01T00:00:00Z")),
            StepUpOutcome::LoginRequired
        );
    }

    #[rstest]
    #[case::missing(&[], StepUpOutcome::StepUpRequired)]
    #[case::other_purpose(&[("SecondContext", "2024-01-01T00:05:00Z")], StepUpOutcome::StepUpRequired)]
    #[case::valid(&[("Elevated", "2024-01-01T00:05:00Z")], StepUpOutcome::Allowed)]
    #[case::expires_now(&[("Elevated", "2024-01-01T00:00:00Z")], StepUpOutcome::StepUpRequired)]
    #[case::expired(&[("Elevated", "2023-12-31T23:59:59Z")], StepUpOutcome::StepUpRequired)]
    #[case::garbage(&[("Elevated", "tomorrow")], StepUpOutcome::StepUpRequired)]
    fn test_evaluate(#[case] claims: &[(&str, &str)], #[case] expected: StepUpOutcome) {
        let principal = signed_in(claims);
        assert_eq!(
            evaluate(Some(&principal), "Elevated", at("2024-01-01T00:00:00Z")),
            expected
        );
    }

    #[test]
    fn test_mint_claim_replaces_previous_grant() {
        let now = at("2024-01-01T00:00:00Z");
        let mut principal = signed_in(&[("Elevated", "2023-01-01T00:00:00Z")]);

        let expiry = mint_claim(
            &mut principal,
            "Elevated",
            now,
            core::time::Duration::from_secs(300),
        );

        assert_eq!(expiry, at("2024-01-01T00:05:00Z"));
        assert_eq!(principal.find_first("Elevated"), Some("2024-01-01T00:05:00Z"));
        assert_eq!(principal.claims.len(), 2);
        assert_eq!(evaluate(Some(&principal), "Elevated", now), StepUpOutcome::Allowed);
    }

    #[test]
    fn test_mint_claim_keeps_sub_second_expiry() {
        let now = at("2024-01-01T00:00:00.250Z");
        let mut principal = signed_in(&[]);

        let expiry = mint_claim(
            &mut principal,
            "Elevated",
            now,
            core::time::Duration::from_millis(300_500),
        );

        assert_eq!(expiry, at("2024-01-01T00:05:00.750Z"));
        assert_eq!(
            principal.find_first("Elevated").and_then(parse_expiry),
            Some(expiry)
        );
        assert_eq!(
            evaluate(Some(&principal), "Elevated", at("2024-01-01T00:05:00.500Z")),
            StepUpOutcome::Allowed
        );
    }

    #[rstest]
    #[case("/Authorized/ElevatedAuthentication", "/Authorized/ElevatedAuthentication")]
    #[case("/account?tab=keys", "/account?tab=keys")]
    #[case("https://evil.example.com/", "/")]
    #[case("//evil.example.com/", "/")]
    #[case("/\\evil.example.com/", "/")]
    #[case("", "/")]
    fn test_local_return_url(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(local_return_url(input), expected);
    }

    #[test]
    fn test_challenge_location_encodes_query() {
        let location = challenge_location(
            &StepUpOptions::default(),
            "Elevated",
            "/Authorized/ElevatedAuthentication?x=1",
        );

        assert_eq!(
            location,
            "/account/step-up?purpose=Elevated&returnUrl=%2FAuthorized%2FElevatedAuthentication%3Fx%3D1"
        );
    }
}
