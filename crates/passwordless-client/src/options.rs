use serde::Deserialize;
use url::Url;

use crate::error::PasswordlessError;

/// Passwordless cloud url.
pub const CLOUD_API_URL: &str = "https://v4.passwordless.dev";

pub const ENV_API_URL: &str = "PASSWORDLESS_API_URL";
pub const ENV_API_SECRET: &str = "PASSWORDLESS_API_SECRET";
pub const ENV_API_KEY: &str = "PASSWORDLESS_API_KEY";

/// Everything needed to talk to the Passwordless backend API.
///
/// The secret is only checked when a request is built, so constructing options (and clients from
/// them) never fails because of a missing secret.
#[derive(Clone, Debug, Deserialize, typed_builder::TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct PasswordlessOptions {
    /// Defaults to [`CLOUD_API_URL`].
    #[serde(default = "default_api_url", alias = "ApiUrl")]
    #[builder(default = default_api_url())]
    pub api_url: Url,
    /// Secret key used to authenticate against the backend API.
    #[serde(default = "empty_secret", alias = "ApiSecret")]
    #[builder(setter(transform = |secret: &str| redact::Secret::new(secret.to_owned())))]
    pub api_secret: redact::Secret<String>,
    /// Public key, only handed to frontend code.
    #[serde(default, alias = "ApiKey")]
    #[builder(default, setter(strip_option, into))]
    pub api_key: Option<String>,
}

#[expect(clippy::expect_used, reason = "the cloud url is a constant")]
fn default_api_url() -> Url {
    Url::parse(CLOUD_API_URL).expect("cloud api url is a valid url")
}

fn empty_secret() -> redact::Secret<String> {
    redact::Secret::new(String::new())
}

impl PasswordlessOptions {
    /// Reads `PASSWORDLESS_API_URL`, `PASSWORDLESS_API_SECRET` and `PASSWORDLESS_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns an error if `PASSWORDLESS_API_URL` is set but is not a valid url.
    pub fn from_env() -> Result<Self, PasswordlessError> {
        let api_url = match std::env::var(ENV_API_URL) {
            Ok(url) if !url.trim().is_empty() => Url::parse(url.trim())?,
            _ => default_api_url(),
        };
        let api_secret = std::env::var(ENV_API_SECRET).unwrap_or_default();
        let api_key = std::env::var(ENV_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty());

        Ok(Self {
            api_url,
            api_secret: redact::Secret::new(api_secret),
            api_key,
        })
    }

    /// Returns the secret, or [`PasswordlessError::MissingApiSecret`] if it is blank.
    ///
    /// # Errors
    ///
    /// When no secret has been configured.
    pub fn api_secret(&self) -> Result<&str, PasswordlessError> {
        let secret = self.api_secret.expose_secret().as_str();
        if secret.trim().is_empty() {
            return Err(PasswordlessError::MissingApiSecret);
        }
        Ok(secret)
    }

    /// The api url with a trailing slash, so relative endpoint paths can be joined onto it.
    #[must_use]
    pub fn base_url(&self) -> Url {
        let mut url = self.api_url.clone();
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        url
    }

    /// `***` followed by the last four characters of the secret, for logs and debug output.
    #[must_use]
    pub fn masked_secret(&self) -> String {
        let secret = self.api_secret.expose_secret();
        if secret.is_empty() {
            return "(null)".to_owned();
        }
        if secret.chars().count() <= 5 {
            return "***".to_owned();
        }
        let tail_start = secret
            .char_indices()
            .rev()
            .nth(3)
            .map_or(0, |(idx, _)| idx);
        format!("***{}", secret.get(tail_start..).unwrap_or_default())
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_builder_defaults_to_cloud_url() {
        let options = PasswordlessOptions::builder()
            .api_secret("test:secret:a679563b331846c79c20b114a4f56d02")
            .build();

        assert_eq!(options.api_url.as_str(), "https://v4.passwordless.dev/");
        assert_eq!(options.api_key, None);
        assert_eq!(
            options.api_secret().unwrap(),
            "test:secret:a679563b331846c79c20b114a4f56d02"
        );
    }

    #[test]
    fn test_missing_secret_is_only_reported_on_use() {
        let options = PasswordlessOptions::builder().api_secret("").build();

        assert_matches!(options.api_secret(), Err(PasswordlessError::MissingApiSecret));
    }

    #[test]
    fn test_deserialize_config_section() {
        let mut section = br#"{
            "ApiUrl": "https://passwordless.example.com/tenant",
            "ApiSecret": "demo:secret:1234",
            "ApiKey": "demo:public:1234"
        }"#
        .to_vec();
        let options = simd_json::from_slice::<PasswordlessOptions>(&mut section).unwrap();

        assert_eq!(options.api_secret().unwrap(), "demo:secret:1234");
        assert_eq!(options.api_key.as_deref(), Some("demo:public:1234"));
        assert_eq!(
            options.base_url().as_str(),
            "https://passwordless.example.com/tenant/"
        );
    }

    #[test]
    fn test_deserialize_empty_section() {
        let mut section = b"{}".to_vec();
        let options = simd_json::from_slice::<PasswordlessOptions>(&mut section).unwrap();

        assert_eq!(options.api_url.as_str(), "https://v4.passwordless.dev/");
        assert_matches!(options.api_secret(), Err(PasswordlessError::MissingApiSecret));
    }

    #[test]
    fn test_masked_secret() {
        let options = PasswordlessOptions::builder()
            .api_secret("demo:secret:abcd1234")
            .build();
        assert_eq!(options.masked_secret(), "***1234");

        let options = PasswordlessOptions::builder().api_secret("").build();
        assert_eq!(options.masked_secret(), "(null)");
    }
}
