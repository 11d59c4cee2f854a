use core::time::Duration;

use rp_passwordless_client::types::{Attestation, AuthenticatorType, UserVerification};

/// Claim type the user id is stored under unless configured otherwise.
pub const DEFAULT_USER_ID_CLAIM_TYPE: &str = "sub";

/// How the integration looks up users and fills in register options.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct PasswordlessIntegrationOptions {
    /// Claim type holding the user id on the signed-in principal.
    #[builder(default = DEFAULT_USER_ID_CLAIM_TYPE.to_owned(), setter(into))]
    pub user_id_claim_type: String,
    /// When set, registration requires an email which is also used as a passkey alias.
    #[builder(default)]
    pub require_unique_email: bool,
    #[builder(default)]
    pub register: RegisterDefaults,
    #[builder(default)]
    pub step_up: StepUpOptions,
}

impl Default for PasswordlessIntegrationOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Defaults copied into every register token request.
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct RegisterDefaults {
    #[builder(default = true)]
    pub discoverable: bool,
    #[builder(default)]
    pub user_verification: UserVerification,
    #[builder(default)]
    pub attestation: Attestation,
    /// How long an issued register token stays valid.
    #[builder(default = Duration::from_secs(120))]
    pub expiration: Duration,
    #[builder(default)]
    pub authenticator_type: AuthenticatorType,
    #[builder(default = true)]
    pub alias_hashing: bool,
}

impl Default for RegisterDefaults {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct StepUpOptions {
    /// Lifetime of a step-up claim.
    #[builder(default = Duration::from_secs(5 * 60))]
    pub ttl: Duration,
    /// Where unauthenticated users are sent.
    #[builder(default = "/account/login".to_owned(), setter(into))]
    pub login_path: String,
    /// Page that runs the step-up ceremony.
    #[builder(default = "/account/step-up".to_owned(), setter(into))]
    pub challenge_path: String,
}

impl Default for StepUpOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Routes mounted by [`crate::passwordless_router`].
#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct PasswordlessEndpointOptions {
    #[builder(default = "/passwordless-api".to_owned(), setter(into))]
    pub group_prefix: String,
    #[builder(default)]
    pub enable_register_endpoint: bool,
    #[builder(default = "/register".to_owned(), setter(into))]
    pub register_path: String,
    #[builder(default = "/login".to_owned(), setter(into))]
    pub login_path: String,
    #[builder(default = "/add-credential".to_owned(), setter(into))]
    pub add_credential_path: String,
    #[builder(default = "/step-up".to_owned(), setter(into))]
    pub step_up_path: String,
    #[builder(default = "/logout".to_owned(), setter(into))]
    pub logout_path: String,
    /// `GET` target of magic links, signs the user in from `?token=`.
    #[builder(default = "/magic".to_owned(), setter(into))]
    pub magic_path: String,
}

impl Default for PasswordlessEndpointOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl PasswordlessEndpointOptions {
    /// `path` under [`Self::group_prefix`], e.g. the url to build magic links for.
    #[must_use]
    pub fn route(&self, path: &str) -> String {
        format!("{}{path}", self.group_prefix.trim_end_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let options = PasswordlessIntegrationOptions::default();

        assert_eq!(options.user_id_claim_type, "sub");
        assert!(!options.require_unique_email);
        assert!(options.register.discoverable);
        assert!(options.register.alias_hashing);
        assert_eq!(options.register.expiration, Duration::from_secs(120));
        assert_eq!(options.register.user_verification, UserVerification::Preferred);
        assert_eq!(options.step_up.ttl, Duration::from_secs(300));
        assert_eq!(options.step_up.challenge_path, "/account/step-up");
    }

    #[test]
    fn test_routes_join_prefix() {
        let endpoints = PasswordlessEndpointOptions::default();
        assert_eq!(endpoints.route(&endpoints.login_path), "/passwordless-api/login");

        let endpoints = PasswordlessEndpointOptions::builder()
            .group_prefix("/auth/")
            .build();
        assert_eq!(endpoints.route(&endpoints.step_up_path), "/auth/step-up");
        assert_eq!(endpoints.route(&endpoints.magic_path), "/auth/magic");
    }
}
