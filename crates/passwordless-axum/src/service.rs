use alloc::collections::BTreeSet;
use alloc::sync::Arc;
use std::sync::{PoisonError, RwLock};

use chrono::TimeDelta;
use rp_passwordless_client::PasswordlessClient;
use rp_passwordless_client::types::{
    MAGIC_LINK_TOKEN_PLACEHOLDER, RegisterOptions, RegisterTokenResponse, SendMagicLinkRequest,
};
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use url::Url;

use crate::clock::{Clock, SystemClock};
use crate::customize::{CustomizeRegisterOptions, CustomizeRegisterOptionsContext};
use crate::error::IntegrationError;
use crate::options::PasswordlessIntegrationOptions;
use crate::principal::{Claim, ClaimsPrincipal, EMAIL_CLAIM_TYPE, NAME_CLAIM_TYPE};
use crate::step_up::{self, RequireStepUp, StepUpRequest};
use crate::store::{PasswordlessRegisterRequest, UserStore};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PasswordlessLoginRequest {
    pub token: String,
}

/// Query string of a magic link, `?token=...&returnUrl=...`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagicLinkQuery {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub return_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordlessAddCredentialRequest {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// What ends up in the register options besides the user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInformation {
    pub username: String,
    pub display_name: Option<String>,
    pub aliases: BTreeSet<String>,
}

/// Registration, sign-in and step-up flows on top of a [`UserStore`].
pub struct PasswordlessService<S, C> {
    client: PasswordlessClient,
    store: Arc<S>,
    customize: Arc<C>,
    options: Arc<PasswordlessIntegrationOptions>,
    clock: Arc<dyn Clock>,
    /// Purposes guarded through [`Self::require_step_up`]; only these can be stepped up to.
    purposes: Arc<RwLock<BTreeSet<String>>>,
}

impl<S, C> Clone for PasswordlessService<S, C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            store: Arc::clone(&self.store),
            customize: Arc::clone(&self.customize),
            options: Arc::clone(&self.options),
            clock: Arc::clone(&self.clock),
            purposes: Arc::clone(&self.purposes),
        }
    }
}

impl<S, C> core::fmt::Debug for PasswordlessService<S, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordlessService")
            .field("client", &self.client)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<S, C> PasswordlessService<S, C>
where
    S: UserStore,
    C: CustomizeRegisterOptions,
{
    #[must_use]
    pub fn new(
        client: PasswordlessClient,
        store: S,
        customize: C,
        options: PasswordlessIntegrationOptions,
    ) -> Self {
        Self {
            client,
            store: Arc::new(store),
            customize: Arc::new(customize),
            options: Arc::new(options),
            clock: Arc::new(SystemClock),
            purposes: Arc::default(),
        }
    }

    /// Replaces the system clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn client(&self) -> &PasswordlessClient {
        &self.client
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn options(&self) -> &PasswordlessIntegrationOptions {
        &self.options
    }

    /// Middleware state guarding routes with `purpose`, sharing this service's clock and options.
    ///
    /// Also registers `purpose` with the step-up endpoint, which refuses any purpose that no
    /// route requires.
    #[must_use]
    pub fn require_step_up(&self, purpose: &str) -> RequireStepUp {
        self.purposes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purpose.to_owned());
        RequireStepUp::new(
            purpose,
            self.options.step_up.clone(),
            Arc::clone(&self.clock),
        )
    }

    /// Creates the user and a register token for their first passkey.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Validation`] if the user store rejects the user, or no email was
    ///   given while unique emails are required
    /// - [`IntegrationError::Unauthorized`] if the customizer cancelled the registration
    /// - [`IntegrationError::Api`] if the Passwordless API refused to issue a token
    #[instrument(skip_all, fields(username = %request.username), err)]
    pub async fn register_user(
        &self,
        request: PasswordlessRegisterRequest,
    ) -> Result<RegisterTokenResponse, IntegrationError> {
        let email = request
            .email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty());
        if self.options.require_unique_email && email.is_none() {
            return Err(IntegrationError::validation(
                "invalid_email",
                "Email cannot be null or empty.",
            ));
        }

        let user = self.store.create(&request).await?;
        let user_id = self.store.user_id(&user);
        tracing::debug!(user_id = %user_id, "Registering user");

        let mut aliases = request.aliases.clone().unwrap_or_default();
        if let Some(email) = email {
            if self.options.require_unique_email {
                aliases.insert(email.to_owned());
            } else {
                tracing::warn!(
                    user_id = %user_id,
                    "An email was provided but unique emails are not required, it will not be used as an alias"
                );
            }
        }

        let options = self.create_register_options(
            user_id,
            UserInformation {
                username: request.username,
                display_name: request.display_name,
                aliases,
            },
        );
        let options = self
            .customize(true, options)
            .await
            .ok_or(IntegrationError::Unauthorized)?;

        Ok(self.client.create_register_token(&options).await?)
    }

    /// Verifies the sign-in token and stores the matching user's principal in the session.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Api`] if the token was rejected
    /// - [`IntegrationError::Unauthorized`] if the verified user is unknown to the store
    #[instrument(skip_all, err)]
    pub async fn login_user(
        &self,
        request: &PasswordlessLoginRequest,
        session: &Session,
    ) -> Result<ClaimsPrincipal, IntegrationError> {
        let verified = self
            .client
            .verify_authentication_token(&request.token)
            .await?;

        tracing::debug!(user_id = %verified.user_id, "Attempting to find user in store");
        let Some(user) = self.store.find_by_id(&verified.user_id).await? else {
            tracing::debug!("Could not find user");
            return Err(IntegrationError::Unauthorized);
        };

        let principal = self.create_principal(&user);
        tracing::info!(
            user_id = %verified.user_id,
            claims = principal.claims.len(),
            "Signing in user"
        );
        session.cycle_id().await?;
        principal.store(session).await?;
        Ok(principal)
    }

    /// Signs in with the token of a magic link and returns the local url to continue to.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Validation`] if the link carries no token
    /// - the errors of [`Self::login_user`]
    #[instrument(skip_all, err)]
    pub async fn magic_link_login(
        &self,
        query: &MagicLinkQuery,
        session: &Session,
    ) -> Result<String, IntegrationError> {
        let token = query.token.trim();
        if token.is_empty() {
            return Err(IntegrationError::validation(
                "invalid_token",
                "Token cannot be null or empty.",
            ));
        }

        let request = PasswordlessLoginRequest {
            token: token.to_owned(),
        };
        self.login_user(&request, session).await?;
        Ok(step_up::local_return_url(&query.return_url).to_owned())
    }

    /// Emails the owner of `email` a magic link to `magic_url` (the endpoint serving
    /// [`Self::magic_link_login`]); the API substitutes the sign-in token into it.
    ///
    /// Unknown addresses are ignored so the outcome does not reveal which emails have accounts.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Validation`] if `email` is blank
    /// - [`IntegrationError::Api`] if the Passwordless API refused to send the link
    #[instrument(skip_all, err)]
    pub async fn send_recovery_link(
        &self,
        email: &str,
        magic_url: &Url,
    ) -> Result<(), IntegrationError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(IntegrationError::validation(
                "invalid_email",
                "Email cannot be null or empty.",
            ));
        }

        let Some(user) = self.store.find_by_email(email).await? else {
            tracing::debug!("No user for recovery email");
            return Ok(());
        };
        let user_id = self.store.user_id(&user);

        let mut url = magic_url.clone();
        url.query_pairs_mut().append_pair("token", "");
        let request = SendMagicLinkRequest::builder()
            .email_address(email)
            .url_template(format!("{url}{MAGIC_LINK_TOKEN_PLACEHOLDER}"))
            .user_id(user_id.as_str())
            .build();
        self.client.send_magic_link(&request).await?;
        tracing::info!(user_id = %user_id, "Sent recovery magic link");
        Ok(())
    }

    /// Creates a register token for an additional passkey of the signed-in user.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Unauthorized`] if nobody is signed in, the user no longer exists,
    ///   or the customizer cancelled
    /// - [`IntegrationError::Api`] if the Passwordless API refused to issue a token
    #[instrument(skip_all, err)]
    pub async fn add_credential(
        &self,
        request: PasswordlessAddCredentialRequest,
        principal: Option<&ClaimsPrincipal>,
    ) -> Result<RegisterTokenResponse, IntegrationError> {
        let user_id = self
            .user_id(principal)
            .ok_or(IntegrationError::Unauthorized)?;

        let Some(user) = self.store.find_by_id(&user_id).await? else {
            tracing::debug!(user_id = %user_id, "Could not find user while adding a credential");
            return Err(IntegrationError::Unauthorized);
        };
        tracing::info!(user_id = %user_id, "Found user while adding a credential");

        let username = self.store.username(&user);
        if username.trim().is_empty() {
            return Err(IntegrationError::Unauthorized);
        }

        let mut aliases = BTreeSet::new();
        if self.options.require_unique_email {
            let email = self
                .store
                .email(&user)
                .filter(|email| !email.trim().is_empty())
                .ok_or(IntegrationError::Unauthorized)?;
            aliases.insert(email);
        }

        let options = self.create_register_options(
            user_id,
            UserInformation {
                username,
                display_name: request.display_name,
                aliases,
            },
        );
        let options = self
            .customize(false, options)
            .await
            .ok_or(IntegrationError::Unauthorized)?;

        let token = self.client.create_register_token(&options).await?;
        tracing::debug!(user_id = %options.user_id, "Created a register token");
        Ok(token)
    }

    /// Verifies a step-up token and grants its purpose for the configured ttl.
    ///
    /// Returns the local url the browser should be sent back to.
    ///
    /// # Errors
    ///
    /// - [`IntegrationError::Unauthorized`] if nobody is signed in
    /// - [`IntegrationError::Forbidden`] if the token belongs to another user or was issued for
    ///   another purpose
    /// - [`IntegrationError::Api`] if the token was rejected
    #[instrument(skip_all, fields(purpose = %request.purpose), err)]
    pub async fn step_up(
        &self,
        request: &StepUpRequest,
        session: &Session,
    ) -> Result<String, IntegrationError> {
        let mut principal = ClaimsPrincipal::from_session(session)
            .await?
            .ok_or(IntegrationError::Unauthorized)?;
        let user_id = self
            .user_id(Some(&principal))
            .ok_or(IntegrationError::Unauthorized)?;

        let purpose = request.purpose.trim();
        if purpose.is_empty() {
            return Err(IntegrationError::validation(
                "invalid_purpose",
                "Purpose cannot be null or empty.",
            ));
        }
        if !self.is_step_up_purpose(purpose) {
            tracing::warn!(purpose, "Refusing step-up for an unknown purpose");
            return Err(IntegrationError::validation(
                "invalid_purpose",
                "Purpose is not a step-up purpose.",
            ));
        }

        let verified = self
            .client
            .verify_authentication_token(&request.step_up_token)
            .await?;
        if verified.user_id != user_id {
            tracing::warn!(
                user_id = %user_id,
                verified_user_id = %verified.user_id,
                "Step-up token belongs to another user"
            );
            return Err(IntegrationError::Forbidden("token was issued to another user"));
        }
        if let Some(token_purpose) = verified.purpose.as_deref().filter(|p| !p.is_empty()) {
            if token_purpose != purpose {
                tracing::warn!(token_purpose, "Step-up token was issued for another purpose");
                return Err(IntegrationError::Forbidden("token was issued for another purpose"));
            }
        }

        let expiry = step_up::mint_claim(
            &mut principal,
            purpose,
            self.clock.now(),
            self.options.step_up.ttl,
        );
        session.cycle_id().await?;
        principal.store(session).await?;
        tracing::info!(user_id = %user_id, %expiry, "Stepped up");

        Ok(step_up::local_return_url(&request.return_url).to_owned())
    }

    /// Builds register options from the configured defaults.
    #[must_use]
    pub fn create_register_options(
        &self,
        user_id: String,
        information: UserInformation,
    ) -> RegisterOptions {
        let defaults = &self.options.register;
        let expiration = TimeDelta::from_std(defaults.expiration).unwrap_or(TimeDelta::MAX);
        let mut options = RegisterOptions::builder()
            .user_id(user_id)
            .username(information.username)
            .aliases(information.aliases)
            .discoverable(defaults.discoverable)
            .user_verification(defaults.user_verification)
            .attestation(defaults.attestation)
            .authenticator_type(defaults.authenticator_type)
            .alias_hashing(defaults.alias_hashing)
            .build();
        options.display_name = information.display_name;
        options.expires_at = self.clock.now().checked_add_signed(expiration);
        options
    }

    /// Identity claims are never step-up purposes, even when a route names one.
    fn is_step_up_purpose(&self, purpose: &str) -> bool {
        let reserved = [
            self.options.user_id_claim_type.as_str(),
            NAME_CLAIM_TYPE,
            EMAIL_CLAIM_TYPE,
        ];
        !reserved.contains(&purpose) &&
            self.purposes
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(purpose)
    }

    fn user_id(&self, principal: Option<&ClaimsPrincipal>) -> Option<String> {
        principal?
            .find_first(&self.options.user_id_claim_type)
            .filter(|user_id| !user_id.is_empty())
            .map(str::to_owned)
    }

    fn create_principal(&self, user: &S::User) -> ClaimsPrincipal {
        let mut principal = ClaimsPrincipal::new(vec![
            Claim::new(
                self.options.user_id_claim_type.as_str(),
                self.store.user_id(user),
            ),
            Claim::new(NAME_CLAIM_TYPE, self.store.username(user)),
        ]);
        if let Some(email) = self.store.email(user) {
            principal.add_claim(Claim::new(EMAIL_CLAIM_TYPE, email));
        }
        principal
    }

    async fn customize(&self, new_user: bool, options: RegisterOptions) -> Option<RegisterOptions> {
        let mut context = CustomizeRegisterOptionsContext {
            new_user,
            options: Some(options),
        };
        self.customize.customize(&mut context).await;
        context.options
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use rp_passwordless_client::PasswordlessOptions;

    use super::*;
    use crate::customize::NoopCustomizeRegisterOptions;
    use crate::store::memory::InMemoryUserStore;

    fn service(
        options: PasswordlessIntegrationOptions,
    ) -> PasswordlessService<InMemoryUserStore, NoopCustomizeRegisterOptions> {
        let client = PasswordlessClient::new(
            PasswordlessOptions::builder()
                .api_secret("test:secret:0000")
                .build(),
        )
        .unwrap();
        PasswordlessService::new(
            client,
            InMemoryUserStore::new(),
            NoopCustomizeRegisterOptions,
            options,
        )
    }

    #[test]
    fn test_step_up_purposes_come_from_guarded_routes() {
        let service = service(PasswordlessIntegrationOptions::default());
        assert!(!service.is_step_up_purpose("Elevated"));

        let _requirement = service.clone().require_step_up("Elevated");

        assert!(service.is_step_up_purpose("Elevated"));
        assert!(!service.is_step_up_purpose("elevated"));
    }

    #[test]
    fn test_identity_claims_are_never_purposes() {
        let options = PasswordlessIntegrationOptions::builder()
            .user_id_claim_type("user_id")
            .build();
        let service = service(options);
        for claim in ["user_id", NAME_CLAIM_TYPE, EMAIL_CLAIM_TYPE] {
            let _requirement = service.require_step_up(claim);
            assert!(!service.is_step_up_purpose(claim), "{claim}");
        }
    }
}
