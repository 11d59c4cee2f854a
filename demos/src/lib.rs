use std::collections::BTreeMap;

use rp_passwordless_client::{PasswordlessClient, PasswordlessOptions};
use serde::Deserialize;
use url::Url;

/// Env var holding the tenant map as JSON, e.g.
/// `{"tenants":{"gameofthrones":{"apiSecret":"..."}}}`.
pub const ENV_TENANTS: &str = "PASSWORDLESS_TENANTS";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfiguration {
    pub api_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MultiTenancyConfiguration {
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantConfiguration>,
}

impl MultiTenancyConfiguration {
    /// Parses [`ENV_TENANTS`].
    ///
    /// # Errors
    /// - the variable is missing or not valid JSON
    pub fn from_env() -> eyre::Result<Self> {
        let raw = std::env::var(ENV_TENANTS)
            .map_err(|err| eyre::eyre!("{ENV_TENANTS} is not set: {err}"))?;
        Self::from_json(raw)
    }

    /// # Errors
    /// - `raw` is not a valid tenant map
    pub fn from_json(raw: String) -> eyre::Result<Self> {
        let mut raw = raw.into_bytes();
        Ok(simd_json::from_slice(&mut raw)?)
    }
}

/// Builds a [`PasswordlessClient`] for one tenant out of the shared configuration.
#[derive(Debug, Clone)]
pub struct PasswordlessClientBuilder<'a> {
    configuration: &'a MultiTenancyConfiguration,
    api_url: Option<Url>,
    api_secret: String,
}

impl<'a> PasswordlessClientBuilder<'a> {
    #[must_use]
    pub const fn new(configuration: &'a MultiTenancyConfiguration) -> Self {
        Self {
            configuration,
            api_url: None,
            api_secret: String::new(),
        }
    }

    #[must_use]
    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.api_url = Some(api_url);
        self
    }

    /// # Errors
    /// - the tenant is not configured
    pub fn with_tenant(mut self, tenant: &str) -> eyre::Result<Self> {
        let tenant_configuration = self
            .configuration
            .tenants
            .get(tenant)
            .ok_or_else(|| eyre::eyre!("unknown tenant `{tenant}`"))?;
        self.api_secret.clone_from(&tenant_configuration.api_secret);
        Ok(self)
    }

    /// # Errors
    /// - the http client cannot be constructed
    pub fn build(self) -> eyre::Result<PasswordlessClient> {
        let options = match self.api_url {
            Some(api_url) => PasswordlessOptions::builder()
                .api_url(api_url)
                .api_secret(&self.api_secret)
                .build(),
            None => PasswordlessOptions::builder()
                .api_secret(&self.api_secret)
                .build(),
        };
        Ok(PasswordlessClient::new(options)?)
    }
}

/// `gameofthrones.example.com:8080` resolves to the `gameofthrones` tenant.
#[must_use]
pub fn tenant_from_host(host: &str) -> &str {
    host.split(['.', ':']).next().unwrap_or_default()
}
