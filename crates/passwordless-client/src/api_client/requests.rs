use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::PasswordlessError;
use crate::types;

pub trait PasswordlessRequest {
    /// The successful result type to be returned
    type Res: serde::de::DeserializeOwned + core::fmt::Debug;
    /// The payload that we will send as JSON during the request body
    type Payload: serde::Serialize;

    /// The HTTP method to use. `GET` requests are sent without a body.
    const METHOD: reqwest::Method;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError>;
    /// The payload to send in the request body
    fn payload(&self) -> &Self::Payload;
}

impl PasswordlessRequest for types::RegisterOptions {
    type Res = types::RegisterTokenResponse;
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("register/token").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

impl PasswordlessRequest for types::AuthenticationOptions {
    type Res = types::AuthenticationTokenResponse;
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url
            .join("signin/generate-token")
            .map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

/// Verify a token produced by a sign-in or step-up ceremony.
#[derive(Debug, Clone, Serialize, Deserialize, typed_builder::TypedBuilder)]
pub struct VerifyTokenRequest {
    #[builder(setter(into))]
    pub token: String,
}

impl PasswordlessRequest for VerifyTokenRequest {
    type Res = types::VerifiedUser;
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("signin/verify").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

#[derive(Debug, Clone)]
pub struct ListUsersRequest;

impl PasswordlessRequest for ListUsersRequest {
    type Res = types::ListResponse<types::PasswordlessUserSummary>;
    type Payload = ();

    const METHOD: Method = Method::GET;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("users/list").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        &()
    }
}

#[derive(Debug, Clone)]
pub struct UsersCountRequest;

impl PasswordlessRequest for UsersCountRequest {
    type Res = types::UsersCount;
    type Payload = ();

    const METHOD: Method = Method::GET;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("users/count").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        &()
    }
}

/// Deletes the user together with all of their credentials and aliases.
#[derive(Debug, Clone, Serialize, Deserialize, typed_builder::TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DeleteUserRequest {
    #[builder(setter(into))]
    pub user_id: String,
}

impl PasswordlessRequest for DeleteUserRequest {
    type Res = ();
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("users/delete").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ListAliasesRequest {
    #[builder(setter(into))]
    pub user_id: String,
}

impl PasswordlessRequest for ListAliasesRequest {
    type Res = types::ListResponse<types::AliasPointer>;
    type Payload = ();

    const METHOD: Method = Method::GET;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        let mut url = base_url.join("alias/list").map_err(PasswordlessError::from)?;
        url.query_pairs_mut().append_pair("userid", &self.user_id);
        Ok(url)
    }

    fn payload(&self) -> &Self::Payload {
        &()
    }
}

impl PasswordlessRequest for types::SetAliasRequest {
    type Res = ();
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url.join("alias").map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ListCredentialsRequest {
    #[builder(setter(into))]
    pub user_id: String,
}

impl PasswordlessRequest for ListCredentialsRequest {
    type Res = types::ListResponse<types::Credential>;
    type Payload = ();

    const METHOD: Method = Method::GET;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        let mut url = base_url
            .join("credentials/list")
            .map_err(PasswordlessError::from)?;
        url.query_pairs_mut().append_pair("userid", &self.user_id);
        Ok(url)
    }

    fn payload(&self) -> &Self::Payload {
        &()
    }
}

/// The credential id is the base64url encoding of the raw credential id bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, typed_builder::TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCredentialRequest {
    #[builder(setter(into))]
    pub credential_id: String,
}

impl DeleteCredentialRequest {
    #[must_use]
    pub fn from_bytes(credential_id: &[u8]) -> Self {
        Self {
            credential_id: crate::base64url::encode(credential_id),
        }
    }
}

impl PasswordlessRequest for DeleteCredentialRequest {
    type Res = ();
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url
            .join("credentials/delete")
            .map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

impl PasswordlessRequest for types::GetEventLogRequest {
    type Res = types::GetEventLogResponse;
    type Payload = ();

    const METHOD: Method = Method::GET;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        let mut url = base_url.join("events").map_err(PasswordlessError::from)?;
        url.query_pairs_mut()
            .append_pair("pageNumber", &self.page_number.to_string());
        if let Some(number_of_results) = self.number_of_results {
            url.query_pairs_mut()
                .append_pair("numberOfResults", &number_of_results.to_string());
        }
        Ok(url)
    }

    fn payload(&self) -> &Self::Payload {
        &()
    }
}

impl PasswordlessRequest for types::SendMagicLinkRequest {
    type Res = ();
    type Payload = Self;

    const METHOD: Method = Method::POST;

    fn path(&self, base_url: &Url) -> Result<Url, PasswordlessError> {
        base_url
            .join("magic-links/send")
            .map_err(PasswordlessError::from)
    }

    fn payload(&self) -> &Self::Payload {
        self
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn base() -> Url {
        Url::parse("https://v4.passwordless.dev/").unwrap()
    }

    #[test]
    fn test_list_aliases_query() {
        let request = ListAliasesRequest::builder().user_id("a b&c").build();
        assert_eq!(
            request.path(&base()).unwrap().as_str(),
            "https://v4.passwordless.dev/alias/list?userid=a+b%26c"
        );
    }

    #[test]
    fn test_event_log_query() {
        let request = types::GetEventLogRequest::builder()
            .page_number(2)
            .number_of_results(50)
            .build();
        assert_eq!(
            request.path(&base()).unwrap().as_str(),
            "https://v4.passwordless.dev/events?pageNumber=2&numberOfResults=50"
        );

        let request = types::GetEventLogRequest::builder().build();
        assert_eq!(
            request.path(&base()).unwrap().as_str(),
            "https://v4.passwordless.dev/events?pageNumber=1"
        );
    }

    #[test]
    fn test_paths_are_relative_to_tenant_base() {
        let base = Url::parse("https://passwordless.example.com/tenant-a/").unwrap();
        let url = VerifyTokenRequest::builder()
            .token("verify_x")
            .build()
            .path(&base)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://passwordless.example.com/tenant-a/signin/verify"
        );
    }

    #[test]
    fn test_delete_credential_from_bytes() {
        assert_eq!(
            DeleteCredentialRequest::from_bytes(&[0xfb, 0xff, 0xbf, 0x01]),
            DeleteCredentialRequest::builder().credential_id("-_-_AQ").build()
        );
    }
}
