use alloc::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// Whether the authenticator has to verify the user (PIN, biometrics) during the ceremony.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UserVerification {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

/// Attestation conveyance preference for new credentials.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Attestation {
    #[default]
    None,
    Indirect,
    Direct,
}

/// Which kind of authenticator may be used to create the credential.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum AuthenticatorType {
    #[default]
    Any,
    Platform,
    CrossPlatform,
}

/// Request body for `register/token`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOptions {
    #[builder(setter(into))]
    pub user_id: String,
    #[builder(setter(into))]
    pub username: String,
    #[builder(setter(strip_option, into), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[builder(default)]
    #[serde(default)]
    pub aliases: BTreeSet<String>,
    #[builder(default = true)]
    pub discoverable: bool,
    #[builder(default)]
    pub user_verification: UserVerification,
    #[builder(default)]
    pub attestation: Attestation,
    /// When the register token stops being accepted by the API.
    #[builder(setter(strip_option), default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[builder(default)]
    pub authenticator_type: AuthenticatorType,
    #[builder(default = true)]
    pub alias_hashing: bool,
}

/// Response from `register/token`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RegisterTokenResponse {
    pub token: String,
}

/// Request body for `signin/generate-token`, used to sign users in out of band (magic links,
/// account recovery).
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationOptions {
    #[builder(setter(into))]
    pub user_id: String,
    /// Lifetime of the generated token, sent as whole seconds.
    #[builder(setter(strip_option), default)]
    #[serde(
        with = "duration_seconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub time_to_live: Option<core::time::Duration>,
}

/// Response from `signin/generate-token`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct AuthenticationTokenResponse {
    pub token: String,
}

/// Response from `signin/verify`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub user_id: String,
    #[serde(with = "crate::base64url")]
    pub credential_id: Vec<u8>,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub rp_id: String,
    pub origin: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_id: Uuid,
    #[serde(rename = "type", default)]
    pub token_type: String,
    /// Free form purpose the token was issued for, e.g. `Elevated`.
    #[serde(default)]
    pub purpose: Option<String>,
}

/// Request body for `alias`. Replaces every alias of the user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SetAliasRequest {
    pub user_id: String,
    pub aliases: BTreeSet<String>,
    pub hashing: bool,
}

impl SetAliasRequest {
    /// Blank aliases are dropped.
    #[must_use]
    pub fn new<I, S>(user_id: impl Into<String>, aliases: I, hashing: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let aliases = aliases
            .into_iter()
            .map(Into::into)
            .filter(|alias: &String| !alias.trim().is_empty())
            .collect();
        Self {
            user_id: user_id.into(),
            aliases,
            hashing,
        }
    }

    #[must_use]
    pub fn single(user_id: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(user_id, [alias.into()], true)
    }

    /// Removes every alias of the user.
    #[must_use]
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Vec::<String>::new(), false)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AliasPointer {
    pub user_id: String,
    pub alias: String,
    #[serde(default)]
    pub plaintext: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct CredentialDescriptor {
    #[serde(with = "crate::base64url")]
    pub id: Vec<u8>,
}

/// A passkey registered to a user.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub descriptor: CredentialDescriptor,
    #[serde(with = "crate::base64url")]
    pub public_key: Vec<u8>,
    #[serde(with = "crate::base64url")]
    pub user_handle: Vec<u8>,
    pub signature_counter: u32,
    #[serde(default)]
    pub attestation_fmt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub aa_guid: Uuid,
    pub last_used_at: DateTime<Utc>,
    #[serde(rename = "rpid")]
    pub rp_id: String,
    pub origin: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    pub user_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordlessUserSummary {
    pub user_id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub credentials_count: u32,
    pub alias_count: u32,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct UsersCount {
    pub count: u64,
}

/// Query for the `events` endpoint. Pages start at 1.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GetEventLogRequest {
    #[builder(default = 1)]
    pub page_number: u32,
    #[builder(setter(strip_option), default)]
    pub number_of_results: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GetEventLogResponse {
    pub tenant_id: String,
    pub events: Vec<ApplicationEvent>,
    pub total_event_count: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationEvent {
    pub id: Uuid,
    pub performed_at: DateTime<Utc>,
    pub event_type: String,
    pub message: String,
    pub severity: String,
    pub subject: String,
    pub api_key_id: String,
}

/// Placeholder the API replaces with the generated token inside a magic link url template.
pub const MAGIC_LINK_TOKEN_PLACEHOLDER: &str = "$TOKEN";

/// Request body for `magic-links/send`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct SendMagicLinkRequest {
    #[builder(setter(into))]
    pub email_address: String,
    /// Must contain [`MAGIC_LINK_TOKEN_PLACEHOLDER`].
    #[builder(setter(into))]
    pub url_template: String,
    #[builder(setter(into))]
    pub user_id: String,
    #[builder(setter(strip_option), default)]
    #[serde(
        with = "duration_seconds",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub time_to_live: Option<core::time::Duration>,
}

/// Envelope the list endpoints wrap their results in.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ListResponse<T> {
    pub values: Vec<T>,
}

mod duration_seconds {
    use core::time::Duration;

    use serde::{Deserialize as _, Deserializer, Serializer};

    #[expect(
        clippy::ref_option,
        reason = "signature is dictated by serde's `with` attribute"
    )]
    pub(super) fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(duration) => serializer.serialize_u64(duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_register_options_wire_format() {
        let options = RegisterOptions::builder()
            .user_id("107fb578-9559-4540-a0e2-f82ad78852f7")
            .username("anders@example.com")
            .display_name("Anders")
            .aliases(BTreeSet::from(["anders@example.com".to_owned()]))
            .authenticator_type(AuthenticatorType::CrossPlatform)
            .build();

        let json = simd_json::to_string(&options).unwrap();

        assert_eq!(
            json,
            r#"{"userId":"107fb578-9559-4540-a0e2-f82ad78852f7","username":"anders@example.com","displayName":"Anders","aliases":["anders@example.com"],"discoverable":true,"userVerification":"preferred","attestation":"none","authenticatorType":"cross-platform","aliasHashing":true}"#
        );
    }

    #[test]
    fn test_authentication_options_ttl_in_seconds() {
        let options = AuthenticationOptions::builder()
            .user_id("user123")
            .time_to_live(core::time::Duration::from_secs(3600))
            .build();
        assert_eq!(
            simd_json::to_string(&options).unwrap(),
            r#"{"userId":"user123","timeToLive":3600}"#
        );

        let options = AuthenticationOptions::builder().user_id("user123").build();
        assert_eq!(
            simd_json::to_string(&options).unwrap(),
            r#"{"userId":"user123"}"#
        );
    }

    #[test]
    fn test_set_alias_request_drops_blank_aliases() {
        let request = SetAliasRequest::new("user", ["bob", "  ", "", "robert"], true);
        assert_eq!(
            request.aliases,
            BTreeSet::from(["bob".to_owned(), "robert".to_owned()])
        );

        let request = SetAliasRequest::empty("user");
        assert!(request.aliases.is_empty());
        assert!(!request.hashing);
    }

    #[test]
    fn test_verified_user_from_api_json() {
        let mut body = br#"{
            "success": true,
            "userId": "user123",
            "timestamp": "2024-01-31T10:31:02.1234567Z",
            "rpId": "localhost",
            "origin": "https://localhost:7212",
            "device": "Chrome, Windows 10",
            "country": "SE",
            "nickname": null,
            "credentialId": "-_-_AQ",
            "expiresAt": "2024-01-31T10:33:02Z",
            "tokenId": "8b7e2d58-3f8e-4f1d-9a57-1a2b3c4d5e6f",
            "type": "passkey_signin",
            "purpose": "Elevated"
        }"#
        .to_vec();
        let user = simd_json::from_slice::<VerifiedUser>(&mut body).unwrap();

        assert!(user.success);
        assert_eq!(user.user_id, "user123");
        assert_eq!(user.credential_id, vec![0xfb, 0xff, 0xbf, 0x01]);
        assert_eq!(user.nickname, None);
        assert_eq!(user.token_type, "passkey_signin");
        assert_eq!(user.purpose.as_deref(), Some("Elevated"));
    }
}
