use core::net::SocketAddr;

use base64::prelude::*;
pub use mockito;
use mockito::{Matcher, ServerGuard};
use simd_json::json;

/// Secret the mocks expect in the `ApiSecret` header.
pub const MOCK_API_SECRET: &str = "test:secret:a679563b331846c79c20b114a4f56d02";

const PROBLEM_JSON: &str = "application/problem+json";
const ERRORS_URL: &str = "https://docs.passwordless.dev/guide/errors.html";

/// A mockito server answering like the Passwordless API does.
///
/// Every registered mock only matches requests carrying [`MOCK_API_SECRET`].
pub struct PasswordlessMockServer {
    pub api_mock: Vec<mockito::Mock>,
    pub mockito_server: ServerGuard,
}

impl PasswordlessMockServer {
    #[must_use]
    pub async fn new() -> Self {
        let server = mockito::Server::new_async().await;
        Self {
            mockito_server: server,
            api_mock: vec![],
        }
    }

    #[must_use]
    pub fn server_address(&self) -> SocketAddr {
        self.mockito_server.socket_address()
    }

    #[must_use]
    pub fn server_url(&self) -> url::Url {
        self.mockito_server.url().parse().unwrap()
    }

    /// Token returned by [`Self::register_register_token`] for `user_id`.
    #[must_use]
    pub fn register_token_for(user_id: &str) -> String {
        format!("register_{}", BASE64_URL_SAFE_NO_PAD.encode(user_id))
    }

    /// Token returned by [`Self::register_generate_token`] for `user_id`.
    #[must_use]
    pub fn verify_token_for(user_id: &str) -> String {
        format!("verify_{}", BASE64_URL_SAFE_NO_PAD.encode(user_id))
    }

    pub fn register_register_token(&mut self, user_id: &str) -> &mut Self {
        let body = json!({ "token": Self::register_token_for(user_id) });
        let body = simd_json::to_string(&body).unwrap();
        let mock = self
            .mockito_server
            .mock("POST", "/register/token")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_body(Matcher::PartialJsonString(format!(
                r#"{{"userId":"{user_id}"}}"#
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    pub fn register_generate_token(&mut self, user_id: &str) -> &mut Self {
        let body = json!({ "token": Self::verify_token_for(user_id) });
        let body = simd_json::to_string(&body).unwrap();
        let mock = self
            .mockito_server
            .mock("POST", "/signin/generate-token")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_body(Matcher::PartialJsonString(format!(
                r#"{{"userId":"{user_id}"}}"#
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    /// `signin/verify` accepts `token` and answers with a verified user.
    pub fn register_verify(
        &mut self,
        token: &str,
        user_id: &str,
        purpose: Option<&str>,
    ) -> &mut Self {
        let body = json!({
            "success": true,
            "userId": user_id,
            "timestamp": "2024-01-31T10:31:02Z",
            "rpId": "localhost",
            "origin": "https://localhost:7212",
            "device": "Chrome, Windows 10",
            "country": "SE",
            "nickname": null,
            "credentialId": "-_-_AQ",
            "expiresAt": "2024-01-31T10:33:02Z",
            "tokenId": "8b7e2d58-3f8e-4f1d-9a57-1a2b3c4d5e6f",
            "type": "passkey_signin",
            "purpose": purpose
        });
        let body = simd_json::to_string(&body).unwrap();
        let mock = self
            .mockito_server
            .mock("POST", "/signin/verify")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_body(Matcher::JsonString(format!(r#"{{"token":"{token}"}}"#)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    /// `signin/verify` rejects `token` with a `400 invalid_token` problem.
    pub fn register_verify_rejected(&mut self, token: &str) -> &mut Self {
        let mock = self
            .mockito_server
            .mock("POST", "/signin/verify")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_body(Matcher::JsonString(format!(r#"{{"token":"{token}"}}"#)))
            .with_status(400)
            .with_header("content-type", PROBLEM_JSON)
            .with_body(problem_body(400, "The token is not valid.", "invalid_token"))
            .create();
        self.api_mock.push(mock);
        self
    }

    /// Answers `method path` with a problem details document.
    pub fn register_problem(
        &mut self,
        method: &str,
        path: &str,
        status: u16,
        title: &str,
        error_code: &str,
    ) -> &mut Self {
        let mock = self
            .mockito_server
            .mock(method, path)
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_query(Matcher::Any)
            .with_status(status.into())
            .with_header("content-type", PROBLEM_JSON)
            .with_body(problem_body(status, title, error_code))
            .create();
        self.api_mock.push(mock);
        self
    }

    /// Answers `method path` with a plain text error body.
    pub fn register_plain_error(
        &mut self,
        method: &str,
        path: &str,
        status: u16,
        body: &str,
    ) -> &mut Self {
        let mock = self
            .mockito_server
            .mock(method, path)
            .match_query(Matcher::Any)
            .with_status(status.into())
            .with_header("content-type", "text/plain")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    /// `users/list` returns the given users, each with one credential and one alias.
    pub fn register_users(&mut self, user_ids: &[&str]) -> &mut Self {
        let values = user_ids
            .iter()
            .map(|user_id| {
                json!({
                    "userId": *user_id,
                    "aliases": [format!("{user_id}@example.com")],
                    "credentialsCount": 1,
                    "aliasCount": 1,
                    "lastUsedAt": "2024-01-31T10:31:02Z"
                })
            })
            .collect::<Vec<_>>();
        self.register_json("GET", "/users/list", &json!({ "values": values }))
    }

    pub fn register_users_count(&mut self, count: u64) -> &mut Self {
        self.register_json("GET", "/users/count", &json!({ "count": count }))
    }

    pub fn register_aliases(&mut self, user_id: &str, aliases: &[&str]) -> &mut Self {
        let values = aliases
            .iter()
            .map(|alias| {
                json!({
                    "userId": user_id,
                    "alias": BASE64_URL_SAFE_NO_PAD.encode(alias),
                    "plaintext": *alias
                })
            })
            .collect::<Vec<_>>();
        let body = simd_json::to_string(&json!({ "values": values })).unwrap();
        let mock = self
            .mockito_server
            .mock("GET", "/alias/list")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_query(Matcher::UrlEncoded("userid".into(), user_id.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    /// `credentials/list` returns one credential with id `-_-_AQ` for the user.
    pub fn register_credentials(&mut self, user_id: &str) -> &mut Self {
        let body = json!({
            "values": [{
                "descriptor": { "id": "-_-_AQ" },
                "publicKey": "pQECAyYgASFYIA",
                "userHandle": BASE64_URL_SAFE_NO_PAD.encode(user_id),
                "signatureCounter": 3,
                "attestationFmt": "none",
                "createdAt": "2024-01-30T08:00:00Z",
                "aaGuid": "adce0002-35bc-c60a-648b-0b25f1f05503",
                "lastUsedAt": "2024-01-31T10:31:02Z",
                "rpid": "localhost",
                "origin": "https://localhost:7212",
                "country": "SE",
                "device": "Chrome, Windows 10",
                "nickname": "laptop",
                "userId": user_id
            }]
        });
        let body = simd_json::to_string(&body).unwrap();
        let mock = self
            .mockito_server
            .mock("GET", "/credentials/list")
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_query(Matcher::UrlEncoded("userid".into(), user_id.into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }

    /// `events` returns a single page with `total` as the total event count.
    pub fn register_event_log(&mut self, tenant_id: &str, total: u64) -> &mut Self {
        let body = json!({
            "tenantId": tenant_id,
            "events": [{
                "id": "4b0d4e0c-0f3c-4f4e-9e0c-0c4b0d4e0c0f",
                "performedAt": "2024-01-31T10:31:02Z",
                "eventType": "user_sign_in_token_verified",
                "message": "Verified sign in token for user user123.",
                "severity": "Informational",
                "subject": "user123",
                "apiKeyId": "a679"
            }],
            "totalEventCount": total
        });
        self.register_json("GET", "/events", &body)
    }

    /// Accepts `method path` with an empty `204` response.
    pub fn register_no_content(&mut self, method: &str, path: &str) -> &mut Self {
        let mock = self
            .mockito_server
            .mock(method, path)
            .match_header("ApiSecret", MOCK_API_SECRET)
            .with_status(204)
            .create();
        self.api_mock.push(mock);
        self
    }

    fn register_json(
        &mut self,
        method: &str,
        path: &str,
        body: &simd_json::OwnedValue,
    ) -> &mut Self {
        let body = simd_json::to_string(body).unwrap();
        let mock = self
            .mockito_server
            .mock(method, path)
            .match_header("ApiSecret", MOCK_API_SECRET)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create();
        self.api_mock.push(mock);
        self
    }
}

fn problem_body(status: u16, title: &str, error_code: &str) -> String {
    let body = json!({
        "type": format!("{ERRORS_URL}#{error_code}"),
        "title": title,
        "status": status,
        "errorCode": error_code
    });
    simd_json::to_string(&body).unwrap()
}
