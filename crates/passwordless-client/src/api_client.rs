pub mod requests;
use alloc::sync::Arc;
use core::fmt;
use core::marker::PhantomData;

use requests::PasswordlessRequest;
use reqwest::{Method, header};
use tracing::instrument;
use url::Url;

use crate::API_SECRET_HEADER;
use crate::error::PasswordlessError;
use crate::options::PasswordlessOptions;
use crate::transport::ProblemDetailsTransport;
use crate::types::{
    AliasPointer, AuthenticationOptions, AuthenticationTokenResponse, Credential,
    GetEventLogRequest, GetEventLogResponse, PasswordlessUserSummary, RegisterOptions,
    RegisterTokenResponse, SendMagicLinkRequest, SetAliasRequest, UsersCount, VerifiedUser,
};

/// Client for the Passwordless backend API.
///
/// Cheap to clone: clones share the underlying connection pool and options.
#[derive(Clone)]
pub struct PasswordlessClient {
    transport: ProblemDetailsTransport,
    options: Arc<PasswordlessOptions>,
    base_url: Url,
}

impl PasswordlessClient {
    /// Creates a client with its own HTTP connection pool.
    ///
    /// The api secret is not validated here; the first request will fail with
    /// [`PasswordlessError::MissingApiSecret`] if it is blank.
    ///
    /// # Errors
    ///
    /// If the HTTP client cannot be initialized.
    pub fn new(options: PasswordlessOptions) -> Result<Self, PasswordlessError> {
        Ok(Self::with_http_client(http_client()?, options))
    }

    /// Creates a client on top of an externally managed [`reqwest::Client`].
    #[must_use]
    pub fn with_http_client(client: reqwest::Client, options: PasswordlessOptions) -> Self {
        let base_url = options.base_url();
        Self {
            transport: ProblemDetailsTransport::new(client),
            options: Arc::new(options),
            base_url,
        }
    }

    #[must_use]
    pub fn options(&self) -> &PasswordlessOptions {
        &self.options
    }

    /// Prepares a request with the `ApiSecret`, `Accept` and `Content-Type` headers set.
    ///
    /// # Errors
    ///
    /// [`PasswordlessError::MissingApiSecret`] if no secret is configured; nothing is sent then.
    #[instrument(name = "build_request", skip(self, request))]
    pub fn build_request<T>(&self, request: &T) -> Result<Request<T::Res>, PasswordlessError>
    where
        T: PasswordlessRequest,
    {
        let mut api_secret = header::HeaderValue::from_str(self.options.api_secret()?)?;
        api_secret.set_sensitive(true);

        let endpoint = request.path(&self.base_url)?;
        let mut request_builder = self
            .transport
            .client()
            .request(T::METHOD, endpoint)
            .header(API_SECRET_HEADER, api_secret)
            .header(
                header::ACCEPT,
                header::HeaderValue::from_static("application/json"),
            );
        if T::METHOD != Method::GET {
            let payload = simd_json::to_vec(request.payload())?;
            request_builder = request_builder
                .header(
                    header::CONTENT_TYPE,
                    header::HeaderValue::from_static("application/json"),
                )
                .body(payload);
        }

        Ok(Request {
            request: request_builder,
            transport: self.transport.clone(),
            translate_problems: true,
            result: PhantomData,
        })
    }

    /// Creates a register token that the frontend uses to create a passkey.
    #[instrument(skip_all, fields(user_id = %options.user_id), err)]
    pub async fn create_register_token(
        &self,
        options: &RegisterOptions,
    ) -> Result<RegisterTokenResponse, PasswordlessError> {
        self.build_request(options)?.execute().await?.json().await
    }

    /// Generates a sign-in token without a WebAuthn ceremony, e.g. for magic links.
    #[instrument(skip_all, fields(user_id = %options.user_id), err)]
    pub async fn generate_authentication_token(
        &self,
        options: &AuthenticationOptions,
    ) -> Result<AuthenticationTokenResponse, PasswordlessError> {
        self.build_request(options)?.execute().await?.json().await
    }

    /// Verifies a sign-in token. A rejected token is always an error, never a partial result.
    #[instrument(skip_all, err)]
    pub async fn verify_authentication_token(
        &self,
        token: &str,
    ) -> Result<VerifiedUser, PasswordlessError> {
        let request = requests::VerifyTokenRequest::builder().token(token).build();
        self.build_request(&request)?.execute().await?.json().await
    }

    #[instrument(skip_all, err)]
    pub async fn list_users(&self) -> Result<Vec<PasswordlessUserSummary>, PasswordlessError> {
        let response = self
            .build_request(&requests::ListUsersRequest)?
            .execute()
            .await?
            .json()
            .await?;
        Ok(response.values)
    }

    #[instrument(skip_all, err)]
    pub async fn get_users_count(&self) -> Result<UsersCount, PasswordlessError> {
        self.build_request(&requests::UsersCountRequest)?
            .execute()
            .await?
            .json()
            .await
    }

    #[instrument(skip(self), err)]
    pub async fn delete_user(&self, user_id: &str) -> Result<(), PasswordlessError> {
        let request = requests::DeleteUserRequest::builder()
            .user_id(user_id)
            .build();
        self.build_request(&request)?.execute().await?.ok().await
    }

    #[instrument(skip(self), err)]
    pub async fn list_aliases(
        &self,
        user_id: &str,
    ) -> Result<Vec<AliasPointer>, PasswordlessError> {
        let request = requests::ListAliasesRequest::builder()
            .user_id(user_id)
            .build();
        let response = self.build_request(&request)?.execute().await?.json().await?;
        Ok(response.values)
    }

    /// Replaces all aliases of a user.
    #[instrument(skip_all, fields(user_id = %request.user_id), err)]
    pub async fn set_alias(&self, request: &SetAliasRequest) -> Result<(), PasswordlessError> {
        self.build_request(request)?.execute().await?.ok().await
    }

    #[instrument(skip(self), err)]
    pub async fn list_credentials(
        &self,
        user_id: &str,
    ) -> Result<Vec<Credential>, PasswordlessError> {
        let request = requests::ListCredentialsRequest::builder()
            .user_id(user_id)
            .build();
        let response = self.build_request(&request)?.execute().await?.json().await?;
        Ok(response.values)
    }

    /// Deletes a credential by its base64url encoded id.
    #[instrument(skip(self), err)]
    pub async fn delete_credential(&self, credential_id: &str) -> Result<(), PasswordlessError> {
        let request = requests::DeleteCredentialRequest::builder()
            .credential_id(credential_id)
            .build();
        self.build_request(&request)?.execute().await?.ok().await
    }

    /// Deletes a credential by its raw id.
    #[instrument(skip_all, err)]
    pub async fn delete_credential_bytes(
        &self,
        credential_id: &[u8],
    ) -> Result<(), PasswordlessError> {
        let request = requests::DeleteCredentialRequest::from_bytes(credential_id);
        self.build_request(&request)?.execute().await?.ok().await
    }

    #[instrument(skip(self), err)]
    pub async fn get_event_log(
        &self,
        request: &GetEventLogRequest,
    ) -> Result<GetEventLogResponse, PasswordlessError> {
        self.build_request(request)?.execute().await?.json().await
    }

    #[instrument(skip_all, fields(user_id = %request.user_id), err)]
    pub async fn send_magic_link(
        &self,
        request: &SendMagicLinkRequest,
    ) -> Result<(), PasswordlessError> {
        self.build_request(request)?.execute().await?.ok().await
    }
}

impl fmt::Debug for PasswordlessClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordlessClient")
            .field("api_url", &self.options.api_url.as_str())
            .field("api_secret", &self.options.masked_secret())
            .finish_non_exhaustive()
    }
}

/// Encapsulated HTTP request for the Passwordless API
pub struct Request<T> {
    request: reqwest::RequestBuilder,
    transport: ProblemDetailsTransport,
    translate_problems: bool,
    result: PhantomData<T>,
}

impl<T> Request<T> {
    /// Hand problem details error responses back as plain responses instead of
    /// [`PasswordlessError::Api`].
    #[must_use]
    pub const fn skip_problem_details(mut self) -> Self {
        self.translate_problems = false;
        self
    }

    /// execute a Passwordless API request
    #[instrument(name = "execute_request", skip(self), fields(method, url))]
    pub async fn execute(self) -> Result<Response<T>, PasswordlessError> {
        let request = self.request.build()?;

        // Capture the current span
        let span = tracing::Span::current();
        span.record("method", request.method().as_str());
        span.record("url", request.url().as_str());

        let response = if self.translate_problems {
            self.transport.send(request).await?
        } else {
            self.transport.send_raw(request).await?
        };

        Ok(Response {
            response,
            result: PhantomData,
            span,
        })
    }
}

/// The raw response of the Passwordless API request
pub struct Response<T> {
    response: reqwest::Response,
    result: PhantomData<T>,
    // this span carries the context of the `Request`
    span: tracing::Span,
}

impl<T> Response<T> {
    #[must_use]
    pub fn status(&self) -> reqwest::StatusCode {
        self.response.status()
    }

    #[must_use]
    pub fn into_inner(self) -> reqwest::Response {
        self.response
    }

    /// Only check if the returned HTTP response is of error type; don't parse the data
    #[instrument(name = "response_ok", skip(self), err, parent = &self.span)]
    pub async fn ok(self) -> Result<(), PasswordlessError> {
        let status = self.response.status();
        if status.is_success() {
            return Ok(());
        }
        let bytes = self.response.bytes().await?.to_vec();
        Err(unexpected_status(&bytes, status))
    }

    /// Parse the response json
    #[instrument(name = "parse_response_json", skip(self), err, parent = &self.span)]
    pub async fn json(self) -> Result<T, PasswordlessError>
    where
        T: serde::de::DeserializeOwned,
    {
        let status = self.response.status();
        let mut bytes = self.response.bytes().await?.to_vec();
        if !status.is_success() {
            return Err(unexpected_status(&bytes, status));
        }

        let json = String::from_utf8_lossy(bytes.as_ref());
        tracing::debug!(response_body = %json, "Response JSON");

        let result = simd_json::from_slice::<T>(bytes.as_mut())?;
        Ok(result)
    }
}

fn unexpected_status(bytes: &[u8], status: reqwest::StatusCode) -> PasswordlessError {
    let body = String::from_utf8_lossy(bytes).into_owned();
    tracing::error!(
        status = %status,
        body = %body,
        "Failed to execute request"
    );
    PasswordlessError::UnexpectedStatus { status, body }
}

fn http_client() -> Result<reqwest::Client, PasswordlessError> {
    const KEEP_ALIVE_INTERVAL: core::time::Duration = core::time::Duration::from_secs(15);

    let client = reqwest::Client::builder()
        .use_rustls_tls()
        .user_agent(concat!("rp-passwordless-client/", env!("CARGO_PKG_VERSION")))
        .http2_keep_alive_interval(KEEP_ALIVE_INTERVAL)
        .http2_keep_alive_while_idle(true)
        .build()?;
    Ok(client)
}
