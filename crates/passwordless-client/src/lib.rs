//! Typed client for the Passwordless.dev backend API.
extern crate alloc;

pub mod api_client;
pub mod base64url;
pub mod error;
pub mod options;
pub mod transport;
pub mod types;

pub use api_client::requests::PasswordlessRequest;
pub use api_client::{PasswordlessClient, Request, Response};
pub use error::PasswordlessError;
pub use options::PasswordlessOptions;
pub use rp_passwordless_problem::{ErrorCode, ProblemDetails};
pub use transport::ProblemDetailsTransport;
pub use {redact, url};

/// Header carrying the private api secret on every request.
pub const API_SECRET_HEADER: &str = "ApiSecret";
