pub mod memory;
use alloc::collections::{BTreeMap, BTreeSet};
use core::future::Future;

use serde::Deserialize;

/// Body of the register endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordlessRegisterRequest {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub aliases: Option<BTreeSet<String>>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    /// The user could not be created; keys are error codes, values human readable messages.
    #[error("User validation failed")]
    Validation(BTreeMap<String, Vec<String>>),
    #[error("User store failure: {0}")]
    Backend(String),
}

/// The host application's user persistence.
pub trait UserStore: Send + Sync + 'static {
    type User: Send + Sync;

    /// Creates and persists a new user from a registration request.
    fn create(
        &self,
        request: &PasswordlessRegisterRequest,
    ) -> impl Future<Output = Result<Self::User, UserStoreError>> + Send;

    fn find_by_id(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<Self::User>, UserStoreError>> + Send;

    /// Used by account recovery to find who a magic link goes to.
    fn find_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<Self::User>, UserStoreError>> + Send;

    fn user_id(&self, user: &Self::User) -> String;

    fn username(&self, user: &Self::User) -> String;

    fn email(&self, user: &Self::User) -> Option<String>;
}
