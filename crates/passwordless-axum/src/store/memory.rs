use alloc::collections::BTreeMap;
use alloc::sync::Arc;

use tokio::sync::RwLock;

use super::{PasswordlessRegisterRequest, UserStore, UserStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
}

/// Keeps users in memory for demos and tests. Clones share the same users.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<BTreeMap<String, StoredUser>>>,
}

impl InMemoryUserStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a user with a known id.
    pub async fn insert(&self, user: StoredUser) {
        self.users.write().await.insert(user.id.clone(), user);
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

impl UserStore for InMemoryUserStore {
    type User = StoredUser;

    async fn create(
        &self,
        request: &PasswordlessRegisterRequest,
    ) -> Result<Self::User, UserStoreError> {
        let username = request.username.trim();
        if username.is_empty() {
            return Err(validation(
                "InvalidUserName",
                "Username cannot be null or empty.",
            ));
        }

        let mut users = self.users.write().await;
        if users.values().any(|user| user.username == username) {
            return Err(validation(
                "DuplicateUserName",
                &format!("Username '{username}' is already taken."),
            ));
        }

        let user = StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_owned(),
            email: request
                .email
                .clone()
                .filter(|email| !email.trim().is_empty()),
        };
        users.insert(user.id.clone(), user.clone());
        tracing::debug!(user_id = %user.id, "Created user");
        Ok(user)
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<Self::User>, UserStoreError> {
        Ok(self.users.read().await.get(user_id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Self::User>, UserStoreError> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| {
                user.email
                    .as_deref()
                    .is_some_and(|stored| stored.eq_ignore_ascii_case(email))
            })
            .cloned())
    }

    fn user_id(&self, user: &Self::User) -> String {
        user.id.clone()
    }

    fn username(&self, user: &Self::User) -> String {
        user.username.clone()
    }

    fn email(&self, user: &Self::User) -> Option<String> {
        user.email.clone()
    }
}

fn validation(code: &str, description: &str) -> UserStoreError {
    let mut errors = BTreeMap::new();
    errors.insert(code.to_owned(), vec![description.to_owned()]);
    UserStoreError::Validation(errors)
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "allow for tests")]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    fn request(username: &str) -> PasswordlessRegisterRequest {
        PasswordlessRegisterRequest {
            username: username.to_owned(),
            display_name: None,
            aliases: None,
            email: Some("bob@example.com".to_owned()),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let store = InMemoryUserStore::new();

        let user = store.create(&request("bob")).await.unwrap();
        let found = store.find_by_id(&user.id).await.unwrap().unwrap();

        assert_eq!(found, user);
        assert_eq!(store.email(&found).as_deref(), Some("bob@example.com"));
    }

    #[tokio::test]
    async fn test_find_by_email_ignores_case() {
        let store = InMemoryUserStore::new();
        let user = store.create(&request("bob")).await.unwrap();

        let found = store.find_by_email("Bob@Example.com").await.unwrap();

        assert_eq!(found, Some(user));
        assert_eq!(store.find_by_email("alice@example.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_a_validation_error() {
        let store = InMemoryUserStore::new();
        store.create(&request("bob")).await.unwrap();

        let err = store.create(&request("bob")).await.unwrap_err();

        assert_matches!(err, UserStoreError::Validation(errors) if errors.contains_key("DuplicateUserName"));
        assert_eq!(store.len().await, 1);
    }
}
