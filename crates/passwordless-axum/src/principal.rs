use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tower_sessions::session::Error as SessionError;

/// Session key the signed-in principal is stored under.
pub const PRINCIPAL_SESSION_KEY: &str = "passwordless.principal";

pub const NAME_CLAIM_TYPE: &str = "name";
pub const EMAIL_CLAIM_TYPE: &str = "email";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Claim {
    #[must_use]
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }
}

/// The signed-in user as a bag of claims.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    pub claims: Vec<Claim>,
}

impl ClaimsPrincipal {
    #[must_use]
    pub const fn new(claims: Vec<Claim>) -> Self {
        Self { claims }
    }

    #[must_use]
    pub fn find_first(&self, kind: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|claim| claim.kind == kind)
            .map(|claim| claim.value.as_str())
    }

    pub fn add_claim(&mut self, claim: Claim) {
        self.claims.push(claim);
    }

    /// Replaces every claim of `kind` with a single claim holding `value`.
    pub fn set_claim(&mut self, kind: &str, value: impl Into<String>) {
        self.remove_claims(kind);
        self.claims.push(Claim::new(kind, value));
    }

    pub fn remove_claims(&mut self, kind: &str) {
        self.claims.retain(|claim| claim.kind != kind);
    }

    /// Loads the principal of the current session, if someone is signed in.
    ///
    /// # Errors
    ///
    /// If the session store fails.
    pub async fn from_session(session: &Session) -> Result<Option<Self>, SessionError> {
        let principal = session.get::<Self>(PRINCIPAL_SESSION_KEY).await?;
        Ok(principal.filter(|principal| !principal.claims.is_empty()))
    }

    /// # Errors
    ///
    /// If the session store fails.
    pub async fn store(&self, session: &Session) -> Result<(), SessionError> {
        session.insert(PRINCIPAL_SESSION_KEY, self).await
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_set_claim_replaces_all_of_kind() {
        let mut principal = ClaimsPrincipal::new(vec![
            Claim::new("sub", "user123"),
            Claim::new("Elevated", "2024-01-01T00:00:00Z"),
            Claim::new("Elevated", "2024-01-02T00:00:00Z"),
        ]);

        principal.set_claim("Elevated", "2024-02-01T00:00:00Z");

        assert_eq!(
            principal.claims,
            vec![
                Claim::new("sub", "user123"),
                Claim::new("Elevated", "2024-02-01T00:00:00Z"),
            ]
        );
        assert_eq!(principal.find_first("sub"), Some("user123"));
        assert_eq!(principal.find_first("SecondContext"), None);
    }
}
