//! Identity collaborator: caller id to display name
//!
//! Lookups are best-effort. Any failure degrades to the default display
//! name rather than blocking a submission.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

/// Display name used when identity resolution fails or is unavailable
pub const DEFAULT_DISPLAY_NAME: &str = "Anonymous";

/// Shared reference to an identity provider
pub type SharedIdentity = Arc<dyn IdentityProvider>;

/// Resolves a caller id to a display name
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Look up the display name for a user id; None means "use the default"
    async fn display_name(&self, user_id: &str) -> Option<String>;
}

/// HTTP-backed identity provider
///
/// Expects `GET {base_url}/users/{id}` with a bearer token, returning a
/// user record; picks the first of username, first name, or the local
/// part of the primary email.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct UserRecord {
    username: Option<String>,
    first_name: Option<String>,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
}

#[derive(Deserialize)]
struct EmailAddress {
    email_address: String,
}

impl HttpIdentityProvider {
    /// Create a provider against an identity API
    pub fn new(base_url: String, token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            token,
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        let url = format!("{}/users/{}", self.base_url, user_id);
        let response = match self.http.get(&url).bearer_auth(&self.token).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id, "identity lookup failed: {}", e);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(user_id, status = %response.status(), "identity lookup rejected");
            return None;
        }
        let record: UserRecord = match response.json().await {
            Ok(r) => r,
            Err(e) => {
                warn!(user_id, "identity response unreadable: {}", e);
                return None;
            }
        };

        record
            .username
            .or(record.first_name)
            .or_else(|| {
                record
                    .email_addresses
                    .first()
                    .and_then(|e| e.email_address.split('@').next().map(String::from))
            })
    }
}

/// Fixed-map identity provider for tests and single-process setups
#[derive(Default)]
pub struct StaticIdentity {
    names: HashMap<String, String>,
}

impl StaticIdentity {
    /// Empty provider; every lookup falls back to the default name
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a known display name
    pub fn with_name(mut self, user_id: &str, name: &str) -> Self {
        self.names.insert(user_id.to_string(), name.to_string());
        self
    }

    /// Create a shared reference to this provider
    pub fn shared(self) -> SharedIdentity {
        Arc::new(self)
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentity {
    async fn display_name(&self, user_id: &str) -> Option<String> {
        self.names.get(user_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookup_and_fallback() {
        let identity = StaticIdentity::new().with_name("user-1", "Ada");

        assert_eq!(
            identity.display_name("user-1").await,
            Some("Ada".to_string())
        );
        assert_eq!(identity.display_name("unknown").await, None);
    }

    #[test]
    fn test_email_local_part_fallback() {
        let record = UserRecord {
            username: None,
            first_name: None,
            email_addresses: vec![EmailAddress {
                email_address: "ada@example.com".to_string(),
            }],
        };
        let name = record.username.or(record.first_name).or_else(|| {
            record
                .email_addresses
                .first()
                .and_then(|e| e.email_address.split('@').next().map(String::from))
        });
        assert_eq!(name, Some("ada".to_string()));
    }
}
