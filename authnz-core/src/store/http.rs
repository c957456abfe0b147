//! Role store backed by the user-profile endpoint
//!
//! The profile is fetched on the caller's behalf with their bearer token and
//! its `role` field names the principal's role. Role definitions come from
//! the configured [`RoleTable`].

use super::{Role, RoleStore, RoleTable};
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct UserProfile {
    #[serde(default)]
    role: Option<String>,
}

#[derive(Clone)]
pub struct HttpRoleStore {
    profile_url: String,
    roles: RoleTable,
    http_client: Client,
}

impl HttpRoleStore {
    /// `timeout` bounds each profile request.
    pub fn new(profile_url: impl Into<String>, roles: RoleTable, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            profile_url: profile_url.into(),
            roles,
            http_client,
        })
    }
}

#[async_trait]
impl RoleStore for HttpRoleStore {
    async fn get_user_role(&self, principal: &str, bearer: &str) -> Result<String> {
        let response = self
            .http_client
            .get(&self.profile_url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|e| {
                AuthError::StoreUnavailable(format!("Failed to fetch user profile: {}", e))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AuthError::UnknownPrincipal(principal.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            return Err(AuthError::StoreUnavailable(format!(
                "User profile endpoint returned {}",
                status
            )));
        }

        let profile: UserProfile = response.json().await.map_err(|e| {
            AuthError::StoreUnavailable(format!("Failed to parse user profile: {}", e))
        })?;

        profile
            .role
            .filter(|role| !role.is_empty())
            .ok_or_else(|| AuthError::UnknownPrincipal(principal.to_string()))
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        self.roles.get(name)
    }
}
