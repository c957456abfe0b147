//! Authentication + authorization for one RPC call
//!
//! Runs the bearer token through header inspection, the selected
//! authenticator and the authorizer, producing the [`AuthContext`] handed to
//! downstream handlers.

use crate::authn::{
    AuthMethod, Authenticator, Principal, ServiceIdentityAuthenticator, SharedSecretAuthenticator,
};
use crate::authz::Authorizer;
use crate::cache::{PermissionCache, RoleCache};
use crate::config::AuthnzConfig;
use crate::error::Result;
use crate::grpc::metadata::bearer_from_metadata;
use crate::jwt::{self, VerifiedToken};
use crate::keys::HttpKeyProvider;
use crate::store::{HttpRoleStore, RoleStore, RoleTable, StaticPermissionStore, StaticRoleStore};
use crate::telemetry::metrics::record_failure;
use std::sync::Arc;
use tonic::metadata::MetadataMap;

/// Per-call context attached after successful authorization
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub auth_method: AuthMethod,
    pub token: VerifiedToken,
    pub full_method: String,
}

impl AuthContext {
    pub fn principal(&self) -> &str {
        self.principal.as_str()
    }

    /// The raw bearer token, for propagation to downstream calls
    pub fn bearer(&self) -> &str {
        &self.token.raw
    }
}

/// Authentication followed by authorization for a single call
///
/// The `kid` header selects the branch: present means a service identity
/// verified against the key provider, absent means a shared-secret user
/// token. Either way the principal is then authorized for the method.
pub struct AuthNZ {
    service_identity: ServiceIdentityAuthenticator,
    shared_secret: SharedSecretAuthenticator,
    authorizer: Authorizer,
}

impl AuthNZ {
    /// Assemble from prebuilt parts. Caches live inside `authorizer`, so two
    /// instances built from separate authorizers share nothing.
    pub fn new(
        service_identity: ServiceIdentityAuthenticator,
        shared_secret: SharedSecretAuthenticator,
        authorizer: Authorizer,
    ) -> Self {
        Self {
            service_identity,
            shared_secret,
            authorizer,
        }
    }

    /// Wire the HTTP key provider, the configured stores and both caches.
    pub fn from_config(config: &AuthnzConfig) -> Result<Self> {
        let key_provider = HttpKeyProvider::new(
            config.public_key_url_template.clone(),
            config.key_fetch_timeout(),
        )?;
        let service_identity =
            ServiceIdentityAuthenticator::new(config.audience.clone(), Arc::new(key_provider));
        let shared_secret = SharedSecretAuthenticator::new(config.hmac_secret.as_bytes());

        let roles = RoleTable::new(config.roles.clone());
        let role_store: Arc<dyn RoleStore> = match &config.user_profile_url {
            Some(url) => Arc::new(HttpRoleStore::new(
                url.clone(),
                roles,
                config.role_lookup_timeout(),
            )?),
            None => Arc::new(StaticRoleStore::new(roles, config.user_roles.clone())),
        };
        let permission_store = StaticPermissionStore::new(config.permissions.clone());

        let authorizer = Authorizer::new(
            PermissionCache::new(Arc::new(permission_store))
                .with_timeout(config.role_lookup_timeout()),
            RoleCache::new(role_store).with_timeout(config.role_lookup_timeout()),
        );

        Ok(Self::new(service_identity, shared_secret, authorizer))
    }

    /// Authenticate and authorize the call described by `metadata`.
    pub async fn authenticate(
        &self,
        metadata: &MetadataMap,
        full_method: &str,
    ) -> Result<AuthContext> {
        let result = self.run(metadata, full_method).await;

        if let Err(err) = &result {
            record_failure(err.kind());
            if err.is_configuration_gap() {
                tracing::warn!(
                    method = %full_method,
                    kind = err.kind(),
                    error = %err,
                    "Authorization lookup failed, denying call"
                );
            } else {
                tracing::warn!(
                    method = %full_method,
                    kind = err.kind(),
                    error = %err,
                    "Call rejected"
                );
            }
        }
        result
    }

    async fn run(&self, metadata: &MetadataMap, full_method: &str) -> Result<AuthContext> {
        let token = bearer_from_metadata(metadata)?;
        let header = jwt::peek_header(&token)?;

        let authenticator =
            Authenticator::select(&header, &self.service_identity, &self.shared_secret);
        let authenticated = authenticator.authenticate(&token, &header).await?;

        self.authorizer
            .authorize(authenticated.principal.as_str(), full_method, &token)
            .await?;

        tracing::debug!(
            principal = %authenticated.principal,
            method = %full_method,
            auth_method = authenticated.method.as_str(),
            "Call authorized"
        );

        Ok(AuthContext {
            principal: authenticated.principal,
            auth_method: authenticated.method,
            token: authenticated.token,
            full_method: full_method.to_string(),
        })
    }
}
