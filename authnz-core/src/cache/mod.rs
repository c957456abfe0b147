//! Read-through caches over the permission and role stores
//!
//! Entries are filled on first successful lookup and live for the process
//! lifetime. Failed lookups are never cached. Concurrent misses on the same
//! key may each reach the store; the last fill wins.

use crate::error::{AuthError, Result};
use crate::store::{PermissionStore, Role, RoleStore};
use crate::telemetry::metrics::{
    record_cache_lookup, CACHE_PERMISSION, CACHE_ROLE, CACHE_USER_ROLE,
};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Keyed map guarded by its own lock. The lock is never held across a store call.
struct CacheMap<V> {
    name: &'static str,
    entries: RwLock<HashMap<String, V>>,
}

impl<V: Clone> CacheMap<V> {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: RwLock::new(HashMap::new()),
        }
    }

    async fn get(&self, key: &str) -> Option<V> {
        let value = self.entries.read().await.get(key).cloned();
        record_cache_lookup(self.name, value.is_some());
        value
    }

    async fn insert(&self, key: &str, value: V) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Run a store call, bounded by `timeout` when one is set.
async fn bounded<T, F>(timeout: Option<Duration>, what: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, call).await {
            Ok(result) => result,
            Err(_) => Err(AuthError::StoreUnavailable(format!(
                "{} lookup timed out after {}ms",
                what,
                limit.as_millis()
            ))),
        },
        None => call.await,
    };

    if let Err(AuthError::StoreUnavailable(reason)) = &result {
        tracing::error!(lookup = what, reason = %reason, "Backing store unavailable");
    }
    result
}

// ==================== Permission Cache ====================

/// RPC method -> required permission
pub struct PermissionCache {
    store: Arc<dyn PermissionStore>,
    entries: CacheMap<String>,
    timeout: Option<Duration>,
}

impl PermissionCache {
    pub fn new(store: Arc<dyn PermissionStore>) -> Self {
        Self {
            store,
            entries: CacheMap::new(CACHE_PERMISSION),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn get_permission(&self, full_method: &str) -> Result<String> {
        if let Some(permission) = self.entries.get(full_method).await {
            return Ok(permission);
        }

        let permission = bounded(
            self.timeout,
            "permission",
            self.store.get_permission(full_method),
        )
        .await?;
        self.entries.insert(full_method, permission.clone()).await;
        Ok(permission)
    }

    /// Number of cached methods
    pub async fn len(&self) -> usize {
        self.entries.len().await
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ==================== Role Cache ====================

/// Principal -> role name, and role name -> role
pub struct RoleCache {
    store: Arc<dyn RoleStore>,
    user_roles: CacheMap<String>,
    roles: CacheMap<Role>,
    timeout: Option<Duration>,
}

impl RoleCache {
    pub fn new(store: Arc<dyn RoleStore>) -> Self {
        Self {
            store,
            user_roles: CacheMap::new(CACHE_USER_ROLE),
            roles: CacheMap::new(CACHE_ROLE),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub async fn get_user_role(&self, principal: &str, bearer: &str) -> Result<String> {
        if let Some(role) = self.user_roles.get(principal).await {
            return Ok(role);
        }

        let role = bounded(
            self.timeout,
            "user role",
            self.store.get_user_role(principal, bearer),
        )
        .await?;
        self.user_roles.insert(principal, role.clone()).await;
        Ok(role)
    }

    pub async fn get_role(&self, name: &str) -> Result<Role> {
        if let Some(role) = self.roles.get(name).await {
            return Ok(role);
        }

        let role = bounded(self.timeout, "role", self.store.get_role(name)).await?;
        self.roles.insert(name, role.clone()).await;
        Ok(role)
    }
}
