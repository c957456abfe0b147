//! Backing stores for permissions and roles
//!
//! Stores are the source of truth behind the read-through caches in
//! [`crate::cache`]. They never cache themselves.

pub mod http;
pub mod memory;

pub use http::HttpRoleStore;
pub use memory::{iam_permissions, RoleTable, StaticPermissionStore, StaticRoleStore};

use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashSet;

/// A named bundle of permissions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub included_permissions: HashSet<String>,
}

impl Role {
    pub fn new<I, S>(name: impl Into<String>, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            included_permissions: permissions.into_iter().map(Into::into).collect(),
        }
    }

    pub fn includes(&self, permission: &str) -> bool {
        self.included_permissions.contains(permission)
    }
}

/// RPC method -> required permission
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Fails with `UnknownMethod` when no mapping exists.
    async fn get_permission(&self, full_method: &str) -> Result<String>;
}

/// Principal -> role -> permissions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Fails with `UnknownPrincipal` when the principal has no role.
    ///
    /// `bearer` is the caller's verified token, for stores that look the
    /// profile up on the caller's behalf.
    async fn get_user_role(&self, principal: &str, bearer: &str) -> Result<String>;

    /// Fails with `UnknownRole` when the role is not defined.
    async fn get_role(&self, name: &str) -> Result<Role>;
}
