//! In-memory stores seeded at construction

use super::{PermissionStore, Role, RoleStore};
use crate::error::{AuthError, Result};
use async_trait::async_trait;
use std::collections::HashMap;

/// Permission table for the IAM key management methods.
pub fn iam_permissions() -> HashMap<String, String> {
    [
        ("/iam.v1.IAM/CreateKey", "iam.serviceAccountKeys.create"),
        ("/iam.v1.IAM/ListKeys", "iam.serviceAccountKeys.list"),
        ("/iam.v1.IAM/GetKey", "iam.serviceAccountKeys.get"),
        ("/iam.v1.IAM/DeleteKey", "iam.serviceAccountKeys.delete"),
    ]
    .into_iter()
    .map(|(method, permission)| (method.to_string(), permission.to_string()))
    .collect()
}

#[derive(Debug, Clone, Default)]
pub struct StaticPermissionStore {
    permissions: HashMap<String, String>,
}

impl StaticPermissionStore {
    pub fn new(permissions: HashMap<String, String>) -> Self {
        Self { permissions }
    }

    pub fn with_iam_defaults() -> Self {
        Self::new(iam_permissions())
    }
}

#[async_trait]
impl PermissionStore for StaticPermissionStore {
    async fn get_permission(&self, full_method: &str) -> Result<String> {
        self.permissions
            .get(full_method)
            .cloned()
            .ok_or_else(|| AuthError::UnknownMethod(full_method.to_string()))
    }
}

/// Role definitions, shared by every role store
#[derive(Debug, Clone, Default)]
pub struct RoleTable {
    roles: HashMap<String, Role>,
}

impl RoleTable {
    pub fn new(definitions: HashMap<String, Vec<String>>) -> Self {
        let roles = definitions
            .into_iter()
            .map(|(name, permissions)| (name.clone(), Role::new(name, permissions)))
            .collect();
        Self { roles }
    }

    pub fn with_role<I, S>(mut self, name: &str, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles
            .insert(name.to_string(), Role::new(name, permissions));
        self
    }

    pub fn get(&self, name: &str) -> Result<Role> {
        self.roles
            .get(name)
            .cloned()
            .ok_or_else(|| AuthError::UnknownRole(name.to_string()))
    }
}

/// Role store with fixed principal assignments
#[derive(Debug, Clone, Default)]
pub struct StaticRoleStore {
    roles: RoleTable,
    user_roles: HashMap<String, String>,
}

impl StaticRoleStore {
    pub fn new(roles: RoleTable, user_roles: HashMap<String, String>) -> Self {
        Self { roles, user_roles }
    }

    pub fn with_user_role(mut self, principal: &str, role: &str) -> Self {
        self.user_roles
            .insert(principal.to_string(), role.to_string());
        self
    }
}

#[async_trait]
impl RoleStore for StaticRoleStore {
    async fn get_user_role(&self, principal: &str, _bearer: &str) -> Result<String> {
        self.user_roles
            .get(principal)
            .cloned()
            .ok_or_else(|| AuthError::UnknownPrincipal(principal.to_string()))
    }

    async fn get_role(&self, name: &str) -> Result<Role> {
        self.roles.get(name)
    }
}
