//! Role-based authorization

use crate::cache::{PermissionCache, RoleCache};
use crate::error::{AuthError, Result};

/// Maps a call to its required permission and checks it against the
/// principal's role, both through the read-through caches.
pub struct Authorizer {
    permissions: PermissionCache,
    roles: RoleCache,
}

impl Authorizer {
    pub fn new(permissions: PermissionCache, roles: RoleCache) -> Self {
        Self { permissions, roles }
    }

    /// Allow the call only if the principal's role includes the permission
    /// mapped to `full_method`.
    ///
    /// Lookup failures are returned unchanged so callers can tell a
    /// configuration gap from a denial.
    pub async fn authorize(&self, principal: &str, full_method: &str, bearer: &str) -> Result<()> {
        let permission = self.permissions.get_permission(full_method).await?;
        let role_name = self.roles.get_user_role(principal, bearer).await?;
        let role = self.roles.get_role(&role_name).await?;

        if role.includes(&permission) {
            tracing::debug!(
                principal = %principal,
                method = %full_method,
                role = %role_name,
                "Permission granted"
            );
            Ok(())
        } else {
            Err(AuthError::PermissionDenied {
                permission,
                principal: principal.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{RoleTable, StaticPermissionStore, StaticRoleStore};
    use std::collections::HashMap;
    use std::sync::Arc;

    const PRINCIPAL: &str = "2bb6bd99-c27c-48ea-85bc-a8afbc9f35cb";

    fn authorizer() -> Authorizer {
        let roles = RoleTable::default()
            .with_role(
                "MINER",
                [
                    "iam.serviceAccountKeys.create",
                    "iam.serviceAccountKeys.list",
                    "iam.serviceAccountKeys.get",
                ],
            )
            .with_role("ORPHAN", Vec::<String>::new());
        let role_store = StaticRoleStore::new(roles, HashMap::new())
            .with_user_role(PRINCIPAL, "MINER")
            .with_user_role("0a7f9a8e-1111-4c2b-9d3e-2f4a5b6c7d8e", "GHOST")
            .with_user_role("5d1c2b3a-2222-4e5f-8a9b-0c1d2e3f4a5b", "ORPHAN");

        Authorizer::new(
            PermissionCache::new(Arc::new(StaticPermissionStore::with_iam_defaults())),
            RoleCache::new(Arc::new(role_store)),
        )
    }

    #[tokio::test]
    async fn test_permission_in_role() {
        let authorizer = authorizer();
        for method in ["/iam.v1.IAM/CreateKey", "/iam.v1.IAM/ListKeys", "/iam.v1.IAM/GetKey"] {
            assert!(authorizer.authorize(PRINCIPAL, method, "").await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_permission_not_in_role() {
        let err = authorizer()
            .authorize(PRINCIPAL, "/iam.v1.IAM/DeleteKey", "")
            .await
            .unwrap_err();

        assert_eq!(
            err,
            AuthError::PermissionDenied {
                permission: "iam.serviceAccountKeys.delete".to_string(),
                principal: PRINCIPAL.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_empty_role_denies() {
        let err = authorizer()
            .authorize(
                "5d1c2b3a-2222-4e5f-8a9b-0c1d2e3f4a5b",
                "/iam.v1.IAM/GetKey",
                "",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn test_lookup_failures_propagate() {
        let authorizer = authorizer();

        assert_eq!(
            authorizer
                .authorize(PRINCIPAL, "/iam.v1.IAM/Rotate", "")
                .await
                .unwrap_err(),
            AuthError::UnknownMethod("/iam.v1.IAM/Rotate".to_string())
        );
        assert_eq!(
            authorizer
                .authorize("9e8d7c6b-3333-4a2b-8c1d-0e9f8a7b6c5d", "/iam.v1.IAM/GetKey", "")
                .await
                .unwrap_err(),
            AuthError::UnknownPrincipal("9e8d7c6b-3333-4a2b-8c1d-0e9f8a7b6c5d".to_string())
        );
        assert_eq!(
            authorizer
                .authorize(
                    "0a7f9a8e-1111-4c2b-9d3e-2f4a5b6c7d8e",
                    "/iam.v1.IAM/GetKey",
                    ""
                )
                .await
                .unwrap_err(),
            AuthError::UnknownRole("GHOST".to_string())
        );
    }

    #[tokio::test]
    async fn test_repeat_authorization_is_stable() {
        let authorizer = authorizer();
        let first = authorizer.authorize(PRINCIPAL, "/iam.v1.IAM/DeleteKey", "").await;
        let second = authorizer.authorize(PRINCIPAL, "/iam.v1.IAM/DeleteKey", "").await;
        assert_eq!(first, second);
    }
}
