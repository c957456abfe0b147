//! Handler-side access to the authenticated context

use crate::authnz::AuthContext;
use tonic::{Request, Status};

/// Read the [`AuthContext`] attached by the auth interceptor.
pub trait AuthContextExt {
    /// Fails with `Unauthenticated` when the call was not authenticated
    /// (skipped, overridden without a context, or no interceptor installed).
    #[allow(clippy::result_large_err)]
    fn auth_context(&self) -> Result<&AuthContext, Status>;

    /// Shorthand for the authenticated principal.
    #[allow(clippy::result_large_err)]
    fn principal(&self) -> Result<&str, Status> {
        self.auth_context().map(AuthContext::principal)
    }
}

impl<T> AuthContextExt for Request<T> {
    fn auth_context(&self) -> Result<&AuthContext, Status> {
        self.extensions()
            .get::<AuthContext>()
            .ok_or_else(|| Status::unauthenticated("Request is not authenticated"))
    }
}
