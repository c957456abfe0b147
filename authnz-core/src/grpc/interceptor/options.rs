//! Interceptor options

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Standard gRPC health check method
pub const HEALTH_CHECK_METHOD: &str = "/grpc.health.v1.Health/Check";

/// Predicate over the full method name: `true` means the call must be authenticated.
pub type Decider = Arc<dyn Fn(&str) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct AuthOptions {
    decider: Decider,
}

impl Default for AuthOptions {
    /// Authenticate every call
    fn default() -> Self {
        Self {
            decider: Arc::new(|_| true),
        }
    }
}

impl fmt::Debug for AuthOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthOptions").finish_non_exhaustive()
    }
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decider<F>(mut self, decider: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.decider = Arc::new(decider);
        self
    }

    /// Exempt exactly the listed methods.
    pub fn skip_methods<I, S>(methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let exempt: HashSet<String> = methods.into_iter().map(Into::into).collect();
        Self::default().with_decider(move |method| !exempt.contains(method))
    }

    /// Exempt the health check only.
    pub fn skip_health_check() -> Self {
        Self::skip_methods([HEALTH_CHECK_METHOD])
    }

    pub fn should_authenticate(&self, full_method: &str) -> bool {
        (self.decider)(full_method)
    }
}
