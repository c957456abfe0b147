//! gRPC authentication interceptors
//!
//! - [`AuthInterceptor`]: unary/streaming adapters around the AuthNZ pipeline
//! - [`AuthLayer`]: tower layer for tonic servers, with per-service overrides
//! - [`AuthOptions`]: decider for exempt methods

pub mod auth;
pub mod layer;
pub mod options;

pub use auth::{Admission, AuthInterceptor, AuthOverride, AuthStream};
pub use layer::{service_name, AuthLayer, AuthService};
pub use options::{AuthOptions, Decider, HEALTH_CHECK_METHOD};
