//! gRPC integration

pub mod extensions;
pub mod interceptor;
pub mod metadata;

pub use extensions::AuthContextExt;
pub use interceptor::{AuthInterceptor, AuthLayer, AuthOptions, AuthOverride};
pub use metadata::{authority_from_request, bearer_from_metadata};
