//! AuthNZ Core - RPC authentication and authorization
//!
//! This crate authenticates every inbound gRPC call from its bearer token,
//! authorizes it against role-based permissions, and hands the enriched
//! call context to the business handlers.

pub mod authn;
pub mod authnz;
pub mod authz;
pub mod cache;
pub mod config;
pub mod error;
pub mod grpc;
pub mod jwt;
pub mod keys;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use authnz::{AuthContext, AuthNZ};
pub use config::Config;
pub use error::{AuthError, Result};
pub use grpc::{AuthContextExt, AuthInterceptor, AuthLayer, AuthOptions, AuthOverride};
