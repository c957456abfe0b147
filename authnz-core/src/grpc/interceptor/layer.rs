//! Tower layer running the interceptor in front of a tonic server
//!
//! tonic's `Interceptor` is synchronous, so the pipeline (which may fetch keys
//! and roles) runs here instead, on the raw HTTP request. Unary and streaming
//! calls take the same path.

use super::auth::{AuthInterceptor, AuthOverride};
use crate::grpc::metadata::authority_from_request;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::metadata::MetadataMap;
use tower::{Layer, Service};
use tracing::Instrument;

/// Service name of a full method, e.g. `iam.v1.IAM` for `/iam.v1.IAM/GetKey`.
pub fn service_name(full_method: &str) -> Option<&str> {
    let (service, method) = full_method.strip_prefix('/')?.split_once('/')?;
    if service.is_empty() || method.is_empty() {
        return None;
    }
    Some(service)
}

/// Tower layer running the interceptor ahead of every call
#[derive(Clone)]
pub struct AuthLayer {
    interceptor: AuthInterceptor,
    overrides: Arc<HashMap<String, Arc<dyn AuthOverride>>>,
}

impl AuthLayer {
    pub fn new(interceptor: AuthInterceptor) -> Self {
        Self {
            interceptor,
            overrides: Arc::new(HashMap::new()),
        }
    }

    /// Let `service` (e.g. `iam.v1.IAM`) replace the shared pipeline for its methods.
    pub fn with_service_override(
        mut self,
        service: impl Into<String>,
        service_override: Arc<dyn AuthOverride>,
    ) -> Self {
        Arc::make_mut(&mut self.overrides).insert(service.into(), service_override);
        self
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            interceptor: self.interceptor.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    interceptor: AuthInterceptor,
    overrides: Arc<HashMap<String, Arc<dyn AuthOverride>>>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for AuthService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: http::Request<ReqBody>) -> Self::Future {
        // The clone may not be ready; keep the instance poll_ready was called on.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let interceptor = self.interceptor.clone();
        let overrides = self.overrides.clone();

        Box::pin(async move {
            let full_method = req.uri().path().to_string();
            let authority = authority_from_request(&req);
            let metadata = MetadataMap::from_headers(req.headers().clone());
            let service_override = service_name(&full_method)
                .and_then(|service| overrides.get(service))
                .cloned();

            let admission = match interceptor
                .admit(&metadata, &full_method, service_override.as_deref())
                .await
            {
                Ok(admission) => admission,
                Err(status) => {
                    tracing::debug!(
                        method = %full_method,
                        authority = authority.as_deref().unwrap_or(""),
                        code = ?status.code(),
                        "Call aborted by auth layer"
                    );
                    return Ok(status.into_http());
                }
            };

            let span = admission.span(&full_method);
            if let Some(authority) = authority.as_deref() {
                span.record("authority", authority);
            }
            if let Some(ctx) = admission.into_context() {
                req.extensions_mut().insert(ctx);
            }
            inner.call(req).instrument(span).await
        })
    }
}
