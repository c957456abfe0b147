//! gRPC authentication interceptor
//!
//! Binds the [`AuthNZ`] pipeline to unary and streaming handlers. The decider
//! runs first; a per-service override, when present, replaces the pipeline
//! for that service's methods.

use super::layer::AuthLayer;
use super::options::AuthOptions;
use crate::authnz::{AuthContext, AuthNZ};
use crate::config::AuthnzConfig;
use crate::error::{AuthError, Result as AuthResult};
use crate::telemetry::metrics::{record_failure, record_request, RequestResult};
use async_trait::async_trait;
use futures::{FutureExt, Stream};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::metadata::MetadataMap;
use tonic::{Code, Request, Response, Status};
use tracing::{Instrument, Span};

/// Per-service replacement for the shared pipeline.
///
/// Returning `Ok(None)` admits the call without an [`AuthContext`].
#[async_trait]
pub trait AuthOverride: Send + Sync {
    async fn auth_override(
        &self,
        metadata: &MetadataMap,
        full_method: &str,
    ) -> Result<Option<AuthContext>, Status>;
}

/// How a call got past the interceptor
#[derive(Debug, Clone)]
pub enum Admission {
    /// Exempted by the decider
    Skipped,
    /// Decided by a service override
    Overridden(Option<AuthContext>),
    /// Authenticated and authorized by the pipeline
    Authorized(AuthContext),
}

impl Admission {
    pub fn context(&self) -> Option<&AuthContext> {
        match self {
            Admission::Skipped => None,
            Admission::Overridden(ctx) => ctx.as_ref(),
            Admission::Authorized(ctx) => Some(ctx),
        }
    }

    pub fn into_context(self) -> Option<AuthContext> {
        match self {
            Admission::Skipped => None,
            Admission::Overridden(ctx) => ctx,
            Admission::Authorized(ctx) => Some(ctx),
        }
    }

    /// Span the handler runs in, tagged with the authenticated subject.
    ///
    /// `authority` is left empty for the caller to record.
    pub fn span(&self, full_method: &str) -> Span {
        let span = tracing::info_span!(
            "rpc",
            method = %full_method,
            authority = tracing::field::Empty,
            auth.sub = tracing::field::Empty,
        );
        if let Some(ctx) = self.context() {
            span.record("auth.sub", ctx.principal());
        }
        span
    }
}

/// Authentication interceptor for gRPC services
#[derive(Clone)]
pub struct AuthInterceptor {
    authnz: Arc<AuthNZ>,
    options: AuthOptions,
}

impl AuthInterceptor {
    pub fn new(authnz: Arc<AuthNZ>, options: AuthOptions) -> Self {
        Self { authnz, options }
    }

    /// Pipeline and decider built from configuration.
    pub fn from_config(config: &AuthnzConfig) -> AuthResult<Self> {
        let authnz = AuthNZ::from_config(config)?;
        Ok(Self::new(
            Arc::new(authnz),
            AuthOptions::skip_methods(config.skip_methods.clone()),
        ))
    }

    pub fn options(&self) -> &AuthOptions {
        &self.options
    }

    /// Tower layer applying this interceptor to every call of a server.
    pub fn layer(self) -> AuthLayer {
        AuthLayer::new(self)
    }

    /// Decide whether the call may proceed.
    ///
    /// Never panics: a panic in the pipeline or an override is reported as
    /// `Unauthenticated`.
    pub async fn admit(
        &self,
        metadata: &MetadataMap,
        full_method: &str,
        service_override: Option<&dyn AuthOverride>,
    ) -> Result<Admission, Status> {
        if !self.options.should_authenticate(full_method) {
            tracing::debug!(method = %full_method, "Authentication skipped");
            record_request(RequestResult::Skipped);
            return Ok(Admission::Skipped);
        }

        if let Some(service_override) = service_override {
            let outcome = AssertUnwindSafe(service_override.auth_override(metadata, full_method))
                .catch_unwind()
                .await;
            return match outcome {
                Ok(Ok(ctx)) => {
                    record_request(RequestResult::Override);
                    Ok(Admission::Overridden(ctx))
                }
                Ok(Err(status)) => {
                    record_request(result_for(&status));
                    Err(status)
                }
                Err(_) => Err(self.panicked(full_method)),
            };
        }

        let outcome = AssertUnwindSafe(self.authnz.authenticate(metadata, full_method))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(ctx)) => {
                record_request(RequestResult::Ok);
                Ok(Admission::Authorized(ctx))
            }
            Ok(Err(err)) => {
                let status = Status::from(err);
                record_request(result_for(&status));
                Err(status)
            }
            Err(_) => Err(self.panicked(full_method)),
        }
    }

    fn panicked(&self, full_method: &str) -> Status {
        tracing::error!(method = %full_method, "Auth pipeline panicked, rejecting call");
        let err = AuthError::Internal("auth pipeline panicked".to_string());
        record_failure(err.kind());
        record_request(RequestResult::Unauthenticated);
        Status::from(err)
    }

    /// Unary adapter: admit the call, attach the context, run the handler.
    pub async fn unary<Req, Resp, F, Fut>(
        &self,
        mut request: Request<Req>,
        full_method: &str,
        service_override: Option<&dyn AuthOverride>,
        handler: F,
    ) -> Result<Response<Resp>, Status>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<Resp>, Status>>,
    {
        let admission = self
            .admit(request.metadata(), full_method, service_override)
            .await?;
        let span = admission.span(full_method);
        if let Some(ctx) = admission.into_context() {
            request.extensions_mut().insert(ctx);
        }

        handler(request).instrument(span).await
    }

    /// Streaming adapter: like [`unary`](Self::unary), but the response
    /// stream is also polled inside the call span.
    pub async fn streaming<Req, St, F, Fut>(
        &self,
        mut request: Request<Req>,
        full_method: &str,
        service_override: Option<&dyn AuthOverride>,
        handler: F,
    ) -> Result<Response<AuthStream<St>>, Status>
    where
        F: FnOnce(Request<Req>) -> Fut,
        Fut: Future<Output = Result<Response<St>, Status>>,
        St: Stream + Unpin,
    {
        let admission = self
            .admit(request.metadata(), full_method, service_override)
            .await?;
        let span = admission.span(full_method);
        if let Some(ctx) = admission.into_context() {
            request.extensions_mut().insert(ctx);
        }

        let response = handler(request).instrument(span.clone()).await?;
        Ok(response.map(|inner| AuthStream { inner, span }))
    }
}

fn result_for(status: &Status) -> RequestResult {
    match status.code() {
        Code::PermissionDenied => RequestResult::PermissionDenied,
        _ => RequestResult::Unauthenticated,
    }
}

/// Response stream polled inside the call span
pub struct AuthStream<S> {
    inner: S,
    span: Span,
}

impl<S> AuthStream<S> {
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Stream + Unpin> Stream for AuthStream<S> {
    type Item = S::Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        let _entered = this.span.enter();
        Pin::new(&mut this.inner).poll_next(cx)
    }
}
