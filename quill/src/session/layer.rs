//! Tower layer attaching a [`Session`] to every request.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderValue, Request},
    response::Response,
};
use futures::FutureExt;
use tower::{Layer, Service};

use super::csrf::CsrfRejection;
use super::handle::Session;
use super::manager::SessionManager;
use crate::error::Error;

/// Loads the session before the inner service and persists it afterwards.
///
/// The session is persisted even if the inner service panics; the panic is
/// then resumed for an outer recovery layer to handle.
#[derive(Debug, Clone)]
pub struct SessionLayer {
    manager: SessionManager,
}

impl SessionLayer {
    #[must_use]
    pub fn new(manager: SessionManager) -> Self {
        Self { manager }
    }
}

impl<S> Layer<S> for SessionLayer {
    type Service = SessionMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SessionMiddleware {
            inner,
            manager: self.manager.clone(),
        }
    }
}

/// Session middleware service.
#[derive(Debug, Clone)]
pub struct SessionMiddleware<S> {
    inner: S,
    manager: SessionManager,
}

impl<S> Service<Request<Body>> for SessionMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let manager = self.manager.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let session = manager.load(request.headers()).await;
            request.extensions_mut().insert(session.clone());

            let outcome = AssertUnwindSafe(inner.call(request)).catch_unwind().await;
            let refused = matches!(
                &outcome,
                Ok(Ok(response)) if response.extensions().get::<CsrfRejection>().is_some()
            );
            let cookie = if refused {
                None
            } else {
                manager.persist(&session).await
            };

            let mut response = match outcome {
                Ok(Ok(response)) => response,
                Ok(Err(e)) => return Err(e),
                Err(panic) => std::panic::resume_unwind(panic),
            };

            if let Some(cookie) = cookie {
                match HeaderValue::from_str(&cookie.to_string()) {
                    Ok(value) => {
                        response.headers_mut().append(header::SET_COOKIE, value);
                    }
                    Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
                }
            }

            Ok(response)
        })
    }
}

impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            Error::Session("Session not found in request extensions, is SessionLayer installed?".to_string())
        })
    }
}
