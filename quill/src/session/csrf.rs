//! CSRF (Cross-Site Request Forgery) protection.
//!
//! Each session carries one random token. Pages receive it through the
//! render context (`{{ csrf_token }}`) and send it back on state-changing
//! requests, either in the `X-CSRF-Token` header or in the `csrf_token` field
//! of a urlencoded form. [`CsrfLayer`] rejects unsafe requests whose token is
//! missing or does not match, before the handler runs.
//!
//! # Example
//!
//! ```rust,ignore
//! use quill::session::CsrfToken;
//!
//! async fn form(csrf: CsrfToken) -> impl IntoResponse {
//!     Html(format!(r#"
//!         <form method="post">
//!             {}
//!             <button>Submit</button>
//!         </form>
//!     "#, csrf.as_hidden_field()))
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header, request::Parts, Method, Request},
    response::{IntoResponse, Response},
};
use rand::Rng;

use super::config::CsrfConfig;
use super::handle::Session;
use crate::error::{Error, Result};

/// Session key holding the token.
pub const CSRF_SESSION_KEY: &str = "_csrf_token";

/// A session's CSRF token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrfToken(String);

impl CsrfToken {
    #[must_use]
    pub fn new(token: String) -> Self {
        Self(token)
    }

    #[must_use]
    pub fn token(&self) -> &str {
        &self.0
    }

    /// Hidden form field named `csrf_token`.
    #[must_use]
    pub fn as_hidden_field(&self) -> String {
        self.as_hidden_field_named("csrf_token")
    }

    #[must_use]
    pub fn as_hidden_field_named(&self, name: &str) -> String {
        format!(
            r#"<input type="hidden" name="{}" value="{}">"#,
            html_escape(name),
            html_escape(&self.0)
        )
    }

    /// Meta tag for script access.
    #[must_use]
    pub fn as_meta_tag(&self) -> String {
        format!(
            r#"<meta name="csrf-token" content="{}">"#,
            html_escape(&self.0)
        )
    }

    /// Generate a new random token.
    #[must_use]
    pub fn generate(length: usize) -> Self {
        let token: String = rand::rng()
            .sample_iter(&rand::distr::Alphanumeric)
            .take(length)
            .map(char::from)
            .collect();
        Self(token)
    }

    /// Return the session's token, creating and storing one if needed.
    pub fn get_or_create(session: &Session, length: usize) -> Result<Self> {
        if let Some(token) = session.get_string(CSRF_SESSION_KEY) {
            return Ok(Self(token));
        }
        Self::regenerate(session, length)
    }

    /// Replace the session's token.
    ///
    /// Call this after login to prevent CSRF token fixation.
    pub fn regenerate(session: &Session, length: usize) -> Result<Self> {
        let token = Self::generate(length);
        session
            .insert(CSRF_SESSION_KEY, &token.0)
            .map_err(|e| Error::Session(format!("Failed to store CSRF token: {e}")))?;
        Ok(token)
    }
}

impl std::fmt::Display for CsrfToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<S> FromRequestParts<S> for CsrfToken
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let session = parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            Error::Session("Session not found in request extensions for CSRF".to_string())
        })?;

        let length = parts
            .extensions
            .get::<Arc<CsrfConfig>>()
            .map_or_else(|| CsrfConfig::default().token_length, |c| c.token_length);
        Self::get_or_create(&session, length)
    }
}

/// Outcome of a CSRF check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrfDecision {
    Pass,
    Reject(&'static str),
}

/// The CSRF decision, independent of any transport.
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    safe_methods: Vec<Method>,
}

impl CsrfGuard {
    pub fn new(config: &CsrfConfig) -> Self {
        let safe_methods = config
            .safe_methods
            .iter()
            .filter_map(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .collect();
        Self { safe_methods }
    }

    pub fn is_safe(&self, method: &Method) -> bool {
        self.safe_methods.contains(method)
    }

    /// Decide whether a request may proceed.
    ///
    /// Safe methods always pass. Anything else needs a request token equal
    /// to the one bound to the session.
    pub fn authorize(
        &self,
        method: &Method,
        request_token: Option<&str>,
        session_token: Option<&str>,
    ) -> CsrfDecision {
        if self.is_safe(method) {
            return CsrfDecision::Pass;
        }

        let Some(expected) = session_token.filter(|t| !t.is_empty()) else {
            return CsrfDecision::Reject("no token in session");
        };
        let Some(provided) = request_token.filter(|t| !t.is_empty()) else {
            return CsrfDecision::Reject("no token provided");
        };

        if constant_time_compare(expected, provided) {
            CsrfDecision::Pass
        } else {
            CsrfDecision::Reject("invalid token")
        }
    }
}

impl Default for CsrfGuard {
    fn default() -> Self {
        Self::new(&CsrfConfig::default())
    }
}

/// Response marker telling the session layer the request was refused, so
/// the session is neither renewed nor re-sent.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CsrfRejection;

/// CSRF protection middleware layer.
///
/// Must run inside [`SessionLayer`](super::SessionLayer). Rejected requests
/// get a `403` JSON response and never reach the handler.
#[derive(Debug, Clone)]
pub struct CsrfLayer {
    config: Arc<CsrfConfig>,
    guard: CsrfGuard,
}

impl CsrfLayer {
    #[must_use]
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            guard: CsrfGuard::new(&config),
            config: Arc::new(config),
        }
    }
}

impl<S> tower::Layer<S> for CsrfLayer {
    type Service = CsrfMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CsrfMiddleware {
            inner,
            config: self.config.clone(),
            guard: self.guard.clone(),
        }
    }
}

/// CSRF middleware service.
#[derive(Debug, Clone)]
pub struct CsrfMiddleware<S> {
    inner: S,
    config: Arc<CsrfConfig>,
    guard: CsrfGuard,
}

impl<S> tower::Service<Request<Body>> for CsrfMiddleware<S>
where
    S: tower::Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let config = self.config.clone();
        let guard = self.guard.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            request.extensions_mut().insert(config.clone());

            if !config.enabled || guard.is_safe(request.method()) {
                return inner.call(request).await;
            }

            let session_token = request
                .extensions()
                .get::<Session>()
                .and_then(|s| s.get_string(CSRF_SESSION_KEY));
            let method = request.method().clone();
            let (request, provided) = extract_request_token(request, &config).await;

            match guard.authorize(&method, provided.as_deref(), session_token.as_deref()) {
                CsrfDecision::Pass => inner.call(request).await,
                CsrfDecision::Reject(reason) => {
                    let mut response = Error::CsrfRejected(reason.to_string()).into_response();
                    response.extensions_mut().insert(CsrfRejection);
                    Ok(response)
                }
            }
        })
    }
}

/// Find the token in the header or, for urlencoded forms, in the body.
///
/// The body is buffered up to `max_form_bytes` and re-attached so the
/// handler can still read it.
async fn extract_request_token(
    request: Request<Body>,
    config: &CsrfConfig,
) -> (Request<Body>, Option<String>) {
    let from_header = request
        .headers()
        .get(config.header_name.as_str())
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    if from_header.is_some() {
        return (request, from_header);
    }

    let is_form = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
    if !is_form {
        return (request, None);
    }

    let (parts, body) = request.into_parts();
    match axum::body::to_bytes(body, config.max_form_bytes).await {
        Ok(bytes) => {
            let token = serde_urlencoded::from_bytes::<Vec<(String, String)>>(&bytes)
                .ok()
                .and_then(|fields| {
                    fields
                        .into_iter()
                        .find(|(name, _)| *name == config.form_field_name)
                        .map(|(_, value)| value)
                });
            (Request::from_parts(parts, Body::from(bytes)), token)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Could not read form body for CSRF token");
            (Request::from_parts(parts, Body::empty()), None)
        }
    }
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }
    result == 0
}

/// Basic HTML escaping for attribute values.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}
