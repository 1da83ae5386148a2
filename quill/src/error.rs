//! Error types and HTTP response conversion

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Boxed source error carried by template failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type alias using the framework error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the framework
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A template source file could not be read or parsed while building the cache
    #[error("Failed to build template cache at `{name}`: {source}")]
    CacheBuild {
        /// File (or directory) that failed
        name: String,
        /// Underlying read or parse error
        #[source]
        source: BoxError,
    },

    /// The requested template is not part of the cache
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// The template compiled but failed while executing
    #[error("Failed to render template `{name}`: {source}")]
    RenderExecution {
        /// Template being rendered
        name: String,
        /// Underlying execution error
        #[source]
        source: BoxError,
    },

    /// The rendered page could not be copied to the response sink
    #[error("Failed to write rendered page: {0}")]
    ResponseWrite(#[source] std::io::Error),

    /// Session handle misuse (missing from the request, unserializable value)
    #[error("Session error: {0}")]
    Session(String),

    /// The session store failed to load or persist a record
    #[error("Session store error: {0}")]
    SessionStore(String),

    /// CSRF validation failed
    #[error("CSRF validation failed: {0}")]
    CsrfRejected(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,

    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// HTTP status code
    pub status: u16,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
        }
    }
}

fn internal(code: &str, message: &str) -> (StatusCode, ErrorResponse) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        ErrorResponse::with_code(StatusCode::INTERNAL_SERVER_ERROR, code, message),
    )
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_response) = match self {
            Error::Config(e) => {
                tracing::error!("Configuration error: {}", e);
                internal("CONFIG_ERROR", "Configuration error")
            }

            Error::Io(e) => {
                tracing::error!("I/O error: {}", e);
                internal("IO_ERROR", "I/O operation failed")
            }

            Error::CacheBuild { name, source } => {
                tracing::error!(template = %name, "Template cache build failed: {}", source);
                internal("TEMPLATE_CACHE_ERROR", "Page could not be rendered")
            }

            Error::TemplateNotFound(name) => {
                tracing::error!(template = %name, "Template not found in cache");
                internal("TEMPLATE_NOT_FOUND", "Page could not be rendered")
            }

            Error::RenderExecution { name, source } => {
                tracing::error!(template = %name, "Template execution failed: {}", source);
                internal("RENDER_ERROR", "Page could not be rendered")
            }

            Error::ResponseWrite(e) => {
                tracing::error!("Writing rendered page failed: {}", e);
                internal("RESPONSE_WRITE_ERROR", "Page could not be delivered")
            }

            Error::Session(msg) => {
                tracing::error!("Session error: {}", msg);
                internal("SESSION_ERROR", "Session operation failed")
            }

            Error::SessionStore(msg) => {
                tracing::error!("Session store error: {}", msg);
                internal("SESSION_STORE_ERROR", "Session operation failed")
            }

            Error::CsrfRejected(msg) => {
                tracing::warn!("CSRF validation failed: {}", msg);
                (
                    StatusCode::FORBIDDEN,
                    ErrorResponse::with_code(
                        StatusCode::FORBIDDEN,
                        "CSRF_VALIDATION_FAILED",
                        format!("CSRF validation failed: {msg}"),
                    ),
                )
            }

            Error::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                internal("INTERNAL_ERROR", "Internal server error")
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

// Manual From implementations for boxed errors
impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response() {
        let err = ErrorResponse::new(StatusCode::NOT_FOUND, "Page not found");
        assert_eq!(err.status, 404);
        assert_eq!(err.error, "Page not found");
        assert!(err.code.is_none());
    }

    #[test]
    fn test_csrf_rejection_is_forbidden() {
        let response = Error::CsrfRejected("token mismatch".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_render_failures_are_internal_errors() {
        let not_found = Error::TemplateNotFound("missing.page.html".to_string()).into_response();
        assert_eq!(not_found.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let exec = Error::RenderExecution {
            name: "home.page.html".to_string(),
            source: "undefined value".into(),
        }
        .into_response();
        assert_eq!(exec.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_cache_build_display_names_file() {
        let err = Error::CacheBuild {
            name: "broken.page.html".to_string(),
            source: "unexpected end of input".into(),
        };
        assert!(err.to_string().contains("broken.page.html"));
    }
}
