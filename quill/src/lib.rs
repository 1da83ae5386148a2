//! # quill
//!
//! Server-side page rendering for axum services: a template cache with
//! buffered rendering, cookie-backed sessions and CSRF protection, composed
//! into one middleware chain.
//!
//! ## Features
//!
//! - **Template cache**: `*.page.html` pages compiled with shared
//!   `*.layout.html` fragments, built once at startup or on every render
//! - **Buffered rendering**: a page is fully rendered before the first byte
//!   is written, so errors never produce half a page
//! - **Sessions**: opaque cookie token, sliding lifetime, changes persisted
//!   once per request, even if the handler panics
//! - **CSRF**: per-session token checked on every unsafe request
//! - **Panic recovery**: panics become logged `500` responses
//! - **Graceful shutdown**: SIGTERM and SIGINT handling
//!
//! ## Example
//!
//! ```rust,no_run
//! use quill::prelude::*;
//!
//! async fn about(State(state): State<AppState>, session: Session) -> Result<Response> {
//!     let ctx = RenderContext::new().with_string("name", "John Doe");
//!     state.renderer().render_page("about.page.html", ctx, &session)
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load()?;
//!     init_tracing(&config)?;
//!
//!     let state = AppState::builder().config(config.clone()).build()?;
//!
//!     let routes = Router::new()
//!         .route("/about", get(about))
//!         .route("/health", get(health))
//!         .with_state(state.clone());
//!
//!     Server::new(config)
//!         .serve(middleware::apply(routes, &state))
//!         .await
//! }
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod session;
pub mod state;
pub mod templates;

pub mod prelude {
    pub use crate::config::{Config, ServiceConfig, TemplateConfig};
    pub use crate::error::{Error, ErrorResponse, Result};
    pub use crate::health::health;
    pub use crate::middleware;
    pub use crate::observability::init_tracing;
    pub use crate::server::Server;
    pub use crate::session::{
        CsrfConfig, CsrfToken, FlashKind, FlashMessage, FlashMessages, Session, SessionConfig,
        SessionManager,
    };
    pub use crate::state::{AppState, AppStateBuilder};
    pub use crate::templates::{RenderContext, Renderer, TemplateCache, TemplateSource};

    pub use axum::{
        extract::{ConnectInfo, State},
        response::{IntoResponse, Response},
        routing::{get, post},
        Json, Router,
    };
}
