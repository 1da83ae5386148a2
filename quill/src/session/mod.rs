//! Cookie-backed visitor sessions.
//!
//! [`SessionLayer`] resolves the `session_id` cookie into a [`Session`] handle
//! for every request and stores it in the request extensions, where handlers
//! pick it up as an extractor. Handlers read and write the handle freely; the
//! changes are applied to the store once, after the handler finished (or
//! panicked), and the cookie is (re)issued with a sliding lifetime.
//!
//! Expiry is passive: a record is only ever found to be expired when a request
//! presents its token, at which point it is discarded and the visitor starts
//! over with an empty session.
//!
//! # Example
//!
//! ```rust,ignore
//! use quill::session::{Session, SessionConfig, SessionLayer, SessionManager};
//!
//! async fn home(session: Session) -> &'static str {
//!     session.put("last_page", "home");
//!     "Welcome"
//! }
//!
//! let sessions = SessionManager::in_memory(SessionConfig::default());
//! let app = Router::new()
//!     .route("/", get(home))
//!     .layer(SessionLayer::new(sessions));
//! ```
//!
//! # CSRF
//!
//! [`CsrfLayer`] runs inside [`SessionLayer`] and rejects state-changing
//! requests that do not echo the session's [`CsrfToken`].

mod config;
pub mod csrf;
mod flash;
mod handle;
mod layer;
mod manager;
mod store;

pub use config::{CsrfConfig, SessionConfig};
pub use csrf::{CsrfDecision, CsrfGuard, CsrfLayer, CsrfToken, CSRF_SESSION_KEY};
pub use flash::{FlashKind, FlashMessage, FlashMessages};
pub use handle::{ChangeSet, Session, SessionId};
pub use layer::SessionLayer;
pub use manager::{Clock, SessionManager, SystemClock};
pub use store::{MemoryStore, SessionRecord, SessionStore};
