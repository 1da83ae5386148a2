//! Session lifecycle: load from the cookie, persist after the handler.

use std::fmt;
use std::sync::Arc;

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use cookie::{Cookie, SameSite};

use super::config::SessionConfig;
use super::handle::{Session, SessionId};
use super::store::{MemoryStore, SessionStore};

/// Browsers cap cookie lifetimes at 400 days.
const MAX_EXPIRY_SECS: u64 = 400 * 24 * 60 * 60;

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Loads and persists sessions on behalf of the session layer.
///
/// Cheap to clone; all clones share the store.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    config: Arc<SessionConfig>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    pub fn new(config: SessionConfig, store: impl SessionStore) -> Self {
        Self::with_shared_store(config, Arc::new(store))
    }

    pub fn with_shared_store(config: SessionConfig, store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            config: Arc::new(config),
            clock: Arc::new(SystemClock),
        }
    }

    /// Manager backed by a fresh [`MemoryStore`].
    pub fn in_memory(config: SessionConfig) -> Self {
        Self::new(config, MemoryStore::new())
    }

    #[must_use]
    pub fn with_clock(self, clock: impl Clock) -> Self {
        self.with_shared_clock(Arc::new(clock))
    }

    #[must_use]
    pub fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Lifetime window of a record after its last persist.
    pub fn ttl(&self) -> Duration {
        Duration::seconds(self.config.expiry_secs.min(MAX_EXPIRY_SECS) as i64)
    }

    /// Session token presented by the client, if it is one we could have issued.
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<SessionId> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| Cookie::split_parse(value))
            .filter_map(|cookie| cookie.ok())
            .find(|cookie| cookie.name() == self.config.cookie_name)
            .and_then(|cookie| SessionId::parse(cookie.value()))
    }

    /// Resolve the request's session.
    ///
    /// Never fails: a missing, unknown or expired token, or an unreachable
    /// store, all yield a fresh anonymous session.
    pub async fn load(&self, headers: &HeaderMap) -> Session {
        let Some(id) = self.token_from_headers(headers) else {
            return Session::new(SessionId::generate());
        };

        let now = self.clock.now();
        match self.store.load(&id).await {
            Ok(Some(record)) if !record.is_expired(now) => Session::from_record(id, record.data),
            Ok(Some(record)) => {
                tracing::debug!(expired_at = %record.expires_at, "Session expired");
                if let Err(e) = self.store.delete(&id).await {
                    tracing::warn!(error = %e, "Failed to delete expired session");
                }
                Session::new(SessionId::generate())
            }
            Ok(None) => Session::new(SessionId::generate()),
            Err(e) => {
                tracing::warn!(error = %e, "Session store unavailable, continuing with anonymous session");
                Session::new(SessionId::generate())
            }
        }
    }

    /// Write the session's changes to the store.
    ///
    /// Returns the cookie to send back, or `None` when the client needs no
    /// cookie (an untouched new session, or a store failure).
    pub async fn persist(&self, session: &Session) -> Option<Cookie<'static>> {
        let pending = session.take_pending();

        if let Some(previous) = &pending.previous_id {
            if let Err(e) = self.store.delete(previous).await {
                tracing::error!(error = %e, "Failed to delete cycled session");
            }
        }

        if pending.destroyed {
            if pending.is_new {
                return None;
            }
            if let Err(e) = self.store.delete(&pending.id).await {
                tracing::error!(error = %e, "Failed to delete destroyed session");
            }
            return Some(self.removal_cookie());
        }

        if pending.is_new && pending.changes.is_empty() {
            return None;
        }

        let now = self.clock.now();
        match self
            .store
            .apply(&pending.id, &pending.changes, now, now + self.ttl())
            .await
        {
            Ok(()) => Some(self.session_cookie(&pending.id)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to persist session");
                None
            }
        }
    }

    fn base_cookie(&self, value: String) -> cookie::CookieBuilder<'static> {
        let same_site = match self.config.same_site.to_ascii_lowercase().as_str() {
            "strict" => SameSite::Strict,
            "none" => SameSite::None,
            _ => SameSite::Lax,
        };

        let mut builder = Cookie::build((self.config.cookie_name.clone(), value))
            .path(self.config.cookie_path.clone())
            .http_only(self.config.http_only)
            .secure(self.config.secure.unwrap_or(false))
            .same_site(same_site);

        if let Some(domain) = &self.config.cookie_domain {
            builder = builder.domain(domain.clone());
        }
        builder
    }

    fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        let builder = self.base_cookie(id.to_string());
        if self.config.persistent {
            builder
                .max_age(cookie::time::Duration::seconds(self.ttl().num_seconds()))
                .build()
        } else {
            builder.build()
        }
    }

    fn removal_cookie(&self) -> Cookie<'static> {
        self.base_cookie(String::new())
            .max_age(cookie::time::Duration::ZERO)
            .build()
    }
}
