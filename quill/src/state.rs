//! Application state management

use std::sync::Arc;

use crate::{
    config::Config,
    error::Result,
    session::{Clock, MemoryStore, SessionManager, SessionStore},
    templates::Renderer,
};

/// Application state shared across handlers
///
/// Holds the configuration, the page renderer and the session manager.
/// Cloning is cheap.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    renderer: Renderer,
    sessions: SessionManager,
}

impl AppState {
    /// Create a new builder for AppState
    pub fn builder() -> AppStateBuilder {
        AppStateBuilder::new()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the page renderer
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Get the session manager
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }
}

/// Builder for [`AppState`]
#[derive(Default)]
pub struct AppStateBuilder {
    config: Option<Config>,
    renderer: Option<Renderer>,
    store: Option<Arc<dyn SessionStore>>,
    clock: Option<Arc<dyn Clock>>,
}

impl AppStateBuilder {
    /// Create a new builder
    ///
    /// By default the configuration is `Config::default()`, sessions live in
    /// a [`MemoryStore`] and the renderer follows `templates.use_cache`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Use a prepared renderer instead of building one from the configuration
    pub fn renderer(mut self, renderer: Renderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the session store
    pub fn session_store(mut self, store: impl SessionStore) -> Self {
        self.store = Some(Arc::new(store));
        self
    }

    /// Set the clock used for session expiry
    pub fn clock(mut self, clock: impl Clock) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Build the state
    ///
    /// # Errors
    ///
    /// Fails if the template cache cannot be built (static mode). This is
    /// meant to abort startup.
    pub fn build(self) -> Result<AppState> {
        let mut config = self.config.unwrap_or_default();

        // Unless configured explicitly, the cookie is Secure in production
        if config.session.secure.is_none() {
            config.session.secure = Some(config.service.is_production());
        }

        let renderer = match self.renderer {
            Some(renderer) => renderer,
            None => Renderer::from_config(&config.templates)?,
        }
        .with_csrf_token_length(config.session.csrf.token_length);

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let mut sessions = SessionManager::with_shared_store(config.session.clone(), store);
        if let Some(clock) = self.clock {
            sessions = sessions.with_shared_clock(clock);
        }

        Ok(AppState {
            config: Arc::new(config),
            renderer,
            sessions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::templates::{CacheStrategy, TemplateSource};

    #[test]
    fn test_secure_cookie_follows_environment() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.templates.dir = dir.path().to_path_buf();
        config.service.environment = "production".to_string();

        let state = AppState::builder().config(config).build().unwrap();
        assert_eq!(state.sessions().config().secure, Some(true));
        assert!(state.renderer().strategy().is_static());
    }

    #[test]
    fn test_explicit_secure_setting_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.templates.dir = dir.path().to_path_buf();
        config.service.environment = "production".to_string();
        config.session.secure = Some(false);

        let state = AppState::builder().config(config).build().unwrap();
        assert_eq!(state.sessions().config().secure, Some(false));
    }

    #[test]
    fn test_broken_templates_abort_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.page.html"), "{% if %}").unwrap();
        let mut config = Config::default();
        config.templates.dir = dir.path().to_path_buf();

        let err = AppState::builder().config(config).build().unwrap_err();
        assert!(matches!(err, Error::CacheBuild { .. }));
    }

    #[test]
    fn test_dynamic_renderer_is_not_built_eagerly() {
        let renderer = Renderer::with_dynamic_cache(TemplateSource::new("/does/not/exist"));
        let state = AppState::builder().renderer(renderer).build().unwrap();
        assert!(matches!(state.renderer().strategy(), CacheStrategy::Dynamic(_)));
    }
}
