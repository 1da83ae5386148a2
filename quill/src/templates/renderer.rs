//! Page renderer.
//!
//! Resolves a compiled template through the configured [`CacheStrategy`],
//! merges request defaults into the caller's context, executes into a buffer
//! and only then hands the buffer to the sink. A failing template therefore
//! never produces a truncated page.

use std::sync::Arc;

use axum::response::{IntoResponse, Response};

use super::cache::{TemplateCache, TemplateSource};
use super::context::{RenderContext, RequestDefaults};
use super::sink::{content_type_for, HtmlSink, RenderSink};
use crate::config::TemplateConfig;
use crate::error::{Error, Result};
use crate::session::{CsrfConfig, FlashMessages, Session};

/// How the renderer obtains compiled templates.
#[derive(Debug, Clone)]
pub enum CacheStrategy {
    /// Cache built once at startup and shared read-only.
    Static(Arc<TemplateCache>),
    /// Cache rebuilt from the source on every render (development).
    Dynamic(TemplateSource),
}

impl CacheStrategy {
    pub fn is_static(&self) -> bool {
        matches!(self, Self::Static(_))
    }
}

/// Renders named pages into sinks.
#[derive(Debug, Clone)]
pub struct Renderer {
    strategy: CacheStrategy,
    csrf_token_length: usize,
}

impl Renderer {
    pub fn new(strategy: CacheStrategy) -> Self {
        Self {
            strategy,
            csrf_token_length: CsrfConfig::default().token_length,
        }
    }

    /// Renderer backed by a cache built right now.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CacheBuild`] if any template fails to load; callers
    /// should treat this as fatal.
    pub fn with_static_cache(source: &TemplateSource) -> Result<Self> {
        let cache = TemplateCache::build(source)?;
        tracing::info!(
            dir = %source.dir().display(),
            templates = ?cache.names(),
            "Template cache ready"
        );
        Ok(Self::new(CacheStrategy::Static(Arc::new(cache))))
    }

    /// Renderer that recompiles templates for each render.
    pub fn with_dynamic_cache(source: TemplateSource) -> Self {
        tracing::info!(
            dir = %source.dir().display(),
            "Template cache disabled, templates are rebuilt on every render"
        );
        Self::new(CacheStrategy::Dynamic(source))
    }

    /// Pick the strategy from configuration.
    pub fn from_config(config: &TemplateConfig) -> Result<Self> {
        if config.use_cache {
            Self::with_static_cache(&config.source())
        } else {
            Ok(Self::with_dynamic_cache(config.source()))
        }
    }

    #[must_use]
    pub fn with_csrf_token_length(mut self, length: usize) -> Self {
        self.csrf_token_length = length;
        self
    }

    pub fn strategy(&self) -> &CacheStrategy {
        &self.strategy
    }

    /// Render `name` into `sink`.
    ///
    /// `defaults` are merged into `ctx` without replacing anything the caller
    /// set. Nothing is written to `sink` unless execution succeeds.
    ///
    /// # Errors
    ///
    /// - [`Error::TemplateNotFound`] if `name` is not in the cache
    /// - [`Error::RenderExecution`] if compiling (dynamic mode) or executing fails
    /// - [`Error::ResponseWrite`] if the sink rejects the finished page
    pub fn render<S>(
        &self,
        sink: &mut S,
        name: &str,
        mut ctx: RenderContext,
        defaults: RequestDefaults,
    ) -> Result<()>
    where
        S: RenderSink + ?Sized,
    {
        ctx.merge_defaults(defaults);
        let page = self.execute(name, &ctx)?;

        sink.write_page(content_type_for(name), page.as_bytes())
            .map_err(Error::ResponseWrite)
    }

    /// Render `name` for the visitor owning `session` and build the response.
    ///
    /// This is the entry point for handlers: session-derived defaults such
    /// as the CSRF token and pending flash messages are injected. Flash
    /// messages are only removed from the session once the page rendered.
    pub fn render_page(&self, name: &str, ctx: RenderContext, session: &Session) -> Result<Response> {
        let defaults = RequestDefaults::from_session(session, self.csrf_token_length)?;
        let mut sink = HtmlSink::new();
        self.render(&mut sink, name, ctx, defaults)?;
        FlashMessages::discard(session);
        Ok(sink.into_response())
    }

    fn execute(&self, name: &str, ctx: &RenderContext) -> Result<String> {
        match &self.strategy {
            CacheStrategy::Static(cache) => execute_in(cache, name, ctx),
            CacheStrategy::Dynamic(source) => {
                let cache = TemplateCache::build(source).map_err(|e| match e {
                    Error::CacheBuild { source, .. } => Error::RenderExecution {
                        name: name.to_string(),
                        source,
                    },
                    other => other,
                })?;
                execute_in(&cache, name, ctx)
            }
        }
    }
}

fn execute_in(cache: &TemplateCache, name: &str, ctx: &RenderContext) -> Result<String> {
    let template = cache
        .get(name)
        .ok_or_else(|| Error::TemplateNotFound(name.to_string()))?;

    template.render(ctx).map_err(|e| Error::RenderExecution {
        name: name.to_string(),
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FlashMessage, SessionId};
    use std::fs;
    use std::io;
    use std::path::Path;

    fn write(dir: &Path, name: &str, body: &str) {
        fs::write(dir.join(name), body).unwrap();
    }

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "base.layout.html",
            "<main>{% block content %}{% endblock %}</main>",
        );
        write(
            dir.path(),
            "about.page.html",
            r#"{% extends "base.layout.html" %}{% block content %}{{ string_map.name }} from {{ string_map.remoteIP }} [{{ csrf_token }}]{% endblock %}"#,
        );
        write(
            dir.path(),
            "strict.page.html",
            "{{ string_map.name }}{{ data.required.field }}",
        );
        dir
    }

    /// Records how many bytes reached it.
    #[derive(Default)]
    struct CountingSink {
        bytes: usize,
    }

    impl RenderSink for CountingSink {
        fn write_page(&mut self, _content_type: &str, body: &[u8]) -> io::Result<()> {
            self.bytes += body.len();
            Ok(())
        }
    }

    struct BrokenSink;

    impl RenderSink for BrokenSink {
        fn write_page(&mut self, _content_type: &str, _body: &[u8]) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))
        }
    }

    #[test]
    fn test_static_render() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();
        assert!(renderer.strategy().is_static());

        let mut out = Vec::new();
        let ctx = RenderContext::new()
            .with_string("name", "John Doe")
            .with_string("remoteIP", "1.2.3.4")
            .with_csrf("tok");
        renderer
            .render(&mut out, "about.page.html", ctx, RequestDefaults::none())
            .unwrap();

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<main>John Doe from 1.2.3.4 [tok]</main>"
        );
    }

    #[test]
    fn test_caller_value_beats_session_default() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();

        let mut defaults = RequestDefaults::none();
        defaults
            .string_map
            .insert("remoteIP".to_string(), "5.6.7.8".to_string());
        defaults.csrf_token = Some("session-token".to_string());

        let ctx = RenderContext::new()
            .with_string("name", "John Doe")
            .with_string("remoteIP", "1.2.3.4");

        let mut out = Vec::new();
        renderer
            .render(&mut out, "about.page.html", ctx, defaults)
            .unwrap();

        let page = String::from_utf8(out).unwrap();
        assert!(page.contains("1.2.3.4"));
        assert!(!page.contains("5.6.7.8"));
        assert!(page.contains("[session-token]"));
    }

    #[test]
    fn test_failed_execution_writes_nothing() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();

        let mut sink = CountingSink::default();
        let ctx = RenderContext::new().with_string("name", "John Doe");
        let err = renderer
            .render(&mut sink, "strict.page.html", ctx, RequestDefaults::none())
            .unwrap_err();

        assert!(matches!(err, Error::RenderExecution { ref name, .. } if name == "strict.page.html"));
        assert_eq!(sink.bytes, 0);
    }

    #[test]
    fn test_unknown_template_in_static_cache() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();

        let mut sink = CountingSink::default();
        let err = renderer
            .render(&mut sink, "missing.page.html", RenderContext::new(), RequestDefaults::none())
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(ref name) if name == "missing.page.html"));
        assert_eq!(sink.bytes, 0);
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();

        let ctx = RenderContext::new()
            .with_string("name", "n")
            .with_string("remoteIP", "r")
            .with_csrf("t");
        let err = renderer
            .render(&mut BrokenSink, "about.page.html", ctx, RequestDefaults::none())
            .unwrap_err();
        assert!(matches!(err, Error::ResponseWrite(_)));
    }

    #[test]
    fn test_dynamic_mode_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "live.page.html", "v1");

        let renderer = Renderer::with_dynamic_cache(TemplateSource::new(dir.path()));
        assert!(!renderer.strategy().is_static());

        let mut first = Vec::new();
        renderer
            .render(&mut first, "live.page.html", RenderContext::new(), RequestDefaults::none())
            .unwrap();
        assert_eq!(first, b"v1");

        write(dir.path(), "live.page.html", "v2");
        let mut second = Vec::new();
        renderer
            .render(&mut second, "live.page.html", RenderContext::new(), RequestDefaults::none())
            .unwrap();
        assert_eq!(second, b"v2");
    }

    #[test]
    fn test_dynamic_mode_compile_error_is_execution_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "live.page.html", "fine");
        let renderer = Renderer::with_dynamic_cache(TemplateSource::new(dir.path()));

        write(dir.path(), "other.page.html", "{% for %}");
        let mut sink = CountingSink::default();
        let err = renderer
            .render(&mut sink, "live.page.html", RenderContext::new(), RequestDefaults::none())
            .unwrap_err();
        assert!(matches!(err, Error::RenderExecution { .. }));
        assert_eq!(sink.bytes, 0);
    }

    #[test]
    fn test_static_mode_build_failure_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "bad.page.html", "{{ unclosed");
        let err = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap_err();
        assert!(matches!(err, Error::CacheBuild { .. }));
    }

    #[test]
    fn test_render_page_injects_session_defaults() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path()))
            .unwrap()
            .with_csrf_token_length(20);

        let session = Session::new(SessionId::generate());
        session.insert("remoteIP", "10.1.1.1:9999").unwrap();

        let response = renderer
            .render_page(
                "about.page.html",
                RenderContext::new().with_string("name", "John Doe"),
                &session,
            )
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        let token: String = session.get("_csrf_token").unwrap();
        assert_eq!(token.len(), 20);
    }

    #[test]
    fn test_failed_render_page_keeps_flash_messages() {
        let dir = site();
        let renderer = Renderer::with_static_cache(&TemplateSource::new(dir.path())).unwrap();

        let session = Session::new(SessionId::generate());
        FlashMessages::push(&session, FlashMessage::success("Saved")).unwrap();

        let err = renderer
            .render_page("missing.page.html", RenderContext::new(), &session)
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
        assert_eq!(FlashMessages::peek(&session).len(), 1);

        renderer
            .render_page(
                "about.page.html",
                RenderContext::new()
                    .with_string("name", "John Doe")
                    .with_string("remoteIP", "1.2.3.4"),
                &session,
            )
            .unwrap();
        assert!(FlashMessages::peek(&session).is_empty());
    }
}
