//! Runtime page templates.
//!
//! Templates are plain files in one directory, using the minijinja (Jinja2)
//! syntax. Two naming conventions are recognised:
//!
//! - **page templates** (`*.page.html`): one renderable view each, keyed in
//!   the cache by file name;
//! - **layout fragments** (`*.layout.html`): shared partials compiled into
//!   every page, so pages can `{% extends %}` them or use their blocks.
//!
//! ```html
//! <!-- templates/base.layout.html -->
//! <!DOCTYPE html>
//! <html>
//!   <head><meta name="csrf-token" content="{{ csrf_token }}"></head>
//!   <body>{% block content %}{% endblock %}</body>
//! </html>
//!
//! <!-- templates/about.page.html -->
//! {% extends "base.layout.html" %}
//! {% block content %}<h1>{{ string_map.name }}</h1>{% endblock %}
//! ```
//!
//! ```rust,ignore
//! use quill::templates::{RenderContext, Renderer, TemplateSource};
//!
//! let renderer = Renderer::with_static_cache(&TemplateSource::new("./templates"))?;
//!
//! async fn about(State(state): State<AppState>, session: Session) -> Result<Response> {
//!     let ctx = RenderContext::new().with_string("name", "John Doe");
//!     state.renderer().render_page("about.page.html", ctx, &session)
//! }
//! ```

mod cache;
mod context;
mod renderer;
mod sink;

pub use cache::{CompiledTemplate, TemplateCache, TemplateSource};
pub use context::{RenderContext, RequestDefaults, AUTH_SESSION_KEY};
pub use renderer::{CacheStrategy, Renderer};
pub use sink::{HtmlSink, RenderSink};
