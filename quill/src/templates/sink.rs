//! Destinations for rendered pages.

use std::io;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

/// Anything that can receive one fully rendered page.
///
/// The renderer calls [`write_page`](RenderSink::write_page) at most once per
/// render, and only after the template executed successfully.
pub trait RenderSink {
    fn write_page(&mut self, content_type: &str, body: &[u8]) -> io::Result<()>;
}

impl RenderSink for Vec<u8> {
    fn write_page(&mut self, _content_type: &str, body: &[u8]) -> io::Result<()> {
        self.extend_from_slice(body);
        Ok(())
    }
}

/// Sink that collects a page and turns it into an HTTP response.
#[derive(Debug)]
pub struct HtmlSink {
    status: StatusCode,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl HtmlSink {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            content_type: None,
            body: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

impl Default for HtmlSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderSink for HtmlSink {
    fn write_page(&mut self, content_type: &str, body: &[u8]) -> io::Result<()> {
        self.content_type = Some(content_type.to_string());
        self.body.extend_from_slice(body);
        Ok(())
    }
}

impl IntoResponse for HtmlSink {
    fn into_response(self) -> Response {
        let content_type = self
            .content_type
            .as_deref()
            .and_then(|ct| HeaderValue::from_str(ct).ok())
            .unwrap_or_else(|| HeaderValue::from_static("text/html; charset=utf-8"));

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, content_type);
        response
    }
}

/// Content type for a template, derived from its file extension.
pub(crate) fn content_type_for(name: &str) -> &'static str {
    match name.rsplit('.').next() {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("xml") => "application/xml",
        Some("json") => "application/json",
        _ => "text/plain; charset=utf-8",
    }
}
