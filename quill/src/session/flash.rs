//! One-shot flash messages.
//!
//! A flash message is stored in the session by one request (typically a form
//! submission before a redirect) and consumed by the next page render, where
//! it surfaces as `flash`, `warning`, `error` or `success` in the template
//! context.
//!
//! ```rust,ignore
//! async fn save(session: Session) -> Result<Redirect> {
//!     FlashMessages::push(&session, FlashMessage::success("Saved"))?;
//!     Ok(Redirect::to("/"))
//! }
//! ```

use axum::{extract::FromRequestParts, http::request::Parts};
use serde::{Deserialize, Serialize};

use super::handle::Session;
use crate::error::{Error, Result};

const FLASH_SESSION_KEY: &str = "_flash_messages";

/// Flash message severity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Info,
    Warning,
    Error,
}

impl FlashKind {
    /// CSS class name for styling the message.
    #[must_use]
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Success => "flash-success",
            Self::Info => "flash-info",
            Self::Warning => "flash-warning",
            Self::Error => "flash-error",
        }
    }
}

/// A single flash message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlashMessage {
    pub kind: FlashKind,
    pub message: String,
}

impl FlashMessage {
    #[must_use]
    pub fn new(kind: FlashKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Success, message)
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Info, message)
    }

    #[must_use]
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Warning, message)
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(FlashKind::Error, message)
    }
}

/// Flash messages consumed from the session.
///
/// As an extractor it removes the pending messages, so a page that renders
/// them will not see them again on reload.
#[derive(Debug, Default)]
pub struct FlashMessages {
    messages: Vec<FlashMessage>,
}

impl FlashMessages {
    #[must_use]
    pub fn messages(&self) -> &[FlashMessage] {
        &self.messages
    }

    #[must_use]
    pub fn into_messages(self) -> Vec<FlashMessage> {
        self.messages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn by_kind(&self, kind: FlashKind) -> Vec<&FlashMessage> {
        self.messages.iter().filter(|m| m.kind == kind).collect()
    }

    /// Queue a message for the next render.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be stored in the session.
    pub fn push(session: &Session, message: FlashMessage) -> Result<()> {
        let mut messages: Vec<FlashMessage> = session.get(FLASH_SESSION_KEY).unwrap_or_default();
        messages.push(message);
        session
            .insert(FLASH_SESSION_KEY, &messages)
            .map_err(|e| Error::Session(format!("Failed to write flash messages: {e}")))
    }

    /// Remove and return every pending message, oldest first.
    pub fn take(session: &Session) -> Vec<FlashMessage> {
        session.pop(FLASH_SESSION_KEY).unwrap_or_default()
    }

    /// Pending messages, oldest first, left in the session.
    pub fn peek(session: &Session) -> Vec<FlashMessage> {
        session.get(FLASH_SESSION_KEY).unwrap_or_default()
    }

    /// Drop pending messages once they have been shown.
    pub fn discard(session: &Session) {
        session.remove(FLASH_SESSION_KEY);
    }
}

impl<S> FromRequestParts<S> for FlashMessages
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        let session = parts.extensions.get::<Session>().cloned().ok_or_else(|| {
            Error::Session("Session not found in request extensions for flash messages".to_string())
        })?;

        Ok(Self {
            messages: Self::take(&session),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionId;

    #[test]
    fn test_flash_message_constructors() {
        let success = FlashMessage::success("Done!");
        assert_eq!(success.kind, FlashKind::Success);
        assert_eq!(success.message, "Done!");

        let error = FlashMessage::error("Failed");
        assert_eq!(error.kind, FlashKind::Error);
    }

    #[test]
    fn test_flash_kind_css_class() {
        assert_eq!(FlashKind::Success.css_class(), "flash-success");
        assert_eq!(FlashKind::Error.css_class(), "flash-error");
        assert_eq!(FlashKind::Warning.css_class(), "flash-warning");
        assert_eq!(FlashKind::Info.css_class(), "flash-info");
    }

    #[test]
    fn test_push_then_take_consumes() {
        let session = Session::new(SessionId::generate());
        FlashMessages::push(&session, FlashMessage::info("one")).unwrap();
        FlashMessages::push(&session, FlashMessage::error("two")).unwrap();

        let taken = FlashMessages::take(&session);
        assert_eq!(taken, vec![FlashMessage::info("one"), FlashMessage::error("two")]);
        assert!(FlashMessages::take(&session).is_empty());
    }

    #[test]
    fn test_peek_leaves_messages_until_discarded() {
        let session = Session::new(SessionId::generate());
        FlashMessages::push(&session, FlashMessage::warning("Careful")).unwrap();

        assert_eq!(FlashMessages::peek(&session), vec![FlashMessage::warning("Careful")]);
        assert_eq!(FlashMessages::peek(&session).len(), 1);

        FlashMessages::discard(&session);
        assert!(FlashMessages::peek(&session).is_empty());
    }

    #[test]
    fn test_by_kind() {
        let messages = FlashMessages {
            messages: vec![
                FlashMessage::success("OK"),
                FlashMessage::error("Bad"),
                FlashMessage::success("Also OK"),
            ],
        };
        assert_eq!(messages.len(), 3);
        assert_eq!(messages.by_kind(FlashKind::Success).len(), 2);
    }
}
