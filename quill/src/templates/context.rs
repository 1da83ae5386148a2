//! Render context passed to page templates.
//!
//! A [`RenderContext`] is what a handler hands to the renderer. Before
//! execution the renderer merges [`RequestDefaults`] into it; defaults only
//! fill gaps and never replace a value the handler supplied.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::session::{CsrfToken, FlashKind, FlashMessages, Session};

/// Session key whose presence marks the visitor as logged in.
pub const AUTH_SESSION_KEY: &str = "user_id";

/// Data available to a page template.
///
/// Templates see the field names as-is, e.g. `{{ string_map.name }}` or
/// `{{ csrf_token }}`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RenderContext {
    pub string_map: HashMap<String, String>,
    pub int_map: HashMap<String, i64>,
    pub float_map: HashMap<String, f64>,
    /// Arbitrary structured values.
    pub data: HashMap<String, serde_json::Value>,
    pub csrf_token: Option<String>,
    pub flash: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub is_authenticated: bool,
    /// Path of the request being rendered, for navigation highlighting.
    pub current_path: Option<String>,
}

impl RenderContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.string_map.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_int(mut self, key: impl Into<String>, value: i64) -> Self {
        self.int_map.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_float(mut self, key: impl Into<String>, value: f64) -> Self {
        self.float_map.insert(key.into(), value);
        self
    }

    /// Add a structured value under `data.<key>`.
    ///
    /// # Errors
    ///
    /// Fails if `value` cannot be represented as JSON.
    pub fn with_data(mut self, key: impl Into<String>, value: impl Serialize) -> Result<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| Error::Internal(format!("Unserializable template data: {e}")))?;
        self.data.insert(key.into(), value);
        Ok(self)
    }

    #[must_use]
    pub fn with_csrf(mut self, token: impl Into<String>) -> Self {
        self.csrf_token = Some(token.into());
        self
    }

    #[must_use]
    pub fn with_flash(mut self, message: impl Into<String>) -> Self {
        self.flash = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_warning(mut self, message: impl Into<String>) -> Self {
        self.warning = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success = Some(message.into());
        self
    }

    #[must_use]
    pub fn with_current_path(mut self, path: impl Into<String>) -> Self {
        self.current_path = Some(path.into());
        self
    }

    /// Fill every field the caller left unset from `defaults`.
    ///
    /// Keys already present in `string_map` keep the caller's value.
    pub fn merge_defaults(&mut self, defaults: RequestDefaults) {
        for (key, value) in defaults.string_map {
            self.string_map.entry(key).or_insert(value);
        }

        fill(&mut self.csrf_token, defaults.csrf_token);
        fill(&mut self.flash, defaults.flash);
        fill(&mut self.warning, defaults.warning);
        fill(&mut self.error, defaults.error);
        fill(&mut self.success, defaults.success);
        fill(&mut self.current_path, defaults.current_path);

        self.is_authenticated |= defaults.is_authenticated;
    }
}

fn fill(slot: &mut Option<String>, default: Option<String>) {
    if slot.is_none() {
        *slot = default;
    }
}

/// Request-scoped values injected into every render.
#[derive(Debug, Clone, Default)]
pub struct RequestDefaults {
    pub string_map: HashMap<String, String>,
    pub csrf_token: Option<String>,
    pub flash: Option<String>,
    pub warning: Option<String>,
    pub error: Option<String>,
    pub success: Option<String>,
    pub is_authenticated: bool,
    pub current_path: Option<String>,
}

impl RequestDefaults {
    /// No defaults at all; rendering outside of a request.
    pub fn none() -> Self {
        Self::default()
    }

    /// Derive defaults from the visitor's session.
    ///
    /// Ensures the session carries a CSRF token, reads pending flash
    /// messages without removing them and offers every public string entry (keys not starting with
    /// `_`) to the template's `string_map`.
    pub fn from_session(session: &Session, csrf_token_length: usize) -> Result<Self> {
        let mut defaults = Self {
            csrf_token: Some(CsrfToken::get_or_create(session, csrf_token_length)?.token().to_string()),
            is_authenticated: session.contains(AUTH_SESSION_KEY),
            ..Self::default()
        };

        for message in FlashMessages::peek(session) {
            let slot = match message.kind {
                FlashKind::Info => &mut defaults.flash,
                FlashKind::Warning => &mut defaults.warning,
                FlashKind::Error => &mut defaults.error,
                FlashKind::Success => &mut defaults.success,
            };
            // Newest message of each kind wins
            *slot = Some(message.message);
        }

        defaults.string_map = session
            .string_entries()
            .into_iter()
            .filter(|(key, _)| !key.starts_with('_'))
            .collect();

        Ok(defaults)
    }
}
