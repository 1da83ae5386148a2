//! Session configuration types.

use serde::{Deserialize, Serialize};

/// Session configuration.
///
/// Configure cookie settings and the lifetime window of session records.
///
/// # Example
///
/// ```toml
/// [session]
/// cookie_name = "session_id"
/// expiry_secs = 86400
/// http_only = true
/// same_site = "lax"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session cookie name.
    ///
    /// Default: `"session_id"`
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Lifetime window in seconds.
    ///
    /// A record that is not renewed by a request within this window is
    /// treated as absent on its next access.
    ///
    /// Default: `86400` (24 hours)
    #[serde(default = "default_expiry_secs")]
    pub expiry_secs: u64,

    /// Keep the cookie across browser restarts (`Max-Age` is set).
    ///
    /// Default: `true`
    #[serde(default = "default_true")]
    pub persistent: bool,

    /// Cookie path.
    ///
    /// Default: `"/"`
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Cookie domain (optional).
    ///
    /// If not set, defaults to the request's domain.
    #[serde(default)]
    pub cookie_domain: Option<String>,

    /// Secure cookie flag (HTTPS only).
    ///
    /// When unset, the flag follows the service environment: `Secure` in
    /// production, plain elsewhere.
    #[serde(default)]
    pub secure: Option<bool>,

    /// HttpOnly cookie flag.
    ///
    /// Default: `true`
    #[serde(default = "default_true")]
    pub http_only: bool,

    /// SameSite cookie policy: `"strict"`, `"lax"` or `"none"`.
    ///
    /// Default: `"lax"`
    #[serde(default = "default_same_site")]
    pub same_site: String,

    /// CSRF protection configuration.
    #[serde(default)]
    pub csrf: CsrfConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            expiry_secs: default_expiry_secs(),
            persistent: default_true(),
            cookie_path: default_cookie_path(),
            cookie_domain: None,
            secure: None,
            http_only: default_true(),
            same_site: default_same_site(),
            csrf: CsrfConfig::default(),
        }
    }
}

/// CSRF protection configuration.
///
/// # Example
///
/// ```toml
/// [session.csrf]
/// enabled = true
/// token_length = 32
/// header_name = "X-CSRF-Token"
/// form_field_name = "csrf_token"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsrfConfig {
    /// Enable CSRF protection.
    ///
    /// Default: `true`
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// CSRF token length in characters.
    ///
    /// Default: `32`
    #[serde(default = "default_token_length")]
    pub token_length: usize,

    /// HTTP header name for CSRF token.
    ///
    /// Default: `"X-CSRF-Token"`
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Form field name for CSRF token.
    ///
    /// Default: `"csrf_token"`
    #[serde(default = "default_form_field_name")]
    pub form_field_name: String,

    /// HTTP methods that skip CSRF validation (safe methods).
    ///
    /// Default: `["GET", "HEAD", "OPTIONS", "TRACE"]`
    #[serde(default = "default_safe_methods")]
    pub safe_methods: Vec<String>,

    /// Largest urlencoded form body inspected for the token, in bytes.
    ///
    /// Default: `65536`
    #[serde(default = "default_max_form_bytes")]
    pub max_form_bytes: usize,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            token_length: default_token_length(),
            header_name: default_header_name(),
            form_field_name: default_form_field_name(),
            safe_methods: default_safe_methods(),
            max_form_bytes: default_max_form_bytes(),
        }
    }
}

// Default value functions
fn default_cookie_name() -> String {
    "session_id".to_string()
}

fn default_expiry_secs() -> u64 {
    86400 // 24 hours
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_same_site() -> String {
    "lax".to_string()
}

fn default_token_length() -> usize {
    32
}

fn default_header_name() -> String {
    "X-CSRF-Token".to_string()
}

fn default_form_field_name() -> String {
    "csrf_token".to_string()
}

fn default_safe_methods() -> Vec<String> {
    vec![
        "GET".to_string(),
        "HEAD".to_string(),
        "OPTIONS".to_string(),
        "TRACE".to_string(),
    ]
}

fn default_max_form_bytes() -> usize {
    64 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.cookie_name, "session_id");
        assert_eq!(config.expiry_secs, 86400);
        assert!(config.persistent);
        assert!(config.secure.is_none());
        assert!(config.http_only);
        assert_eq!(config.same_site, "lax");
    }

    #[test]
    fn test_csrf_config_defaults() {
        let config = CsrfConfig::default();
        assert!(config.enabled);
        assert_eq!(config.token_length, 32);
        assert_eq!(config.header_name, "X-CSRF-Token");
        assert_eq!(config.form_field_name, "csrf_token");
        assert!(config.safe_methods.contains(&"GET".to_string()));
        assert!(!config.safe_methods.contains(&"POST".to_string()));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"cookie_name": "sid", "csrf": {"enabled": false}}"#).unwrap();
        assert_eq!(config.cookie_name, "sid");
        assert_eq!(config.expiry_secs, 86400);
        assert!(!config.csrf.enabled);
        assert_eq!(config.csrf.token_length, 32);
    }
}
