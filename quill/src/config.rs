//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: QUILL_, nested keys separated by `__`)
//! 2. Current working directory: ./config.toml
//! 3. XDG config directory: ~/.config/quill/{service_name}/config.toml
//! 4. System directory: /etc/quill/{service_name}/config.toml
//! 5. Default values

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::session::SessionConfig;
use crate::templates::TemplateSource;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Template cache configuration
    #[serde(default)]
    pub templates: TemplateConfig,

    /// Session and CSRF configuration
    #[serde(default)]
    pub session: SessionConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Environment (dev, staging, production)
    #[serde(default = "default_environment")]
    pub environment: String,
}

impl ServiceConfig {
    /// Whether the service runs in production mode.
    ///
    /// Production mode marks the session cookie `Secure`.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Template cache configuration
///
/// # Example
///
/// ```toml
/// [templates]
/// dir = "./templates"
/// use_cache = true
/// page_suffix = ".page.html"
/// layout_suffix = ".layout.html"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Directory holding page templates and layout fragments (not searched recursively)
    #[serde(default = "default_template_dir")]
    pub dir: PathBuf,

    /// Build the cache once at startup (`true`) or rebuild it on every render (`false`)
    ///
    /// Default: `true`
    #[serde(default = "default_true")]
    pub use_cache: bool,

    /// File name suffix identifying page templates
    #[serde(default = "default_page_suffix")]
    pub page_suffix: String,

    /// File name suffix identifying layout fragments
    #[serde(default = "default_layout_suffix")]
    pub layout_suffix: String,
}

impl TemplateConfig {
    /// The template source described by this configuration
    pub fn source(&self) -> TemplateSource {
        TemplateSource::new(&self.dir)
            .with_page_suffix(&self.page_suffix)
            .with_layout_suffix(&self.layout_suffix)
    }
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            dir: default_template_dir(),
            use_cache: default_true(),
            page_suffix: default_page_suffix(),
            layout_suffix: default_layout_suffix(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_true() -> bool {
    true
}

fn default_template_dir() -> PathBuf {
    PathBuf::from("./templates")
}

fn default_page_suffix() -> String {
    ".page.html".to_string()
}

fn default_layout_suffix() -> String {
    ".layout.html".to_string()
}

impl Config {
    /// Load configuration from all sources
    ///
    /// The service name is inferred from the binary name.
    pub fn load() -> Result<Self> {
        let service_name = std::env::current_exe()
            .ok()
            .and_then(|p| p.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "quill".to_string());

        Self::load_for_service(&service_name)
    }

    /// Load configuration for a specific service name
    pub fn load_for_service(service_name: &str) -> Result<Self> {
        let config_paths = Self::find_config_paths(service_name);

        tracing::debug!("Searching for config files in order:");
        for path in &config_paths {
            tracing::debug!("  - {}", path.display());
        }

        let mut defaults = Config::default();
        defaults.service.name = service_name.to_string();

        let mut figment = Figment::new().merge(Serialized::defaults(defaults));

        // Lowest priority first so that higher priority files override
        for path in config_paths.iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        figment = figment.merge(Env::prefixed("QUILL_").split("__"));

        let config = figment.extract()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    ///
    /// This bypasses XDG directories and loads directly from the given path.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("QUILL_").split("__"))
            .extract()?;

        Ok(config)
    }

    /// Find all possible config file paths for a service, highest priority first
    fn find_config_paths(service_name: &str) -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("config.toml")];

        let xdg_dirs = xdg::BaseDirectories::with_prefix("quill");
        if let Some(path) = xdg_dirs.find_config_file(Path::new(service_name).join("config.toml")) {
            paths.push(path);
        }

        paths.push(PathBuf::from("/etc/quill").join(service_name).join("config.toml"));

        paths
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: "quill".to_string(),
                port: default_port(),
                log_level: default_log_level(),
                environment: default_environment(),
            },
            templates: TemplateConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service.port, 8080);
        assert_eq!(config.service.log_level, "info");
        assert!(!config.service.is_production());
        assert!(config.templates.use_cache);
        assert_eq!(config.templates.page_suffix, ".page.html");
        assert_eq!(config.session.expiry_secs, 86400);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[service]
name = "coffee-shop"
port = 9000
environment = "production"

[templates]
dir = "/srv/templates"
use_cache = false

[session]
cookie_name = "sid"
expiry_secs = 60

[session.csrf]
header_name = "X-Token"
"#
        )
        .unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.service.name, "coffee-shop");
        assert_eq!(config.service.port, 9000);
        assert!(config.service.is_production());
        assert_eq!(config.templates.dir, PathBuf::from("/srv/templates"));
        assert!(!config.templates.use_cache);
        assert_eq!(config.templates.layout_suffix, ".layout.html");
        assert_eq!(config.session.cookie_name, "sid");
        assert_eq!(config.session.expiry_secs, 60);
        assert_eq!(config.session.csrf.header_name, "X-Token");
        assert!(config.session.csrf.enabled);
    }

    #[test]
    fn test_template_source_from_config() {
        let config = TemplateConfig {
            dir: PathBuf::from("views"),
            page_suffix: ".page.tmpl".to_string(),
            ..TemplateConfig::default()
        };
        let source = config.source();
        assert_eq!(source.dir(), Path::new("views"));
        assert_eq!(source.page_suffix(), ".page.tmpl");
        assert_eq!(source.layout_suffix(), ".layout.html");
    }
}
