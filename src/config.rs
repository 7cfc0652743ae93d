//! Configuration management
//!
//! Settings come from an optional TOML file layered under `NETGEAR_*`
//! environment variables (`NETGEAR_ROUTER__PASSWORD=...`). Every field has a
//! default, so an empty configuration is valid and means "discover the router
//! and log in as admin".

use crate::error::Result;
use crate::session::{parse_login_method, LoginMethod};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub router: RouterConfig,
    pub http: HttpConfig,
    pub discovery: DiscoveryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RouterConfig {
    /// Router address; discovered when unset
    #[serde(default)]
    pub host: Option<String>,

    /// SOAP port; probed when unset
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub tls: bool,

    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// `auto`, `modern` or `legacy`
    #[serde(default = "default_login_method")]
    pub login_method: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            tls: false,
            username: default_username(),
            password: String::new(),
            login_method: default_login_method(),
        }
    }
}

impl RouterConfig {
    /// The pinned login method, or `None` for auto
    pub fn login_method(&self) -> std::result::Result<Option<LoginMethod>, String> {
        parse_login_method(&self.login_method)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Requests allowed to start per second; 0 means unlimited
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: usize,

    #[serde(default = "default_accept_invalid_certs")]
    pub accept_invalid_certs: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            requests_per_second: default_requests_per_second(),
            accept_invalid_certs: default_accept_invalid_certs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    #[serde(default = "default_hostname")]
    pub hostname: String,

    /// Per-host timeout of the subnet scan, in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            hostname: default_hostname(),
            probe_timeout: default_probe_timeout(),
            concurrency: default_concurrency(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_username() -> String {
    "admin".to_string()
}

fn default_login_method() -> String {
    "auto".to_string()
}

fn default_timeout() -> u64 {
    18
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_requests_per_second() -> usize {
    3
}

fn default_accept_invalid_certs() -> bool {
    true
}

fn default_hostname() -> String {
    crate::discovery::ROUTER_HOSTNAME.to_string()
}

fn default_probe_timeout() -> u64 {
    3
}

fn default_concurrency() -> usize {
    64
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("config.toml"),
        PathBuf::from("/etc/netgear/config.toml"),
    ];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".config/netgear/config.toml"));
    }
    paths
}

impl Config {
    /// Load `path` (which must exist) or the first default location found,
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        match path {
            Some(path) => {
                tracing::debug!("Loading config from: {}", path.display());
                builder = builder.add_source(config::File::from(path).required(true));
            }
            None => match default_paths().into_iter().find(|p| p.exists()) {
                Some(found) => {
                    tracing::debug!("Loading config from: {}", found.display());
                    builder = builder.add_source(config::File::from(found));
                }
                None => tracing::debug!("No config file found, using defaults"),
            },
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("NETGEAR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.router.username, "admin");
        assert_eq!(cfg.router.login_method(), Ok(None));
        assert_eq!(cfg.http.timeout, 18);
        assert_eq!(cfg.http.requests_per_second, 3);
        assert!(cfg.http.accept_invalid_certs);
        assert_eq!(cfg.discovery.hostname, "routerlogin.net");
        assert_eq!(cfg.discovery.probe_timeout, 3);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn test_load_file_with_partial_sections() {
        let path = std::env::temp_dir().join(format!("netgear-config-{}.toml", std::process::id()));
        std::fs::write(
            &path,
            "[router]\nhost = \"192.168.1.1\"\nport = 5000\npassword = \"pw\"\nlogin_method = \"legacy\"\n\n[http]\ntimeout = 30\n",
        )
        .unwrap();

        let cfg = Config::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(cfg.router.host.as_deref(), Some("192.168.1.1"));
        assert_eq!(cfg.router.port, Some(5000));
        assert_eq!(cfg.router.username, "admin");
        assert_eq!(cfg.router.login_method(), Ok(Some(LoginMethod::Legacy)));
        assert_eq!(cfg.http.timeout, 30);
        assert_eq!(cfg.http.connect_timeout, 5);
        assert_eq!(cfg.discovery.concurrency, 64);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let path = std::env::temp_dir().join("netgear-config-does-not-exist.toml");
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_bad_login_method() {
        let cfg = Config {
            router: RouterConfig {
                login_method: "kerberos".into(),
                ..RouterConfig::default()
            },
            ..Config::default()
        };
        assert!(cfg.router.login_method().is_err());
    }
}
