use serde::{Deserialize, Serialize};
use std::env;

/// Process-wide configuration, loaded once at startup and shared read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub keap: KeapConfig,
    pub proxy: ProxyConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    /// Path the proxy routes are mounted under, normalized to `/segment` form
    /// (or empty for the root).
    pub mount_path: String,
}

/// Upstream Keap endpoints and OAuth client credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeapConfig {
    pub api_base_url: Option<String>,
    pub xmlrpc_url: Option<String>,
    pub token_url: Option<String>,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub enable_request_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

/// A configuration problem found by [`AppConfig::issues`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub key: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

pub const DEFAULT_MOUNT_PATH: &str = "/api/keap";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source. Empty
    /// values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let environment = match var("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        let mut config = match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        };

        // Upstream Keap
        config.keap.api_base_url = var("KEAP_API_BASE_URL");
        config.keap.xmlrpc_url = var("KEAP_XMLRPC_URL");
        config.keap.token_url = var("KEAP_TOKEN_URL");
        config.keap.client_id = var("KEAP_CLIENT_ID").unwrap_or_default();
        config.keap.client_secret = var("KEAP_CLIENT_SECRET").unwrap_or_default();
        config.keap.redirect_uri = var("KEAP_REDIRECT_URI").unwrap_or_default();

        // Server
        if let Some(v) = var("KEAP_PROXY_PORT").or_else(|| var("PORT")) {
            config.server.port = v.parse().unwrap_or(config.server.port);
        }
        if let Some(v) = var("KEAP_PROXY_MOUNT") {
            config.server.mount_path = normalize_mount_path(&v);
        }

        // Proxy
        if let Some(v) = var("KEAP_PROXY_TIMEOUT_SECS") {
            config.proxy.timeout_secs = v.parse().unwrap_or(config.proxy.timeout_secs);
        }
        if let Some(v) = var("KEAP_PROXY_USER_AGENT") {
            config.proxy.user_agent = v;
        }
        if let Some(v) = var("API_ENABLE_REQUEST_LOGGING") {
            config.proxy.enable_request_logging = v.parse().unwrap_or(config.proxy.enable_request_logging);
        }

        // Database
        config.database.url = var("DATABASE_URL");
        if let Some(v) = var("DATABASE_MAX_CONNECTIONS") {
            config.database.max_connections = v.parse().unwrap_or(config.database.max_connections);
        }
        if let Some(v) = var("DATABASE_CONNECTION_TIMEOUT") {
            config.database.connection_timeout = v.parse().unwrap_or(config.database.connection_timeout);
        }

        config
    }

    /// Reports missing or malformed settings. None of these stop the server:
    /// a missing upstream URL only surfaces when a request needs it.
    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        let urls = [
            ("KEAP_API_BASE_URL", &self.keap.api_base_url, Severity::Error),
            ("KEAP_XMLRPC_URL", &self.keap.xmlrpc_url, Severity::Error),
            ("KEAP_TOKEN_URL", &self.keap.token_url, Severity::Warning),
        ];
        for (key, value, missing_severity) in urls {
            match value {
                None => issues.push(ConfigIssue {
                    severity: missing_severity,
                    key,
                    message: format!("{} is not set", key),
                }),
                Some(raw) => {
                    if let Err(e) = url::Url::parse(raw) {
                        issues.push(ConfigIssue {
                            severity: Severity::Error,
                            key,
                            message: format!("{} is not a valid URL ({}): {}", key, e, raw),
                        });
                    }
                }
            }
        }

        let credentials = [
            ("KEAP_CLIENT_ID", &self.keap.client_id),
            ("KEAP_CLIENT_SECRET", &self.keap.client_secret),
            ("KEAP_REDIRECT_URI", &self.keap.redirect_uri),
        ];
        for (key, value) in credentials {
            if value.is_empty() {
                issues.push(ConfigIssue {
                    severity: Severity::Warning,
                    key,
                    message: format!("{} is not set; token exchange will be rejected upstream", key),
                });
            }
        }

        if self.database.url.is_none() {
            issues.push(ConfigIssue {
                severity: Severity::Warning,
                key: "DATABASE_URL",
                message: "DATABASE_URL is not set; webhook ingestion is disabled".to_string(),
            });
        }

        issues
    }

    /// Logs every configuration issue at its severity.
    pub fn log_issues(&self) {
        for issue in self.issues() {
            match issue.severity {
                Severity::Error => tracing::error!(key = issue.key, "{}", issue.message),
                Severity::Warning => tracing::warn!(key = issue.key, "{}", issue.message),
            }
        }
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig::default(),
            keap: KeapConfig::default(),
            proxy: ProxyConfig {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                user_agent: default_user_agent(),
                enable_request_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                connection_timeout: 30,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig::default(),
            keap: KeapConfig::default(),
            proxy: ProxyConfig {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                user_agent: default_user_agent(),
                enable_request_logging: true,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                connection_timeout: 10,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig::default(),
            keap: KeapConfig::default(),
            proxy: ProxyConfig {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
                user_agent: default_user_agent(),
                enable_request_logging: false,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 1,
                connection_timeout: 5,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::development()
    }
}

fn default_user_agent() -> String {
    format!("keap-proxy/{}", env!("CARGO_PKG_VERSION"))
}

/// `api/keap/` -> `/api/keap`, `/` -> ``
pub fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> AppConfig {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_default_development_config() {
        let config = config_from(&[]);
        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.server.mount_path, "/api/keap");
        assert_eq!(config.proxy.timeout_secs, 30);
        assert_eq!(config.database.max_connections, 1);
        assert!(config.proxy.enable_request_logging);
    }

    #[test]
    fn test_production_preset_with_overrides() {
        let config = config_from(&[
            ("APP_ENV", "prod"),
            ("KEAP_API_BASE_URL", "https://api.infusionsoft.com/crm/rest"),
            ("KEAP_PROXY_TIMEOUT_SECS", "12"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("PORT", "8080"),
        ]);
        assert_eq!(config.environment, Environment::Production);
        assert!(!config.proxy.enable_request_logging);
        assert_eq!(config.keap.api_base_url.as_deref(), Some("https://api.infusionsoft.com/crm/rest"));
        assert_eq!(config.proxy.timeout_secs, 12);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config_from(&[("KEAP_XMLRPC_URL", "   "), ("KEAP_PROXY_TIMEOUT_SECS", "abc")]);
        assert!(config.keap.xmlrpc_url.is_none());
        assert_eq!(config.proxy.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn test_missing_base_urls_are_errors() {
        let issues = config_from(&[]).issues();
        let errors: Vec<_> = issues.iter().filter(|i| i.severity == Severity::Error).map(|i| i.key).collect();
        assert_eq!(errors, vec!["KEAP_API_BASE_URL", "KEAP_XMLRPC_URL"]);
    }

    #[test]
    fn test_invalid_url_reported() {
        let issues = config_from(&[
            ("KEAP_API_BASE_URL", "not a url"),
            ("KEAP_XMLRPC_URL", "https://api.infusionsoft.com/crm/xmlrpc/v1"),
        ])
        .issues();
        assert!(issues.iter().any(|i| i.key == "KEAP_API_BASE_URL" && i.message.contains("not a valid URL")));
        assert!(!issues.iter().any(|i| i.key == "KEAP_XMLRPC_URL"));
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("api/keap/"), "/api/keap");
        assert_eq!(normalize_mount_path("/proxy"), "/proxy");
        assert_eq!(normalize_mount_path("/"), "");
        assert_eq!(normalize_mount_path(""), "");
    }
}
