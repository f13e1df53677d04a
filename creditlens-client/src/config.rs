//! Configuration loading for the CreditLens client.
//!
//! All fields are required unless explicitly marked optional.

use creditlens_core::CompanyId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::tabs::Tab;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV_VAR: &str = "CREDITLENS_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    /// Company opened on start when nothing valid was persisted.
    #[serde(default)]
    pub default_company: Option<CompanyId>,
    pub default_tab: Tab,
    pub persistence_path: PathBuf,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset.
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or CREDITLENS_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args(std::env::args().skip(1)).or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(company) = &self.default_company {
            if company.as_str().trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "default_company",
                    reason: "must not be blank".to_string(),
                });
            }
        }
        if self.persistence_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "persistence_path",
                reason: "must not be empty".to_string(),
            });
        }
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "log.filter",
                reason: "must not be empty".to_string(),
            });
        }
        if let Err(err) = tracing_subscriber::EnvFilter::try_new(&self.log.filter) {
            return Err(ConfigError::InvalidValue {
                field: "log.filter",
                reason: err.to_string(),
            });
        }
        Ok(())
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
        if let Some(path) = arg.strip_prefix("--config=") {
            return Some(PathBuf::from(path));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
api_base_url = "http://localhost:8000"
request_timeout_ms = 30000
default_company = "acme"
default_tab = "overview"
persistence_path = "tmp/creditlens.json"

[log]
filter = "creditlens_client=info,warn"
json = true
"#;

    #[test]
    fn test_parses_valid_config() {
        let config = ClientConfig::from_toml(VALID).unwrap();
        assert_eq!(config.default_company, Some(CompanyId::new("acme")));
        assert_eq!(config.default_tab, Tab::Overview);
        assert!(config.log.json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_fields() {
        let contents = VALID.replace("[log]", "theme = \"dark\"\n\n[log]");
        assert!(matches!(
            ClientConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let mut config = ClientConfig::from_toml(VALID).unwrap();
        config.request_timeout_ms = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_non_http_base_url() {
        let mut config = ClientConfig::from_toml(VALID).unwrap();
        config.api_base_url = "localhost:8000".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "api_base_url",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_bad_log_filter() {
        let mut config = ClientConfig::from_toml(VALID).unwrap();
        config.log.filter = "creditlens=verbose".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue {
                field: "log.filter",
                ..
            })
        ));
    }

    #[test]
    fn test_config_path_from_args() {
        let args = vec!["--config".to_string(), "a.toml".to_string()];
        assert_eq!(config_path_from_args(args), Some(PathBuf::from("a.toml")));
        let args = vec!["--config=b.toml".to_string()];
        assert_eq!(config_path_from_args(args), Some(PathBuf::from("b.toml")));
        assert_eq!(config_path_from_args(Vec::<String>::new()), None);
    }

    #[test]
    fn test_default_company_is_optional() {
        let contents = VALID.replace("default_company = \"acme\"\n", "");
        let config = ClientConfig::from_toml(&contents).unwrap();
        assert!(config.default_company.is_none());
    }
}
