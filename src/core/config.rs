use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct YahooProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub yahoo: Option<YahooProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            yahoo: Some(YahooProviderConfig {
                base_url: "https://query1.finance.yahoo.com".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_price_ttl")]
    pub price_ttl_secs: u64,
    #[serde(default = "default_rate_ttl")]
    pub rate_ttl_secs: u64,
    #[serde(default = "default_failure_ttl")]
    pub failure_ttl_secs: u64,
}

fn default_price_ttl() -> u64 {
    15 * 60
}

fn default_rate_ttl() -> u64 {
    60 * 60
}

fn default_failure_ttl() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            price_ttl_secs: default_price_ttl(),
            rate_ttl_secs: default_rate_ttl(),
            failure_ttl_secs: default_failure_ttl(),
        }
    }
}

fn default_timeout() -> u64 {
    4
}

const MIN_TIMEOUT_SECS: u64 = 1;

fn default_retries() -> usize {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_true")]
    pub notifications: bool,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            request_timeout_secs: default_timeout(),
            retries: default_retries(),
            notifications: true,
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the config from the default location, or built-in defaults when
    /// no file has been created yet.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "tierfolio", "tierfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "tierfolio", "tierfolio")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn yahoo_base_url(&self) -> &str {
        self.providers
            .yahoo
            .as_ref()
            .map_or("https://query1.finance.yahoo.com", |p| &p.base_url)
    }

    /// Per-call oracle timeout, never below one second.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(MIN_TIMEOUT_SECS))
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.price_ttl_secs)
    }

    pub fn rate_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.rate_ttl_secs)
    }

    pub fn failure_ttl(&self) -> Duration {
        Duration::from_secs(self.cache.failure_ttl_secs)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        if config.request_timeout_secs < MIN_TIMEOUT_SECS {
            warn!(
                "request_timeout_secs = {} in {}, using {}s",
                config.request_timeout_secs,
                path.as_ref().display(),
                MIN_TIMEOUT_SECS
            );
        }
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
providers:
  yahoo:
    base_url: "http://example.com/yahoo"
cache:
  price_ttl_secs: 60
request_timeout_secs: 2
notifications: false
data_path: "/tmp/tierfolio"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.yahoo_base_url(), "http://example.com/yahoo");
        assert_eq!(config.price_ttl(), Duration::from_secs(60));
        // Missing field inside a present section still falls back to its default
        assert_eq!(config.rate_ttl(), Duration::from_secs(3600));
        assert_eq!(config.request_timeout(), Duration::from_secs(2));
        assert_eq!(config.retries, 1);
        assert!(!config.notifications);
        assert_eq!(config.data_dir().unwrap(), PathBuf::from("/tmp/tierfolio"));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.yahoo_base_url(), "https://query1.finance.yahoo.com");
        assert_eq!(config.price_ttl(), Duration::from_secs(900));
        assert_eq!(config.rate_ttl(), Duration::from_secs(3600));
        assert_eq!(config.request_timeout(), Duration::from_secs(4));
        assert_eq!(config.failure_ttl(), Duration::from_secs(60));
        assert!(config.notifications);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let result = AppConfig::load_from_path("/nonexistent/tierfolio/config.yaml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    fn test_zero_timeout_is_raised_to_one_second() -> Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("config.yaml");
        fs::write(&path, "request_timeout_secs: 0\n")?;

        let config = AppConfig::load_from_path(&path)?;
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
        Ok(())
    }
}
