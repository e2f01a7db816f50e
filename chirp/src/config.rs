use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ConfigError;

const DEFAULT_BASE_URL: &str = "http://localhost:4000";

/// Configuration stored in `~/.chirp/config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChirpConfig {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            version: default_version(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "${CHIRP_API_URL}".to_string()
}

fn default_version() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    30
}

impl ApiSettings {
    /// Base URL with environment variables expanded.
    ///
    /// The default `${CHIRP_API_URL}` falls back to the local dev server when unset.
    pub fn resolved_base_url(&self) -> Result<String, ConfigError> {
        match expand_env(&self.base_url) {
            Err(ConfigError::MissingEnv(_)) if self.base_url == default_base_url() => {
                Ok(DEFAULT_BASE_URL.to_string())
            }
            other => other,
        }
    }

    /// Versioned API root, always ending in `/` so resources join beneath it.
    pub fn endpoint(&self) -> Result<Url, ConfigError> {
        let base = self.resolved_base_url()?;
        let raw = format!("{}/api/v{}/", base.trim_end_matches('/'), self.version);
        Url::parse(&raw).map_err(|source| ConfigError::BaseUrl { url: raw, source })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSettings {
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_delay_ms")]
    pub max_reconnect_delay_ms: u64,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_delay_ms: default_max_reconnect_delay_ms(),
        }
    }
}

fn default_reconnect_delay_ms() -> u64 {
    1_000
}

fn default_max_reconnect_delay_ms() -> u64 {
    30_000
}

impl StreamSettings {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn max_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.max_reconnect_delay_ms.max(self.reconnect_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_stale_time_secs")]
    pub stale_time_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            stale_time_secs: default_stale_time_secs(),
        }
    }
}

fn default_stale_time_secs() -> u64 {
    60
}

impl CacheSettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_secs(self.stale_time_secs)
    }
}

impl ChirpConfig {
    /// Loads `path`, or defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// `~/.chirp`, or `./.chirp` when no home directory is known.
    pub fn home_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chirp")
    }

    /// Config path from `explicit`, then `CHIRP_CONFIG`, then `~/.chirp/config.toml`.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Some(path) = std::env::var_os("CHIRP_CONFIG") {
            return PathBuf::from(path);
        }
        Self::home_dir().join("config.toml")
    }
}

/// Expands a whole-value `${VAR}` reference.
pub fn expand_env(value: &str) -> Result<String, ConfigError> {
    if value.starts_with("${") && value.ends_with('}') {
        let var_name = &value[2..value.len() - 1];
        std::env::var(var_name).map_err(|_| ConfigError::MissingEnv(var_name.to_string()))
    } else {
        Ok(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = ChirpConfig::default();
        assert_eq!(config.api.base_url, "${CHIRP_API_URL}");
        assert_eq!(config.api.version, 1);
        assert_eq!(config.stream.reconnect_delay_ms, 1_000);
        assert_eq!(config.cache.stale_time_secs, 60);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = ChirpConfig::parse("[api]\nbase_url = \"https://chirp.example\"\n", Path::new("x.toml"))
            .expect("parse");
        assert_eq!(config.api.base_url, "https://chirp.example");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(
            config.api.endpoint().expect("endpoint").as_str(),
            "https://chirp.example/api/v1/"
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ChirpConfig::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.api.version, 1);
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\n").expect("write");
        assert!(matches!(ChirpConfig::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    #[serial]
    fn test_env_expansion() {
        // SAFETY: serialised with the other env tests.
        unsafe { std::env::set_var("CHIRP_API_URL", "https://api.chirp.test/") };
        let settings = ApiSettings::default();
        assert_eq!(
            settings.endpoint().expect("endpoint").as_str(),
            "https://api.chirp.test/api/v1/"
        );
        unsafe { std::env::remove_var("CHIRP_API_URL") };
        assert_eq!(
            settings.endpoint().expect("endpoint").as_str(),
            "http://localhost:4000/api/v1/"
        );
    }

    #[test]
    #[serial]
    fn test_explicit_env_reference_must_exist() {
        unsafe { std::env::remove_var("CHIRP_TEST_MISSING") };
        let settings = ApiSettings {
            base_url: "${CHIRP_TEST_MISSING}".to_string(),
            ..ApiSettings::default()
        };
        assert!(matches!(settings.endpoint(), Err(ConfigError::MissingEnv(name)) if name == "CHIRP_TEST_MISSING"));
    }
}
