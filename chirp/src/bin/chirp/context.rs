use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chirp::{Chirp, ChirpConfig, MemoryTokenStore, StaticNavigator, TokenStore};
use serde::{Deserialize, Serialize};

/// Login state persisted in `~/.chirp/session.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Cookie header for the refresh endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
}

impl SessionFile {
    fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).context("Failed to read session.toml")?;
        toml::from_str(&content).context("Failed to parse session.toml")
    }

    fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.cookies.is_none()
    }
}

/// Everything a command needs: loaded config, the client, and where the session lives.
pub struct SessionContext {
    pub config_path: PathBuf,
    pub session_path: PathBuf,
    pub chirp: Chirp,
    tokens: Arc<MemoryTokenStore>,
}

impl SessionContext {
    pub fn open(explicit_config: Option<&Path>) -> Result<Self> {
        let config_path = ChirpConfig::locate(explicit_config);
        let config = ChirpConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?;
        let session_path = config_path
            .parent()
            .map(|dir| dir.join("session.toml"))
            .unwrap_or_else(|| ChirpConfig::home_dir().join("session.toml"));
        let session = SessionFile::load(&session_path)?;

        let tokens = Arc::new(MemoryTokenStore::new(session.access_token.clone()));
        let chirp = Chirp::new(&config, tokens.clone(), Arc::new(StaticNavigator::new("chirp")))
            .context("Failed to build API client")?;
        if let Some(cookies) = &session.cookies {
            chirp.api().restore_cookies(cookies)?;
        }
        log::debug!("session from {}", session_path.display());

        Ok(Self {
            config_path,
            session_path,
            chirp,
            tokens,
        })
    }

    /// Writes the current token and refresh cookie, or removes the file when both are gone.
    pub fn save(&self) -> Result<()> {
        let session = SessionFile {
            access_token: self.tokens.access_token(),
            cookies: self.chirp.api().session_cookies(),
        };
        if session.is_empty() {
            return self.clear();
        }
        if let Some(dir) = self.session_path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let content = toml::to_string_pretty(&session)?;
        std::fs::write(&self.session_path, content).context("Failed to write session.toml")
    }

    pub fn clear(&self) -> Result<()> {
        if self.session_path.exists() {
            std::fs::remove_file(&self.session_path).context("Failed to remove session.toml")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.toml");
        let session = SessionFile {
            access_token: Some("tok".to_string()),
            cookies: Some("refresh=abc".to_string()),
        };
        std::fs::write(&path, toml::to_string_pretty(&session).unwrap()).unwrap();
        let loaded = SessionFile::load(&path).unwrap();
        assert_eq!(loaded.access_token.as_deref(), Some("tok"));
        assert_eq!(loaded.cookies.as_deref(), Some("refresh=abc"));
    }

    #[test]
    fn test_missing_session_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SessionFile::load(&dir.path().join("none.toml")).unwrap().is_empty());
    }
}
