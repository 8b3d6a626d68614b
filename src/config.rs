use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Database URL. May be stored encrypted as `iv:ciphertext`; it is
    /// decrypted at startup with the configured encryption key.
    pub database_url: String,

    pub log_level: String,

    /// Number of tokio worker threads (default: 2)
    /// Set to 0 to use the number of CPU cores
    pub worker_threads: usize,

    /// Maximum database connections (default: 5)
    pub max_db_connections: u32,

    /// Minimum database connections (default: 1)
    pub min_db_connections: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:data/coachdesk.db".to_string(),
            log_level: "info".to_string(),
            worker_threads: 2,
            max_db_connections: 5,
            min_db_connections: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,

    pub cors_allowed_origins: Vec<String>,

    /// When set, the reset-request endpoint returns the issued token in the
    /// response body instead of relying on out-of-band delivery. Local
    /// development only; never enable in production.
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4000,
            cors_allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            dev_mode: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// bcrypt cost factor for user passwords (default: 12)
    pub bcrypt_cost: u32,

    /// Minimum password length enforced by the strength policy.
    pub password_min_length: usize,

    /// How many previous passwords the no-reuse check looks back over.
    pub password_history_depth: u64,

    /// Access token lifetime in minutes.
    pub access_token_ttl_minutes: i64,

    /// Refresh token lifetime in days.
    pub refresh_token_ttl_days: i64,

    /// Reset token lifetime in minutes.
    pub reset_token_ttl_minutes: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: 12,
            password_min_length: 8,
            password_history_depth: 5,
            access_token_ttl_minutes: 15,
            refresh_token_ttl_days: 7,
            reset_token_ttl_minutes: 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            security: SecurityConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let paths = Self::config_paths();

        for path in &paths {
            if path.exists() {
                info!("Loading config from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![];

        paths.push(PathBuf::from("config.toml"));

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("coachdesk").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".coachdesk").join("config.toml"));
        }

        paths
    }

    pub fn validate(&self) -> Result<()> {
        if self.general.database_url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if !(4..=31).contains(&self.security.bcrypt_cost) {
            anyhow::bail!("bcrypt cost must be between 4 and 31");
        }

        if self.security.password_history_depth == 0 {
            anyhow::bail!("Password history depth must be > 0");
        }

        if self.security.access_token_ttl_minutes <= 0
            || self.security.refresh_token_ttl_days <= 0
            || self.security.reset_token_ttl_minutes <= 0
        {
            anyhow::bail!("Token lifetimes must be > 0");
        }

        Ok(())
    }
}

/// Signing and encryption secrets. Loaded from the environment only; there
/// are deliberately no fallback values, and startup aborts if any is missing.
#[derive(Clone)]
pub struct Secrets {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub encryption_key: String,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            access_token_secret: require_env("ACCESS_TOKEN_SECRET")?,
            refresh_token_secret: require_env("REFRESH_TOKEN_SECRET")?,
            encryption_key: require_env("ENCRYPTION_KEY")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    let value =
        std::env::var(name).with_context(|| format!("Missing required secret: {name}"))?;
    if value.is_empty() {
        anyhow::bail!("Secret {name} is set but empty");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 4000);
        assert_eq!(config.security.bcrypt_cost, 12);
        assert_eq!(config.security.password_history_depth, 5);
        assert_eq!(config.security.access_token_ttl_minutes, 15);
        assert!(!config.server.dev_mode);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[server]"));
        assert!(toml_str.contains("[security]"));
    }

    #[test]
    fn test_config_deserialization() {
        let toml_str = r#"
            [general]
            log_level = "debug"

            [security]
            bcrypt_cost = 10
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.security.bcrypt_cost, 10);

        assert_eq!(config.server.port, 4000);
    }

    #[test]
    fn test_validate_rejects_bad_cost() {
        let mut config = Config::default();
        config.security.bcrypt_cost = 2;
        assert!(config.validate().is_err());
    }
}
