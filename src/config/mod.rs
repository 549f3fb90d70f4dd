use crate::lb::{ConnectOptions, Credentials};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Endpoint set and credentials for one S3 deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Endpoint addresses (`host[:port]`, no scheme)
    pub endpoints: Vec<String>,

    /// AWS access key ID
    pub access_key: String,

    /// AWS secret access key
    pub secret_key: String,

    /// AWS region (default: us-east-1)
    #[serde(default = "default_region")]
    pub region: String,

    /// Use HTTPS (default: false)
    #[serde(default)]
    pub secure: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Profile {
    /// Connection options shared by every endpoint of this profile
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions::new(
            Credentials::new(self.access_key.clone(), self.secret_key.clone()),
            self.secure,
        )
        .with_region(self.region.clone())
    }
}

/// Endpoint pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Health probe timeout in seconds
    #[serde(default = "default_health_check_timeout")]
    pub health_check_timeout: u64,

    /// Seconds a failed endpoint is skipped before being rechecked
    #[serde(default = "default_cooldown")]
    pub cooldown: u64,
}

fn default_health_check_timeout() -> u64 {
    5
}

fn default_cooldown() -> u64 {
    600
}

impl PoolConfig {
    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            health_check_timeout: default_health_check_timeout(),
            cooldown: default_cooldown(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Named profiles for different S3 deployments
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,

    /// Profile used when none is requested explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_profile: Option<String>,

    /// Endpoint pool settings
    #[serde(default)]
    pub pool: PoolConfig,
}

impl Config {
    /// Get a profile by name, or the default profile if not specified
    pub fn get_profile(&self, name: Option<&str>) -> Option<&Profile> {
        match name.or(self.default_profile.as_deref()) {
            Some(name) => self.profiles.get(name),
            None => self.profiles.values().next(),
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, profile) in &self.profiles {
            if profile.endpoints.is_empty() {
                anyhow::bail!("Profile '{}' has no endpoints", name);
            }
        }
        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config =
        serde_yaml::from_str(&content).context("Failed to parse YAML configuration")?;
    config.validate()?;

    Ok(config)
}

/// Load configuration from environment variables
///
/// - S3_POOL (comma-separated list of `host[:port]` endpoints)
/// - AWS_ACCESS_KEY_ID / S3_KEY
/// - AWS_SECRET_ACCESS_KEY / S3_SECRET
/// - AWS_REGION (optional, defaults to us-east-1)
/// - S3_SECURE (optional, `true`/`1` for HTTPS)
/// - POOL_HEALTH_CHECK_TIMEOUT, POOL_COOLDOWN (optional, seconds)
pub fn load_from_env() -> Result<Config> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let endpoints: Vec<String> = std::env::var("S3_POOL")
        .context("S3_POOL environment variable not set")?
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if endpoints.is_empty() {
        anyhow::bail!("S3_POOL contains no valid endpoints");
    }

    let access_key = std::env::var("AWS_ACCESS_KEY_ID")
        .or_else(|_| std::env::var("S3_KEY"))
        .context("Neither AWS_ACCESS_KEY_ID nor S3_KEY environment variable is set")?;

    let secret_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .or_else(|_| std::env::var("S3_SECRET"))
        .context("Neither AWS_SECRET_ACCESS_KEY nor S3_SECRET environment variable is set")?;

    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| default_region());

    let secure = std::env::var("S3_SECURE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let mut config = Config::default();
    config.profiles.insert(
        "default".to_string(),
        Profile {
            endpoints,
            access_key,
            secret_key,
            region,
            secure,
        },
    );
    config.default_profile = Some("default".to_string());

    if let Some(val) = parse_env("POOL_HEALTH_CHECK_TIMEOUT") {
        config.pool.health_check_timeout = val;
    }
    if let Some(val) = parse_env("POOL_COOLDOWN") {
        config.pool.cooldown = val;
    }

    Ok(config)
}

fn parse_env(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Load configuration from file or environment
///
/// Loads the YAML file when a path is given, otherwise reads the
/// environment. A requested profile becomes the default profile and must
/// exist; the environment only provides `default`.
pub fn load_config(config_path: Option<&str>, profile_name: Option<&str>) -> Result<Config> {
    let (mut config, source) = match config_path {
        Some(path) => (load_from_yaml(path)?, path),
        None => (load_from_env()?, "environment"),
    };

    if let Some(name) = profile_name {
        if !config.profiles.contains_key(name) {
            anyhow::bail!("Profile '{}' not found in {}", name, source);
        }
        config.default_profile = Some(name.to_string());
    }

    Ok(config)
}
