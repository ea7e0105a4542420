use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Rest,
    Memory,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(ProviderKind::Rest),
            "memory" => Ok(ProviderKind::Memory),
            other => Err(format!("expected rest or memory, got {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub provider: ProviderKind,
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub storage_bucket: String,
    pub analysis_delay: Duration,
    pub cors_max_age: Duration,
    pub public_base_url: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let port: u16 = try_load("RUST_PORT", "1111")?;

        Ok(Self {
            port,
            provider: try_load("PROVIDER", "rest")?,
            supabase_url: var("SUPABASE_URL").map(|url| url.trim_end_matches('/').to_string()),
            supabase_anon_key: read_secret("SUPABASE_ANON_KEY"),
            storage_bucket: try_load("STORAGE_BUCKET", "food-images")?,
            analysis_delay: Duration::from_millis(try_load("ANALYSIS_DELAY_MS", "2000")?),
            cors_max_age: Duration::from_secs(try_load("CORS_MAX_AGE_SECS", "3600")?),
            public_base_url: try_load("PUBLIC_BASE_URL", &format!("http://localhost:{port}"))?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 1111,
            provider: ProviderKind::Memory,
            supabase_url: None,
            supabase_anon_key: None,
            storage_bucket: "food-images".to_string(),
            analysis_delay: Duration::from_millis(2000),
            cors_max_age: Duration::from_secs(60 * 60),
            public_base_url: "http://localhost:1111".to_string(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }
    })
}

/// Docker secrets first, then the plain environment.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()),
        Err(e) => {
            info!("Failed to read {secret_name} from file: {e}, falling back to environment");

            var(secret_name)
        }
    }
}
