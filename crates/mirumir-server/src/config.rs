use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::warn;

/// Placeholder JWT secrets that must not survive into a real deployment.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: chrono::Duration,
}

impl Config {
    /// Read `MIRUMIR_*` variables, falling back to development defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let host = get("MIRUMIR_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("MIRUMIR_PORT")
            .unwrap_or_else(|| "8000".into())
            .parse()
            .context("MIRUMIR_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path: PathBuf = get("MIRUMIR_DB_PATH")
            .unwrap_or_else(|| "mirumir.db".into())
            .into();

        let jwt_secret = get("MIRUMIR_JWT_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "dev-secret-change-me".into());
        if PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            warn!("MIRUMIR_JWT_SECRET is unset or a placeholder; tokens are forgeable");
        }

        let ttl_minutes: i64 = get("MIRUMIR_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|| "1440".into())
            .parse()
            .context("MIRUMIR_TOKEN_TTL_MINUTES must be a whole number of minutes")?;
        anyhow::ensure!(ttl_minutes > 0, "MIRUMIR_TOKEN_TTL_MINUTES must be positive");
        let token_ttl = chrono::Duration::try_minutes(ttl_minutes)
            .filter(|ttl| chrono::Utc::now().checked_add_signed(*ttl).is_some())
            .context("MIRUMIR_TOKEN_TTL_MINUTES is out of range")?;

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            token_ttl,
        })
    }
}
