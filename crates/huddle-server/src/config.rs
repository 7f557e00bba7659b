use std::env;
use std::path::PathBuf;

use anyhow::{Context, bail};

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
    "changeme",
    "secret",
];

/// Server configuration, read from `HUDDLE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub storage_dir: PathBuf,
    /// Base URL clients reach the server at; upload and image URLs start with it.
    pub public_url: String,
    pub jwt_secret: String,
    pub storage_retention_hours: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = var("HUDDLE_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("HUDDLE_JWT_SECRET is unset or still a placeholder; set it in your .env file");
        }

        let host = var("HUDDLE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("HUDDLE_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("HUDDLE_PORT must be a port number")?;
        let db_path = var("HUDDLE_DB_PATH").unwrap_or_else(|| "huddle.db".into()).into();
        let storage_dir = var("HUDDLE_STORAGE_DIR")
            .unwrap_or_else(|| "./storage".into())
            .into();
        let public_url = var("HUDDLE_PUBLIC_URL")
            .unwrap_or_else(|| format!("http://localhost:{}", port))
            .trim_end_matches('/')
            .to_string();
        let storage_retention_hours = var("HUDDLE_STORAGE_RETENTION_HOURS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(24);

        Ok(Self {
            host,
            port,
            db_path,
            storage_dir,
            public_url,
            jwt_secret,
            storage_retention_hours,
        })
    }
}
