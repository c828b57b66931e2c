/// Configuration management for the PotaFlow API and worker
///
/// Everything comes from environment variables (optionally seeded from a
/// `.env` file) so both binaries run unchanged in containers.

use crate::auth::PasswordParams;
use crate::runtime::PollerConfig;
use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Password hashing and session tokens
    pub auth: AuthConfig,
    /// Background run poller
    pub worker: WorkerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
    /// Deadline applied to the store calls of each request
    pub request_timeout: Duration,
}

/// SQLite database location
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database file; the parent directory is created on startup
    pub path: PathBuf,
}

#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC secret for session tokens
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub password: PasswordParams,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .field("password", &self.password)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub poll_interval: Duration,
    pub batch_size: u32,
    /// Deadline applied to the store calls of each run
    pub run_timeout: Duration,
}

impl WorkerConfig {
    pub fn poller(&self) -> PollerConfig {
        PollerConfig {
            interval: self.poll_interval,
            batch_size: self.batch_size,
            run_timeout: self.run_timeout,
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    ///
    /// A `.env` file in the working directory is read first if present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("POTAFLOW_JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("POTAFLOW_JWT_SECRET must be set"))?;

        let password = PasswordParams::from_lookup(&lookup).context("invalid password hashing parameters")?;

        Ok(Self {
            server: ServerConfig {
                host: lookup("POTAFLOW_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_var(&lookup, "POTAFLOW_PORT", 8080)?,
                request_timeout: Duration::from_millis(parse_nonzero(&lookup, "POTAFLOW_REQUEST_TIMEOUT_MS", 5000)?),
            },
            database: DatabaseConfig {
                path: lookup("POTAFLOW_DATABASE_PATH")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("data/potaflow.db")),
            },
            auth: AuthConfig {
                jwt_secret,
                token_ttl: Duration::from_secs(parse_var(&lookup, "POTAFLOW_TOKEN_TTL_SECS", 86_400)?),
                password,
            },
            worker: WorkerConfig {
                poll_interval: Duration::from_millis(parse_nonzero(&lookup, "POTAFLOW_POLL_INTERVAL_MS", 2000)?),
                batch_size: parse_nonzero(&lookup, "POTAFLOW_POLL_BATCH", 10)?,
                run_timeout: Duration::from_millis(parse_nonzero(&lookup, "POTAFLOW_RUN_TIMEOUT_MS", 30_000)?),
            },
        })
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("invalid {}={:?}: {}", name, raw, e)),
    }
}

/// Like [`parse_var`], but zero is rejected
fn parse_nonzero<F, T>(lookup: &F, name: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Default + PartialEq,
    T::Err: std::fmt::Display,
{
    let value = parse_var(lookup, name, default)?;
    if value == T::default() {
        bail!("{} must be greater than zero", name);
    }
    Ok(value)
}
