use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use vaultpair_core::net::parse_host_port;

/// Main configuration for the peer daemon
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// This peer's id in the static two-peer table (1 or 2)
    pub peer_id: u32,
    pub peer1_addr: String,
    pub peer2_addr: String,
    pub database: DatabaseConfig,
    pub coordinator: CoordinatorConfig,
    /// Optional health/metrics listener, e.g. "0.0.0.0:9090"
    #[serde(default)]
    pub health_addr: Option<String>,
}

/// Database configuration
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

/// Custom Debug that redacts the database URL (may contain credentials).
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .finish()
    }
}

/// Token-coordination tunables
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorConfig {
    /// Worker idle wake interval (T_poll). Valid range 100-2000 ms.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// How long to wait for the token after `request_token` (T_request)
    #[serde(default = "default_token_request_timeout")]
    pub token_request_timeout_ms: u64,
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_token_request_timeout() -> u64 {
    5000
}

impl Config {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::load_from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let peer_id = env::var("PEER_ID")
            .map_err(|_| eyre!("PEER_ID environment variable is required"))?
            .parse()
            .wrap_err("PEER_ID must be a valid u32")?;

        let config = Config {
            peer_id,
            peer1_addr: env::var("PEER1_ADDR")
                .map_err(|_| eyre!("PEER1_ADDR environment variable is required"))?,
            peer2_addr: env::var("PEER2_ADDR")
                .map_err(|_| eyre!("PEER2_ADDR environment variable is required"))?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| eyre!("DATABASE_URL environment variable is required"))?,
            },
            coordinator: CoordinatorConfig {
                poll_interval_ms: env::var("POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default_poll_interval()),
                token_request_timeout_ms: env::var("TOKEN_REQUEST_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(default_token_request_timeout()),
            },
            health_addr: env::var("HEALTH_ADDR").ok(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.peer_id != 1 && self.peer_id != 2 {
            return Err(eyre!("peer_id must be 1 or 2, got {}", self.peer_id));
        }

        parse_host_port(&self.peer1_addr).wrap_err("peer1_addr is not a valid host:port")?;
        parse_host_port(&self.peer2_addr).wrap_err("peer2_addr is not a valid host:port")?;

        if self.peer1_addr == self.peer2_addr {
            return Err(eyre!("peer1_addr and peer2_addr must differ"));
        }

        if self.database.url.is_empty() {
            return Err(eyre!("database.url cannot be empty"));
        }
        if !self.database.url.starts_with("postgres") && self.database.url != "memory:" {
            return Err(eyre!(
                "database.url must be a postgres:// URL or the literal \"memory:\""
            ));
        }

        let poll = self.coordinator.poll_interval_ms;
        if !(100..=2000).contains(&poll) {
            return Err(eyre!(
                "coordinator.poll_interval_ms must be within 100-2000, got {}",
                poll
            ));
        }

        if self.coordinator.token_request_timeout_ms < poll {
            return Err(eyre!(
                "coordinator.token_request_timeout_ms must be at least poll_interval_ms"
            ));
        }

        if let Some(addr) = &self.health_addr {
            parse_host_port(addr).wrap_err("health_addr is not a valid host:port")?;
        }

        Ok(())
    }

    /// Address this peer serves on.
    pub fn self_addr(&self) -> &str {
        if self.peer_id == 1 {
            &self.peer1_addr
        } else {
            &self.peer2_addr
        }
    }

    /// Address of the other peer.
    pub fn peer_addr(&self) -> &str {
        if self.peer_id == 1 {
            &self.peer2_addr
        } else {
            &self.peer1_addr
        }
    }

    /// Convention: peer 1 holds the token at startup.
    pub fn holds_token_at_start(&self) -> bool {
        self.peer_id == 1
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.coordinator.poll_interval_ms)
    }

    pub fn token_request_timeout(&self) -> Duration {
        Duration::from_millis(self.coordinator.token_request_timeout_ms)
    }
}
