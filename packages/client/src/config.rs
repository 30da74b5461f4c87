use std::env;

use eyre::{eyre, Result, WrapErr};

use vaultpair_core::net::parse_host_port;

/// Static two-peer table plus the peer to try first.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub peer1_addr: String,
    pub peer2_addr: String,
    pub primary_peer_id: u32,
    /// Host this client advertises for its callback registry.
    pub callback_host: String,
}

impl ClientConfig {
    pub fn new(peer1_addr: impl Into<String>, peer2_addr: impl Into<String>) -> Self {
        Self {
            peer1_addr: peer1_addr.into(),
            peer2_addr: peer2_addr.into(),
            primary_peer_id: 1,
            callback_host: "127.0.0.1".to_string(),
        }
    }

    pub fn with_primary(mut self, peer_id: u32) -> Self {
        self.primary_peer_id = peer_id;
        self
    }

    pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
        self.callback_host = host.into();
        self
    }

    /// Load from environment (PEER1_ADDR, PEER2_ADDR, PRIMARY_PEER_ID,
    /// CALLBACK_HOST), with a .env file honored if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let config = Self {
            peer1_addr: env::var("PEER1_ADDR")
                .map_err(|_| eyre!("PEER1_ADDR environment variable is required"))?,
            peer2_addr: env::var("PEER2_ADDR")
                .map_err(|_| eyre!("PEER2_ADDR environment variable is required"))?,
            primary_peer_id: env::var("PRIMARY_PEER_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
            callback_host: env::var("CALLBACK_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        parse_host_port(&self.peer1_addr).wrap_err("peer1_addr is not a valid host:port")?;
        parse_host_port(&self.peer2_addr).wrap_err("peer2_addr is not a valid host:port")?;
        if self.primary_peer_id != 1 && self.primary_peer_id != 2 {
            return Err(eyre!(
                "primary_peer_id must be 1 or 2, got {}",
                self.primary_peer_id
            ));
        }
        Ok(())
    }

    /// Peers in connection order: primary first, the other as failover.
    pub fn ordered_peers(&self) -> Vec<(u32, String)> {
        let one = (1, self.peer1_addr.clone());
        let two = (2, self.peer2_addr.clone());
        if self.primary_peer_id == 2 {
            vec![two, one]
        } else {
            vec![one, two]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_peers_respects_primary() {
        let config = ClientConfig::new("127.0.0.1:29054", "127.0.0.1:29055");
        let peers = config.ordered_peers();
        assert_eq!(peers[0].0, 1);
        assert_eq!(peers[1].0, 2);

        let config = config.with_primary(2);
        let peers = config.ordered_peers();
        assert_eq!(peers[0].0, 2);
        assert_eq!(peers[0].1, "127.0.0.1:29055");
    }

    #[test]
    fn test_validate() {
        assert!(ClientConfig::new("127.0.0.1:1", "127.0.0.1:2")
            .validate()
            .is_ok());
        assert!(ClientConfig::new("nope", "127.0.0.1:2").validate().is_err());
        assert!(ClientConfig::new("127.0.0.1:1", "127.0.0.1:2")
            .with_primary(3)
            .validate()
            .is_err());
    }
}
