//! Peer-to-peer coordination interface
//!
//! Bound as `peer` on every peer. `request_token` records demand and returns
//! immediately; `receive_sync` carries executed-command batches and,
//! optionally, the token itself.

use serde_json::json;

use rmi::{InterfaceDescriptor, MethodSig, RemoteRegistry, RmiError, RpcStub};

use crate::command::AtmCommand;
use crate::net::parse_host_port;

pub const PEER_SERVICE_NAME: &str = "peer";

pub static PEER_SERVICE: InterfaceDescriptor = InterfaceDescriptor::new(
    "PeerService",
    &[
        MethodSig {
            name: "request_token",
            params: &[],
            returns: "bool",
        },
        MethodSig {
            name: "receive_sync",
            params: &["logs: array<record>", "pass_token: bool"],
            returns: "bool",
        },
        MethodSig {
            name: "get_token_status",
            params: &[],
            returns: "bool",
        },
    ],
);

/// Typed client over the other peer's `peer` service.
#[derive(Clone)]
pub struct PeerClient {
    stub: RpcStub,
}

impl PeerClient {
    pub fn new(stub: RpcStub) -> Self {
        Self { stub }
    }

    /// Build a client for the peer at `host:port`.
    pub fn from_addr(addr: &str) -> eyre::Result<Self> {
        let (host, port) = parse_host_port(addr)?;
        let registry = RemoteRegistry::new(host, port);
        Ok(Self::new(registry.lookup(PEER_SERVICE_NAME, &PEER_SERVICE)))
    }

    /// Declare demand for the token. Never blocks on the remote side.
    pub async fn request_token(&self) -> Result<bool, RmiError> {
        let value = self.stub.invoke("request_token", vec![]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    /// Push a batch of executed commands; `pass_token = true` also hands the
    /// token over. Commands must already be sanitized (no callback refs).
    pub async fn receive_sync(
        &self,
        logs: &[AtmCommand],
        pass_token: bool,
    ) -> Result<bool, RmiError> {
        let logs_value = serde_json::to_value(logs).map_err(|e| RmiError::Codec(e.to_string()))?;
        let value = self
            .stub
            .invoke("receive_sync", vec![logs_value, json!(pass_token)])
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn get_token_status(&self) -> Result<bool, RmiError> {
        let value = self.stub.invoke("get_token_status", vec![]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}
