//! `peer` service: the inbound side of token coordination
//!
//! Handlers delegate straight to the coordinator and return promptly; the
//! heavy work of applying a replicated batch happens on the event emitter,
//! never on the RPC receive path.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use rmi::{
    codec, Dispatched, InterfaceDescriptor, ObjectIdentity, RemoteService, RmiContext, RmiError,
};
use vaultpair_core::interfaces::PEER_SERVICE;
use vaultpair_core::AtmCommand;

use crate::coordinator::Coordinator;

pub struct PeerService {
    identity: ObjectIdentity,
    coordinator: Arc<Coordinator>,
}

impl PeerService {
    pub fn new(coordinator: Arc<Coordinator>) -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
            coordinator,
        })
    }
}

#[async_trait]
impl RemoteService for PeerService {
    fn descriptor(&self) -> &'static InterfaceDescriptor {
        &PEER_SERVICE
    }

    fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    fn class_name(&self) -> &'static str {
        "PeerService"
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        _ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError> {
        match method {
            "request_token" => {
                codec::expect_arity(method, &args, 0)?;
                self.coordinator.note_peer_demand();
                Dispatched::value(&true)
            }
            "receive_sync" => {
                codec::expect_arity(method, &args, 2)?;
                let logs: Vec<AtmCommand> = codec::arg(method, &args, 0)?;
                let pass_token: bool = codec::arg(method, &args, 1)?;
                self.coordinator.handle_incoming_sync(logs, pass_token);
                Dispatched::value(&true)
            }
            "get_token_status" => {
                codec::expect_arity(method, &args, 0)?;
                Dispatched::value(&self.coordinator.holds_token())
            }
            other => Err(RmiError::BadMethod(other.to_string())),
        }
    }
}
