//! `auth` service interface: the only service bound under a well-known name
//! on every peer.

use std::sync::Arc;

use serde_json::json;

use rmi::{InterfaceDescriptor, MethodSig, RemoteService, RmiError, RpcStub};

use crate::models::LoginResult;

pub const AUTH_SERVICE_NAME: &str = "auth";

pub static AUTH_SERVICE: InterfaceDescriptor = InterfaceDescriptor::new(
    "AuthService",
    &[MethodSig {
        name: "login",
        params: &["card_number: string", "pin: string", "callback: SuccessCallback"],
        returns: "record",
    }],
);

/// Typed client over the `auth` service.
#[derive(Clone)]
pub struct AuthClient {
    stub: RpcStub,
}

impl AuthClient {
    pub fn new(stub: RpcStub) -> Self {
        Self { stub }
    }

    pub fn lookup(registry: &rmi::RemoteRegistry) -> Self {
        Self::new(registry.lookup(AUTH_SERVICE_NAME, &AUTH_SERVICE))
    }

    /// Authenticate with card number + PIN. The callback is a local remote
    /// object; it is auto-exported so the peer can notify this client.
    pub async fn login(
        &self,
        card_number: &str,
        pin: &str,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<LoginResult, RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        let value = self
            .stub
            .invoke("login", vec![json!(card_number), json!(pin), callback_arg])
            .await?;
        serde_json::from_value(value).map_err(|e| RmiError::Codec(e.to_string()))
    }
}
