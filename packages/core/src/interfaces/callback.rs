//! Client-side callback interfaces
//!
//! Callbacks are remote objects the client passes as arguments; the
//! framework auto-exports them so the serving peer can call back into the
//! client that invoked it.

use std::fmt;

use serde_json::json;

use rmi::{InterfaceDescriptor, MethodSig, RemoteRef, RmiError, RpcStub};

pub static SUCCESS_CALLBACK: InterfaceDescriptor = InterfaceDescriptor::new(
    "SuccessCallback",
    &[MethodSig {
        name: "notify",
        params: &["message: string", "type: string"],
        returns: "null",
    }],
);

pub static PING_CALLBACK: InterfaceDescriptor = InterfaceDescriptor::new(
    "PingCallback",
    &[MethodSig {
        name: "ping",
        params: &["timestamp: int"],
        returns: "int",
    }],
);

/// Severity attached to a `notify` delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Success,
    Error,
    Info,
}

impl NotifyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotifyLevel::Success => "success",
            NotifyLevel::Error => "error",
            NotifyLevel::Info => "info",
        }
    }
}

impl fmt::Display for NotifyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stub over a client's `SuccessCallback`, built from the remote reference
/// the client sent along with its command.
#[derive(Clone)]
pub struct SuccessCallbackClient {
    stub: RpcStub,
}

impl SuccessCallbackClient {
    pub fn from_ref(remote_ref: &RemoteRef, http: &reqwest::Client) -> Self {
        Self {
            stub: RpcStub::from_ref(remote_ref, &SUCCESS_CALLBACK, http.clone()),
        }
    }

    pub async fn notify(&self, message: &str, level: NotifyLevel) -> Result<(), RmiError> {
        self.stub
            .invoke("notify", vec![json!(message), json!(level.as_str())])
            .await
            .map(|_| ())
    }

    pub fn remote_ref(&self) -> RemoteRef {
        self.stub.remote_ref()
    }
}

/// Stub over a client's `PingCallback`; returns the measured round-trip
/// latency in milliseconds.
#[derive(Clone)]
pub struct PingCallbackClient {
    stub: RpcStub,
}

impl PingCallbackClient {
    pub fn from_ref(remote_ref: &RemoteRef, http: &reqwest::Client) -> Self {
        Self {
            stub: RpcStub::from_ref(remote_ref, &PING_CALLBACK, http.clone()),
        }
    }

    pub async fn ping(&self, timestamp: i64) -> Result<i64, RmiError> {
        let value = self.stub.invoke("ping", vec![json!(timestamp)]).await?;
        value
            .as_i64()
            .ok_or_else(|| RmiError::Codec("ping result is not an integer".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_levels() {
        assert_eq!(NotifyLevel::Success.as_str(), "success");
        assert_eq!(NotifyLevel::Error.as_str(), "error");
        assert_eq!(NotifyLevel::Info.to_string(), "info");
    }

    #[test]
    fn test_callback_client_keeps_reference() {
        let r = RemoteRef::new("NotifyCallback#4", "127.0.0.1", 29061, "feed");
        let client = SuccessCallbackClient::from_ref(&r, &reqwest::Client::new());
        assert_eq!(client.remote_ref(), r);
    }
}
