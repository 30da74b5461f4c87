//! Callback implementations the client exports to the peers

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use rmi::{
    codec, Dispatched, InterfaceDescriptor, ObjectIdentity, RemoteService, RmiContext, RmiError,
};
use vaultpair_core::interfaces::{PING_CALLBACK, SUCCESS_CALLBACK};
use vaultpair_core::time::now_ms;

type NotifyHandler = Box<dyn Fn(&str, &str) + Send + Sync>;

/// Client-side `SuccessCallback`. The peer invokes `notify` to report the
/// outcome of a login, a queued write, or a logout.
pub struct NotifyCallback {
    identity: ObjectIdentity,
    handler: Option<NotifyHandler>,
}

impl NotifyCallback {
    /// Notifications go to the log.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
            handler: None,
        })
    }

    /// Notifications go to the given handler.
    pub fn with_handler(handler: impl Fn(&str, &str) + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
            handler: Some(Box::new(handler)),
        })
    }

    /// Notifications go to a channel as `(message, level)` pairs.
    pub fn channel() -> (Arc<Self>, mpsc::UnboundedReceiver<(String, String)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback = Self::with_handler(move |message, level| {
            let _ = tx.send((message.to_string(), level.to_string()));
        });
        (callback, rx)
    }

    /// Name this callback is exported under, once it has been passed to a
    /// peer. Use it to unbind from the local registry when the session ends.
    pub fn exported_name(&self) -> Option<&str> {
        self.identity.exported_name()
    }
}

#[async_trait]
impl RemoteService for NotifyCallback {
    fn descriptor(&self) -> &'static InterfaceDescriptor {
        &SUCCESS_CALLBACK
    }

    fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    fn class_name(&self) -> &'static str {
        "NotifyCallback"
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        _ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError> {
        match method {
            "notify" => {
                codec::expect_arity(method, &args, 2)?;
                let message: String = codec::arg(method, &args, 0)?;
                let level: String = codec::arg(method, &args, 1)?;
                match &self.handler {
                    Some(handler) => handler(&message, &level),
                    None => tracing::info!(level = %level, "server message: {message}"),
                }
                Ok(Dispatched::null())
            }
            other => Err(RmiError::BadMethod(other.to_string())),
        }
    }
}

/// Client-side `PingCallback`: answers with the one-way latency in
/// milliseconds, computed from the timestamp the peer sent.
pub struct PingResponder {
    identity: ObjectIdentity,
}

impl PingResponder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
        })
    }
}

#[async_trait]
impl RemoteService for PingResponder {
    fn descriptor(&self) -> &'static InterfaceDescriptor {
        &PING_CALLBACK
    }

    fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    fn class_name(&self) -> &'static str {
        "PingResponder"
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        _ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError> {
        match method {
            "ping" => {
                codec::expect_arity(method, &args, 1)?;
                let timestamp: i64 = codec::arg(method, &args, 0)?;
                Dispatched::value(&(now_ms() - timestamp))
            }
            other => Err(RmiError::BadMethod(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_ctx() -> RmiContext {
        RmiContext::new(rmi::LocalRegistry::new("127.0.0.1", 0))
    }

    #[tokio::test]
    async fn test_notify_reaches_channel() {
        let (callback, mut rx) = NotifyCallback::channel();
        callback
            .dispatch(
                "notify",
                vec![json!("Giao dịch thành công!"), json!("success")],
                &test_ctx(),
            )
            .await
            .unwrap();

        let (message, level) = rx.recv().await.unwrap();
        assert_eq!(message, "Giao dịch thành công!");
        assert_eq!(level, "success");
    }

    #[tokio::test]
    async fn test_ping_returns_elapsed() {
        let responder = PingResponder::new();
        let sent_at = now_ms() - 25;
        let result = responder
            .dispatch("ping", vec![json!(sent_at)], &test_ctx())
            .await
            .unwrap();
        match result {
            Dispatched::Value(value) => assert!(value.as_i64().unwrap() >= 25),
            _ => panic!("expected a plain value"),
        }
    }

    #[tokio::test]
    async fn test_unknown_method_refused() {
        let (callback, _rx) = NotifyCallback::channel();
        let err = callback
            .dispatch("explode", vec![], &test_ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, RmiError::BadMethod(_)));
    }
}
