//! Client-side lookup and call stubs
//!
//! A stub carries the target endpoint, the service name, and the signature
//! hash of the interface it was built against. Every call ships that hash as
//! the first positional argument; the serving registry refuses mismatches
//! before any method body runs.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::codec::{CallEnvelope, RemoteRef, ReplyEnvelope, METHOD_SEP};
use crate::descriptor::InterfaceDescriptor;
use crate::error::RmiError;
use crate::remote::{RemoteService, RmiContext};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// Client-side handle on a remote registry.
pub struct RemoteRegistry {
    host: String,
    port: u16,
    http: reqwest::Client,
    ctx: Option<RmiContext>,
}

impl RemoteRegistry {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .expect("default reqwest client");
        Self {
            host: host.into(),
            port,
            http,
            ctx: None,
        }
    }

    /// Attach the caller's own registry so stubs can auto-export callback
    /// arguments. Required for any call that passes a local remote-object.
    pub fn with_context(mut self, ctx: RmiContext) -> Self {
        self.http = ctx.http.clone();
        self.ctx = Some(ctx);
        self
    }

    /// Build a stub for `service_name`, typed by `interface`. No network
    /// traffic happens here; the first call reaches the server.
    pub fn lookup(&self, service_name: &str, interface: &'static InterfaceDescriptor) -> RpcStub {
        RpcStub {
            http: self.http.clone(),
            host: self.host.clone(),
            port: self.port,
            service_name: service_name.to_string(),
            interface,
            signature_hash: interface.signature_hash().to_string(),
            ctx: self.ctx.clone(),
        }
    }
}

/// Generated-proxy core: marshals one method call to one bound service.
///
/// Typed clients wrap this with one method per interface method, so argument
/// lists are checked at compile time before a call ever leaves the process.
#[derive(Clone, Debug)]
pub struct RpcStub {
    http: reqwest::Client,
    host: String,
    port: u16,
    service_name: String,
    interface: &'static InterfaceDescriptor,
    signature_hash: String,
    ctx: Option<RmiContext>,
}

impl RpcStub {
    /// Build a stub over a received remote reference, typed by the declared
    /// parameter (or return) interface. The reference's hash is carried as-is
    /// so the serving registry re-validates it on every call.
    pub fn from_ref(
        remote_ref: &RemoteRef,
        interface: &'static InterfaceDescriptor,
        http: reqwest::Client,
    ) -> Self {
        Self {
            http,
            host: remote_ref.host.clone(),
            port: remote_ref.port,
            service_name: remote_ref.service_name.clone(),
            interface,
            signature_hash: remote_ref.signature_hash.clone(),
            ctx: None,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn interface(&self) -> &'static InterfaceDescriptor {
        self.interface
    }

    pub fn remote_ref(&self) -> RemoteRef {
        RemoteRef::new(
            self.service_name.clone(),
            self.host.clone(),
            self.port,
            self.signature_hash.clone(),
        )
    }

    fn endpoint(&self) -> String {
        format!("http://{}:{}/rmi", self.host, self.port)
    }

    /// Serialize a local remote-object argument: bind it into the caller's
    /// registry (idempotently) and substitute its remote reference. Fails
    /// with `NoLocalRegistry` when no running registry is attached.
    pub fn export_arg(&self, service: &Arc<dyn RemoteService>) -> Result<Value, RmiError> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| RmiError::NoLocalRegistry(service.class_name().to_string()))?;
        Ok(ctx.export(service)?.to_value())
    }

    /// Invoke `method` with the given positional arguments.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, RmiError> {
        if !self.interface.has_method(method) {
            return Err(RmiError::BadMethod(format!(
                "{}{}{}",
                self.service_name, METHOD_SEP, method
            )));
        }

        let mut params = Vec::with_capacity(args.len() + 1);
        params.push(Value::String(self.signature_hash.clone()));
        params.extend(args);

        let call = CallEnvelope {
            method: format!("{}{}{}", self.service_name, METHOD_SEP, method),
            params,
        };

        let endpoint = self.endpoint();
        let response = self
            .http
            .post(&endpoint)
            .json(&call)
            .send()
            .await
            .map_err(|e| RmiError::from_transport(&endpoint, e))?;
        let reply: ReplyEnvelope = response
            .json()
            .await
            .map_err(|e| RmiError::from_transport(&endpoint, e))?;

        reply.into_result()
    }

    /// Interpret a result value that may be a remote reference: wrap it in a
    /// stub typed by the method's declared return interface, or pass the
    /// plain value through.
    pub fn result_stub(
        &self,
        value: Value,
        interface: &'static InterfaceDescriptor,
    ) -> Result<RpcStub, Value> {
        match RemoteRef::from_value(&value) {
            Some(remote_ref) => Ok(RpcStub::from_ref(&remote_ref, interface, self.http.clone())),
            None => Err(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::MethodSig;
    use serde_json::json;

    static CALLBACK: InterfaceDescriptor = InterfaceDescriptor::new(
        "SuccessCallback",
        &[MethodSig {
            name: "notify",
            params: &["message: string", "type: string"],
            returns: "null",
        }],
    );

    #[test]
    fn test_lookup_builds_stub_with_interface_hash() {
        let registry = RemoteRegistry::new("127.0.0.1", 29054);
        let stub = registry.lookup("auth", &CALLBACK);
        assert_eq!(stub.service_name(), "auth");
        assert_eq!(stub.remote_ref().signature_hash, CALLBACK.signature_hash());
        assert_eq!(stub.remote_ref().port, 29054);
    }

    #[test]
    fn test_stub_from_ref_keeps_ref_hash() {
        let http = reqwest::Client::new();
        let r = RemoteRef::new("NotifyCallback#3", "10.0.0.2", 29055, "cafe");
        let stub = RpcStub::from_ref(&r, &CALLBACK, http);
        assert_eq!(stub.remote_ref(), r);
    }

    #[tokio::test]
    async fn test_unknown_method_fails_locally() {
        let registry = RemoteRegistry::new("127.0.0.1", 1);
        let stub = registry.lookup("cb", &CALLBACK);
        let err = stub.invoke("explode", vec![]).await.unwrap_err();
        assert!(matches!(err, RmiError::BadMethod(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_connection_error() {
        // Port 9 (discard) is essentially never serving HTTP locally.
        let registry = RemoteRegistry::new("127.0.0.1", 9);
        let stub = registry.lookup("cb", &CALLBACK);
        let err = stub
            .invoke("notify", vec![json!("hi"), json!("info")])
            .await
            .unwrap_err();
        assert!(err.is_connection(), "got: {err}");
    }

    #[test]
    fn test_export_arg_without_registry_fails() {
        use crate::remote::{Dispatched, ObjectIdentity};
        use async_trait::async_trait;

        struct Cb {
            identity: ObjectIdentity,
        }

        #[async_trait]
        impl RemoteService for Cb {
            fn descriptor(&self) -> &'static InterfaceDescriptor {
                &CALLBACK
            }
            fn identity(&self) -> &ObjectIdentity {
                &self.identity
            }
            fn class_name(&self) -> &'static str {
                "Cb"
            }
            async fn dispatch(
                &self,
                _method: &str,
                _args: Vec<Value>,
                _ctx: &RmiContext,
            ) -> Result<Dispatched, RmiError> {
                Ok(Dispatched::null())
            }
        }

        let registry = RemoteRegistry::new("127.0.0.1", 29054);
        let stub = registry.lookup("auth", &CALLBACK);
        let cb: Arc<dyn RemoteService> = Arc::new(Cb {
            identity: ObjectIdentity::new(),
        });
        let err = stub.export_arg(&cb).unwrap_err();
        assert!(matches!(err, RmiError::NoLocalRegistry(_)));
    }
}
