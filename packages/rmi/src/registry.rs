//! Local registry: hosts remote objects and routes inbound calls
//!
//! The registry owns a `service-name -> object` map and an HTTP listener.
//! Inbound selectors use the `service@method` form; the first positional
//! argument is always the caller's interface signature hash, checked before
//! any method body runs.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

use crate::codec::{CallEnvelope, RemoteRef, ReplyEnvelope, METHOD_SEP, OBJECT_SEP};
use crate::error::RmiError;
use crate::remote::{Dispatched, RemoteService, RmiContext};

const HTTP_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

struct BoundService {
    service: Arc<dyn RemoteService>,
    signature_hash: String,
}

struct RegistryInner {
    host: String,
    port: AtomicU16,
    services: RwLock<HashMap<String, BoundService>>,
    running: AtomicBool,
    http: reqwest::Client,
}

/// Registry of remote objects served by this process.
///
/// Cheap to clone; all clones share one service map and listener.
#[derive(Clone)]
pub struct LocalRegistry {
    inner: Arc<RegistryInner>,
}

impl std::fmt::Debug for LocalRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalRegistry").finish_non_exhaustive()
    }
}

impl LocalRegistry {
    /// Create a registry that will advertise `host` in the remote references
    /// it hands out. Port 0 picks an ephemeral port at `listen` time.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(HTTP_CONNECT_TIMEOUT)
            .build()
            .expect("default reqwest client");
        Self {
            inner: Arc::new(RegistryInner {
                host: host.into(),
                port: AtomicU16::new(port),
                services: RwLock::new(HashMap::new()),
                running: AtomicBool::new(false),
                http,
            }),
        }
    }

    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Advertised port. After `listen` this is the actually-bound port.
    pub fn port(&self) -> u16 {
        self.inner.port.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Shared outbound HTTP client, reused by stubs created in handlers.
    pub fn http_client(&self) -> reqwest::Client {
        self.inner.http.clone()
    }

    /// Bind a service under `name`. Fails with `NameTaken` if the name is in
    /// use and with `Codec` if the object declares an empty interface.
    pub fn bind(&self, name: &str, service: Arc<dyn RemoteService>) -> Result<(), RmiError> {
        self.bind_inner(name, service, false)
    }

    /// Replace any prior binding. Refused while the registry is serving.
    pub fn rebind(&self, name: &str, service: Arc<dyn RemoteService>) -> Result<(), RmiError> {
        if self.is_running() {
            return Err(RmiError::ServerBusy(name.to_string()));
        }
        self.bind_inner(name, service, true)
    }

    fn bind_inner(
        &self,
        name: &str,
        service: Arc<dyn RemoteService>,
        replace: bool,
    ) -> Result<(), RmiError> {
        let descriptor = service.descriptor();
        if descriptor.methods.is_empty() {
            return Err(RmiError::Codec(format!(
                "service [{}] declares an empty interface [{}]",
                name, descriptor.name
            )));
        }

        let signature_hash = descriptor.signature_hash().to_string();
        let mut services = self.inner.services.write().expect("registry lock");
        if !replace && services.contains_key(name) {
            return Err(RmiError::NameTaken(name.to_string()));
        }

        service.identity().record_export(name);
        services.insert(
            name.to_string(),
            BoundService {
                service,
                signature_hash,
            },
        );
        tracing::debug!(service = name, "bound service");
        Ok(())
    }

    /// Remove a binding. Permitted while serving; sessions use this on logout.
    pub fn unbind(&self, name: &str) -> Result<(), RmiError> {
        let mut services = self.inner.services.write().expect("registry lock");
        if services.remove(name).is_none() {
            return Err(RmiError::NotFound(name.to_string()));
        }
        tracing::debug!(service = name, "unbound service");
        Ok(())
    }

    /// Snapshot of currently bound service names.
    pub fn list(&self) -> Vec<String> {
        let services = self.inner.services.read().expect("registry lock");
        services.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        let services = self.inner.services.read().expect("registry lock");
        services.contains_key(name)
    }

    /// Bind a remote-object under its synthetic `ClassName#ObjectId` name
    /// (idempotently) and return its remote reference. This is the auto-export
    /// path used both for callback arguments and for remote-object results.
    pub fn export_object(&self, service: Arc<dyn RemoteService>) -> Result<RemoteRef, RmiError> {
        let name = match service.identity().exported_name() {
            Some(name) => name.to_string(),
            None => format!(
                "{}{}{}",
                service.class_name(),
                OBJECT_SEP,
                service.identity().object_id()
            ),
        };

        let signature_hash = service.descriptor().signature_hash().to_string();
        if !self.contains(&name) {
            match self.bind(&name, service) {
                Ok(()) => tracing::debug!(service = %name, "auto-exported remote object"),
                // Lost a race against a concurrent export of the same object.
                Err(RmiError::NameTaken(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(RemoteRef::new(
            name,
            self.inner.host.clone(),
            self.port(),
            signature_hash,
        ))
    }

    /// Start the listener. `background = true` spawns the accept loop and
    /// returns the bound address immediately; `false` serves until the
    /// process shuts down.
    pub async fn listen(&self, background: bool) -> Result<SocketAddr, RmiError> {
        if self.is_running() {
            return Err(RmiError::AlreadyListening(format!(
                "{}:{}",
                self.inner.host,
                self.port()
            )));
        }

        let bind_addr = format!("{}:{}", self.inner.host, self.port());
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| RmiError::Connection {
                endpoint: bind_addr.clone(),
                detail: e.to_string(),
            })?;
        let addr = listener.local_addr().map_err(|e| RmiError::Connection {
            endpoint: bind_addr,
            detail: e.to_string(),
        })?;

        self.inner.port.store(addr.port(), Ordering::Release);
        self.inner.running.store(true, Ordering::Release);
        tracing::info!(%addr, "registry listening");

        let app = Router::new()
            .route("/rmi", post(handle_rpc))
            .with_state(self.clone());

        if background {
            let registry = self.clone();
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, app).await {
                    tracing::error!(error = %e, "registry listener failed");
                }
                registry.inner.running.store(false, Ordering::Release);
            });
        } else {
            let result = axum::serve(listener, app).await;
            self.inner.running.store(false, Ordering::Release);
            result.map_err(|e| RmiError::Connection {
                endpoint: addr.to_string(),
                detail: e.to_string(),
            })?;
        }

        Ok(addr)
    }

    async fn dispatch_call(&self, call: CallEnvelope) -> Result<Value, RmiError> {
        let (service_name, method) = split_selector(&call.method)?;

        let (service, expected_hash) = {
            let services = self.inner.services.read().expect("registry lock");
            let bound = services
                .get(service_name)
                .ok_or_else(|| RmiError::NoSuchService(service_name.to_string()))?;
            (bound.service.clone(), bound.signature_hash.clone())
        };

        let client_hash = call
            .params
            .first()
            .and_then(Value::as_str)
            .ok_or_else(|| RmiError::bad_arguments(&call.method, "missing client hash"))?;
        if client_hash != expected_hash {
            return Err(RmiError::InterfaceMismatch {
                service: service_name.to_string(),
                expected: expected_hash,
                got: client_hash.to_string(),
            });
        }

        if !service.descriptor().has_method(method) {
            return Err(RmiError::BadMethod(call.method.clone()));
        }

        let args = call.params[1..].to_vec();
        let ctx = RmiContext::new(self.clone());
        match service.dispatch(method, args, &ctx).await? {
            Dispatched::Value(value) => Ok(value),
            Dispatched::Object(object) => Ok(self.export_object(object)?.to_value()),
        }
    }
}

fn split_selector(selector: &str) -> Result<(&str, &str), RmiError> {
    match selector.split_once(METHOD_SEP) {
        Some((service, method))
            if !service.is_empty() && !method.is_empty() && !method.contains(METHOD_SEP) =>
        {
            Ok((service, method))
        }
        _ => Err(RmiError::BadMethod(selector.to_string())),
    }
}

async fn handle_rpc(
    State(registry): State<LocalRegistry>,
    Json(call): Json<CallEnvelope>,
) -> Json<ReplyEnvelope> {
    let selector = call.method.clone();
    match registry.dispatch_call(call).await {
        Ok(result) => Json(ReplyEnvelope::ok(result)),
        Err(e) => {
            tracing::debug!(method = %selector, kind = e.fault_kind(), error = %e, "dispatch fault");
            Json(ReplyEnvelope::fault(e.to_fault()))
        }
    }
}
