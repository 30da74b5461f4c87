//! Remote-capable service objects and the dispatch context

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::codec::RemoteRef;
use crate::descriptor::InterfaceDescriptor;
use crate::error::RmiError;
use crate::registry::LocalRegistry;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Per-object identity: a process-unique id plus the name the object was
/// exported under, once it has been bound into a registry.
///
/// The exported name is stable across repeated exports; user code reads it to
/// unbind the object explicitly when a session ends.
#[derive(Debug, Default)]
pub struct ObjectIdentity {
    object_id: OnceLock<u64>,
    exported_name: OnceLock<String>,
}

impl ObjectIdentity {
    pub fn new() -> Self {
        let identity = Self::default();
        identity
            .object_id
            .set(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
            .expect("fresh identity");
        identity
    }

    pub fn object_id(&self) -> u64 {
        *self.object_id.get_or_init(|| NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn exported_name(&self) -> Option<&str> {
        self.exported_name.get().map(String::as_str)
    }

    /// Record the name this object was bound under. First write wins, which
    /// keeps the name stable across repeated auto-exports.
    pub(crate) fn record_export(&self, name: &str) {
        let _ = self.exported_name.set(name.to_string());
    }
}

/// Outcome of a dispatched method.
pub enum Dispatched {
    /// Plain wire value (possibly null).
    Value(Value),
    /// A local remote-object: the registry binds it under a synthetic name
    /// and returns its remote reference to the caller.
    Object(Arc<dyn RemoteService>),
}

impl std::fmt::Debug for Dispatched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Dispatched::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Dispatched::Object(_) => f.debug_tuple("Object").finish_non_exhaustive(),
        }
    }
}

impl Dispatched {
    pub fn null() -> Self {
        Dispatched::Value(Value::Null)
    }

    pub fn value<T: Serialize>(value: &T) -> Result<Self, RmiError> {
        serde_json::to_value(value)
            .map(Dispatched::Value)
            .map_err(|e| RmiError::Codec(e.to_string()))
    }
}

/// A service object callable from a remote process.
///
/// Each implementation declares its interface descriptor and routes inbound
/// calls by method name. The registry has already verified the caller's
/// signature hash and checked the method exists before `dispatch` runs.
#[async_trait]
pub trait RemoteService: Send + Sync + 'static {
    fn descriptor(&self) -> &'static InterfaceDescriptor;

    fn identity(&self) -> &ObjectIdentity;

    /// Concrete type name, used to build synthetic service names for
    /// auto-exported objects (`ClassName#ObjectId`).
    fn class_name(&self) -> &'static str;

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError>;
}

/// Explicit dispatch/export context, threaded through stubs and handlers in
/// place of any process-global registry.
#[derive(Clone, Debug)]
pub struct RmiContext {
    pub registry: LocalRegistry,
    pub http: reqwest::Client,
}

impl RmiContext {
    pub fn new(registry: LocalRegistry) -> Self {
        let http = registry.http_client();
        Self { registry, http }
    }

    /// Bind a local remote-object into the attached registry (idempotently)
    /// and return its remote reference. Fails with `NoLocalRegistry` when the
    /// registry is not serving.
    pub fn export(&self, service: &Arc<dyn RemoteService>) -> Result<RemoteRef, RmiError> {
        if !self.registry.is_running() {
            return Err(RmiError::NoLocalRegistry(service.class_name().to_string()));
        }
        self.registry.export_object(service.clone())
    }
}
