//! Error taxonomy for the remote-invocation framework
//!
//! Server-side dispatch errors travel over the wire as `Fault { kind, message }`
//! records; the stub surfaces them to callers. Transport-level failures never
//! leave the calling process and are classified as `Connection` so the
//! coordinator can apply its failover rule.

use thiserror::Error;

use crate::codec::Fault;

#[derive(Debug, Error)]
pub enum RmiError {
    /// Client and server disagree on the interface signature. Never retried.
    #[error("interface mismatch for [{service}]: server={expected} client={got}")]
    InterfaceMismatch {
        service: String,
        expected: String,
        got: String,
    },

    #[error("no service [{0}] bound in the registry")]
    NoSuchService(String),

    #[error("bad RPC method selector [{0}]")]
    BadMethod(String),

    #[error("bad arguments for [{method}]: {detail}")]
    BadArguments { method: String, detail: String },

    #[error("service name [{0}] is already bound")]
    NameTaken(String),

    #[error("registry is serving traffic; rebind of [{0}] refused")]
    ServerBusy(String),

    #[error("service [{0}] is not bound")]
    NotFound(String),

    /// Passing a local remote-object requires a running local registry.
    #[error("cannot export [{0}]: no running local registry")]
    NoLocalRegistry(String),

    #[error("registry already listening on {0}")]
    AlreadyListening(String),

    /// Transport failure: refused, reset, timed out, unreachable.
    #[error("connection failure talking to {endpoint}: {detail}")]
    Connection { endpoint: String, detail: String },

    /// Fault raised by the far side (or by an application dispatcher).
    #[error("remote fault [{kind}]: {message}")]
    Fault { kind: String, message: String },

    #[error("codec error: {0}")]
    Codec(String),
}

pub const FAULT_INTERFACE_MISMATCH: &str = "interface-mismatch";
pub const FAULT_NO_SUCH_SERVICE: &str = "no-such-service";
pub const FAULT_BAD_METHOD: &str = "bad-method";
pub const FAULT_BAD_ARGUMENTS: &str = "bad-arguments";
pub const FAULT_DOMAIN: &str = "domain";
pub const FAULT_INTERNAL: &str = "internal";

impl RmiError {
    /// Application-level domain fault (business-rule violation).
    pub fn domain(message: impl Into<String>) -> Self {
        RmiError::Fault {
            kind: FAULT_DOMAIN.to_string(),
            message: message.into(),
        }
    }

    /// Application-level internal fault. Diagnostics stay server-side.
    pub fn internal(message: impl Into<String>) -> Self {
        RmiError::Fault {
            kind: FAULT_INTERNAL.to_string(),
            message: message.into(),
        }
    }

    pub fn bad_arguments(method: &str, detail: impl Into<String>) -> Self {
        RmiError::BadArguments {
            method: method.to_string(),
            detail: detail.into(),
        }
    }

    /// Wire kind for this error when it is returned to a remote caller.
    pub fn fault_kind(&self) -> &str {
        match self {
            RmiError::InterfaceMismatch { .. } => FAULT_INTERFACE_MISMATCH,
            RmiError::NoSuchService(_) => FAULT_NO_SUCH_SERVICE,
            RmiError::BadMethod(_) => FAULT_BAD_METHOD,
            RmiError::BadArguments { .. } => FAULT_BAD_ARGUMENTS,
            RmiError::NameTaken(_) => "name-taken",
            RmiError::ServerBusy(_) => "server-busy",
            RmiError::NotFound(_) => "not-found",
            RmiError::NoLocalRegistry(_) => "no-local-registry",
            RmiError::AlreadyListening(_) => FAULT_INTERNAL,
            RmiError::Connection { .. } => "connection",
            RmiError::Fault { kind, .. } => kind,
            RmiError::Codec(_) => FAULT_INTERNAL,
        }
    }

    pub fn to_fault(&self) -> Fault {
        Fault {
            kind: self.fault_kind().to_string(),
            message: self.to_string(),
        }
    }

    pub fn from_fault(fault: Fault) -> Self {
        RmiError::Fault {
            kind: fault.kind,
            message: fault.message,
        }
    }

    /// True for transport-level failures: the coordinator's failover rule
    /// keys on this, never on remote faults.
    pub fn is_connection(&self) -> bool {
        matches!(self, RmiError::Connection { .. })
    }

    pub fn is_fault_kind(&self, kind: &str) -> bool {
        matches!(self, RmiError::Fault { kind: k, .. } if k == kind)
    }

    /// Classify a reqwest failure against an endpoint. A garbled reply from
    /// a live server is a codec problem, not a dead peer; everything else
    /// (refused, reset, timeout) counts as a connection failure.
    pub fn from_transport(endpoint: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            return RmiError::Codec(format!("{endpoint}: {err}"));
        }
        RmiError::Connection {
            endpoint: endpoint.to_string(),
            detail: err.to_string(),
        }
    }
}
