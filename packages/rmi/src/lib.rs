//! VaultPair remote-invocation framework
//!
//! One process calls strongly-typed methods on objects living in another
//! process. Interfaces are matched by signature hash, remote references are
//! plain data, and local objects passed as arguments (callbacks) are
//! auto-exported through the caller's own registry.

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod hash;
pub mod registry;
pub mod remote;
pub mod stub;

pub use codec::{CallEnvelope, Fault, RemoteRef, ReplyEnvelope, METHOD_SEP, OBJECT_SEP};
pub use descriptor::{InterfaceDescriptor, MethodSig};
pub use error::RmiError;
pub use registry::LocalRegistry;
pub use remote::{Dispatched, ObjectIdentity, RemoteService, RmiContext};
pub use stub::{RemoteRegistry, RpcStub};
