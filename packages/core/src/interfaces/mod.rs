//! Service interface descriptors and typed client stubs
//!
//! Each remote interface is declared once here as data (name + method
//! signatures) and paired with a typed client over `RpcStub`. Servers
//! implement the matching dispatch in their service modules; both sides hash
//! the same descriptor, so a drifted build is refused at the first call.

pub mod auth;
pub mod callback;
pub mod peer;
pub mod user;

pub use auth::{AuthClient, AUTH_SERVICE, AUTH_SERVICE_NAME};
pub use callback::{
    NotifyLevel, PingCallbackClient, SuccessCallbackClient, PING_CALLBACK, SUCCESS_CALLBACK,
};
pub use peer::{PeerClient, PEER_SERVICE, PEER_SERVICE_NAME};
pub use user::{UserClient, USER_SERVICE};
