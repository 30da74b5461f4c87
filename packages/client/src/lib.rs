//! VaultPair client SDK
//!
//! Connects to either peer (failing over to the other on connection
//! failure), runs a local registry so the serving peer can deliver
//! callbacks, and exposes a typed session handle after login.

pub mod callbacks;
pub mod config;
pub mod teller;

pub use callbacks::{NotifyCallback, PingResponder};
pub use config::ClientConfig;
pub use teller::{Session, Teller};
