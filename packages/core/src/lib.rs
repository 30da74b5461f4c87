//! Shared VaultPair types
//!
//! Everything both peers and clients agree on: the account data model, the
//! ATM command records that travel through the queue and across the peer
//! link, the service interface descriptors with their typed client stubs,
//! and the user-facing localized messages.

pub mod command;
pub mod interfaces;
pub mod messages;
pub mod models;
pub mod net;
pub mod time;

pub use command::{AtmCommand, CommandKind};
pub use models::{CardData, LoginResult, TransactionData, TransactionType, UserData, UserRecord};
