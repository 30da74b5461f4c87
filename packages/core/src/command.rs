//! ATM write commands
//!
//! One record per pending write. Commands are born on the peer a client is
//! connected to and run through that peer's queue and executor. Executed
//! commands are replicated to the other peer with the client callback
//! stripped: the replicating peer must never notify a client it did not
//! serve.

use serde::{Deserialize, Serialize};

use rmi::RemoteRef;

/// Variant part of a command. Tagged on the wire as `command_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "kebab-case")]
pub enum CommandKind {
    ChangePin { new_pin: String },
    Deposit { amount: i64 },
    Withdraw { amount: i64 },
    Transfer { to_card: String, amount: i64 },
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::ChangePin { .. } => "change-pin",
            CommandKind::Deposit { .. } => "deposit",
            CommandKind::Withdraw { .. } => "withdraw",
            CommandKind::Transfer { .. } => "transfer",
        }
    }
}

/// One pending write command.
///
/// `timestamp` is monotonic within the origin peer's queue, and `seq` is the
/// per-origin sequence number the queue stamps at enqueue time; replicas use
/// it to drop re-delivered commands after a lost acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtmCommand {
    pub peer_id: u32,
    pub card_number: String,
    pub timestamp: i64,
    #[serde(default)]
    pub seq: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_callback: Option<RemoteRef>,
    #[serde(flatten)]
    pub kind: CommandKind,
}

impl AtmCommand {
    /// Copy for peer replication: identical except the callback reference is
    /// stripped.
    pub fn sanitized(&self) -> AtmCommand {
        AtmCommand {
            success_callback: None,
            ..self.clone()
        }
    }
}
