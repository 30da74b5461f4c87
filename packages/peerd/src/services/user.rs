//! Per-session user service
//!
//! Bound under the session id at login, unbound at logout. Reads go straight
//! to the ledger reader and need no token; writes become queued commands
//! whose outcome arrives through the client's callback.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use rmi::{
    codec, Dispatched, InterfaceDescriptor, LocalRegistry, ObjectIdentity, RemoteRef,
    RemoteService, RmiContext, RmiError,
};
use vaultpair_core::command::CommandKind;
use vaultpair_core::interfaces::{NotifyLevel, SuccessCallbackClient, USER_SERVICE};
use vaultpair_core::messages;
use vaultpair_core::time::MonotonicClock;
use vaultpair_core::{AtmCommand, UserData};

use crate::ledger::LedgerReader;
use crate::queue::CommandQueue;

use super::ledger_fault;

pub struct UserService {
    identity: ObjectIdentity,
    session_id: String,
    user: UserData,
    registry: LocalRegistry,
    reader: Arc<dyn LedgerReader>,
    queue: Arc<CommandQueue>,
    clock: Arc<MonotonicClock>,
    peer_id: u32,
}

impl UserService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        user: UserData,
        registry: LocalRegistry,
        reader: Arc<dyn LedgerReader>,
        queue: Arc<CommandQueue>,
        clock: Arc<MonotonicClock>,
        peer_id: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
            session_id,
            user,
            registry,
            reader,
            queue,
            clock,
            peer_id,
        })
    }

    /// Build and enqueue a write command. The sequence number is stamped by
    /// the queue; the caller sees the outcome through its callback.
    fn enqueue(&self, kind: CommandKind, callback: RemoteRef) {
        self.queue.add(AtmCommand {
            peer_id: self.peer_id,
            card_number: self.user.card_number.clone(),
            timestamp: self.clock.next(),
            seq: 0,
            success_callback: Some(callback),
            kind,
        });
    }
}

#[async_trait]
impl RemoteService for UserService {
    fn descriptor(&self) -> &'static InterfaceDescriptor {
        &USER_SERVICE
    }

    fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    fn class_name(&self) -> &'static str {
        "UserService"
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError> {
        match method {
            "get_balance" => {
                codec::expect_arity(method, &args, 0)?;
                let balance = self
                    .reader
                    .check_balance(&self.user.card_number)
                    .await
                    .map_err(ledger_fault)?;
                Dispatched::value(&balance)
            }
            "get_info" => {
                codec::expect_arity(method, &args, 0)?;
                Dispatched::value(&self.user)
            }
            "get_transaction_history" => {
                codec::expect_arity(method, &args, 0)?;
                let history = self
                    .reader
                    .get_transaction_history(&self.user.card_number)
                    .await
                    .map_err(ledger_fault)?;
                Dispatched::value(&history)
            }
            "deposit" => {
                codec::expect_arity(method, &args, 2)?;
                let amount: i64 = codec::arg(method, &args, 0)?;
                let callback = codec::arg_remote_ref(method, &args, 1)?;
                self.enqueue(CommandKind::Deposit { amount }, callback);
                Ok(Dispatched::null())
            }
            "withdraw" => {
                codec::expect_arity(method, &args, 2)?;
                let amount: i64 = codec::arg(method, &args, 0)?;
                let callback = codec::arg_remote_ref(method, &args, 1)?;
                self.enqueue(CommandKind::Withdraw { amount }, callback);
                Ok(Dispatched::null())
            }
            "transfer" => {
                codec::expect_arity(method, &args, 3)?;
                let to_card: String = codec::arg(method, &args, 0)?;
                let amount: i64 = codec::arg(method, &args, 1)?;
                let callback = codec::arg_remote_ref(method, &args, 2)?;
                self.enqueue(CommandKind::Transfer { to_card, amount }, callback);
                Ok(Dispatched::null())
            }
            "change_pin" => {
                codec::expect_arity(method, &args, 2)?;
                let new_pin: String = codec::arg(method, &args, 0)?;
                let callback = codec::arg_remote_ref(method, &args, 1)?;
                self.enqueue(CommandKind::ChangePin { new_pin }, callback);
                Ok(Dispatched::null())
            }
            "logout" => {
                codec::expect_arity(method, &args, 1)?;
                let callback_ref = codec::arg_remote_ref(method, &args, 0)?;

                tracing::info!(user = %self.user.name, session = %self.session_id, "logout");
                self.registry.unbind(&self.session_id)?;

                let callback = SuccessCallbackClient::from_ref(&callback_ref, &ctx.http);
                if let Err(e) = callback
                    .notify(messages::LOGGED_OUT, NotifyLevel::Success)
                    .await
                {
                    tracing::warn!(error = %e, "logout callback undeliverable");
                }
                Ok(Dispatched::null())
            }
            other => Err(RmiError::BadMethod(other.to_string())),
        }
    }
}
