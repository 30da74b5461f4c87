//! Command executor: drives batches of commands through the ledger writer
//!
//! Runs single-threaded per invocation; the coordinator governs concurrency.
//! Client callbacks fire only for commands that originated on this peer.
//! Replicated commands arrive with their callback stripped, and the origin
//! check also rejects any reference that survived the trip.

use std::sync::Arc;

use vaultpair_core::command::CommandKind;
use vaultpair_core::interfaces::{NotifyLevel, SuccessCallbackClient};
use vaultpair_core::messages;
use vaultpair_core::AtmCommand;

use crate::ledger::{LedgerError, LedgerWriter};
use crate::metrics;

pub struct CommandExecutor {
    writer: Arc<dyn LedgerWriter>,
    local_peer_id: u32,
    http: reqwest::Client,
}

impl CommandExecutor {
    pub fn new(writer: Arc<dyn LedgerWriter>, local_peer_id: u32, http: reqwest::Client) -> Self {
        Self {
            writer,
            local_peer_id,
            http,
        }
    }

    /// Apply each command in order. Returns the commands that were applied;
    /// only those are eligible for replication.
    pub async fn exec_direct(&self, commands: Vec<AtmCommand>) -> Vec<AtmCommand> {
        let mut executed = Vec::with_capacity(commands.len());

        for command in commands {
            let outcome = match &command.kind {
                CommandKind::ChangePin { new_pin } => {
                    self.writer.change_pin(&command.card_number, new_pin).await
                }
                CommandKind::Deposit { amount } => {
                    self.writer
                        .deposit_money(&command.card_number, *amount, command.timestamp)
                        .await
                }
                CommandKind::Withdraw { amount } => {
                    self.writer
                        .withdraw_money(&command.card_number, *amount, command.timestamp)
                        .await
                }
                CommandKind::Transfer { to_card, amount } => {
                    self.writer
                        .transfer_money(&command.card_number, to_card, *amount, command.timestamp)
                        .await
                }
            };

            match outcome {
                Ok(()) => {
                    metrics::COMMANDS_EXECUTED
                        .with_label_values(&[
                            command.kind.as_str(),
                            metrics::origin_label(command.peer_id, self.local_peer_id),
                        ])
                        .inc();
                    self.notify(&command, messages::TXN_SUCCESS, NotifyLevel::Success)
                        .await;
                    executed.push(command);
                }
                Err(LedgerError::Domain(message)) => {
                    metrics::COMMANDS_FAILED
                        .with_label_values(&[command.kind.as_str(), "domain"])
                        .inc();
                    tracing::warn!(
                        command = command.kind.as_str(),
                        card = %command.card_number,
                        seq = command.seq,
                        reason = %message,
                        "command refused by ledger"
                    );
                    self.notify(&command, &message, NotifyLevel::Error).await;
                }
                Err(LedgerError::Internal(diagnostic)) => {
                    metrics::COMMANDS_FAILED
                        .with_label_values(&[command.kind.as_str(), "internal"])
                        .inc();
                    tracing::error!(
                        command = command.kind.as_str(),
                        card = %command.card_number,
                        seq = command.seq,
                        error = %diagnostic,
                        "command dropped on internal ledger error"
                    );
                }
            }
        }

        executed
    }

    /// Deliver the outcome to the originating client. A hung-up client is
    /// logged and ignored.
    async fn notify(&self, command: &AtmCommand, message: &str, level: NotifyLevel) {
        if command.peer_id != self.local_peer_id {
            return;
        }
        let Some(reference) = &command.success_callback else {
            return;
        };

        let callback = SuccessCallbackClient::from_ref(reference, &self.http);
        if let Err(e) = callback.notify(message, level).await {
            metrics::CALLBACK_FAILURES.inc();
            tracing::warn!(
                callback = %reference.service_name,
                error = %e,
                "client callback could not be delivered"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LedgerReader, MemoryLedger};
    use chrono::NaiveDate;

    async fn executor_with_card(balance: i64) -> (CommandExecutor, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        let user_id = ledger
            .register_user(
                "Test",
                NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
                "0900000009",
                "012345678909",
            )
            .await
            .unwrap();
        ledger
            .register_card("111111", "1234", balance, user_id)
            .await
            .unwrap();
        ledger
            .register_card("222222", "5678", 0, user_id)
            .await
            .unwrap();

        let executor = CommandExecutor::new(ledger.clone(), 1, reqwest::Client::new());
        (executor, ledger)
    }

    fn command(peer_id: u32, seq: u64, kind: CommandKind) -> AtmCommand {
        AtmCommand {
            peer_id,
            card_number: "111111".to_string(),
            timestamp: seq as i64,
            seq,
            success_callback: None,
            kind,
        }
    }

    #[tokio::test]
    async fn test_batch_applies_in_order() {
        let (executor, ledger) = executor_with_card(1000).await;
        let executed = executor
            .exec_direct(vec![
                command(1, 1, CommandKind::Deposit { amount: 500 }),
                command(1, 2, CommandKind::Withdraw { amount: 200 }),
                command(
                    1,
                    3,
                    CommandKind::Transfer {
                        to_card: "222222".to_string(),
                        amount: 300,
                    },
                ),
            ])
            .await;

        assert_eq!(executed.len(), 3);
        assert_eq!(executed.iter().map(|c| c.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(ledger.balance_of("111111").await, Some(1000));
        assert_eq!(ledger.balance_of("222222").await, Some(300));
    }

    #[tokio::test]
    async fn test_domain_failure_is_not_executed() {
        let (executor, ledger) = executor_with_card(100).await;
        let executed = executor
            .exec_direct(vec![
                command(1, 1, CommandKind::Withdraw { amount: 500 }),
                command(1, 2, CommandKind::Deposit { amount: 50 }),
            ])
            .await;

        // The failed withdraw is absent; the deposit still went through.
        assert_eq!(executed.len(), 1);
        assert_eq!(executed[0].seq, 2);
        assert_eq!(ledger.balance_of("111111").await, Some(150));
    }

    #[tokio::test]
    async fn test_replica_commands_apply_without_callbacks() {
        let (executor, ledger) = executor_with_card(0).await;
        let executed = executor
            .exec_direct(vec![command(2, 9, CommandKind::Deposit { amount: 700 })])
            .await;
        assert_eq!(executed.len(), 1);
        assert_eq!(ledger.balance_of("111111").await, Some(700));
    }

    #[tokio::test]
    async fn test_change_pin_through_executor() {
        let (executor, ledger) = executor_with_card(0).await;
        let executed = executor
            .exec_direct(vec![command(
                1,
                1,
                CommandKind::ChangePin {
                    new_pin: "9999".to_string(),
                },
            )])
            .await;
        assert_eq!(executed.len(), 1);
        assert!(ledger.login("111111", "9999").await.is_ok());
    }
}
