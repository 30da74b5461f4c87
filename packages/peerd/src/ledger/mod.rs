//! Ledger boundary: the account database behind typed reader/writer traits
//!
//! Business rules (sufficient balance, no self-transfer, unique PIN change,
//! known card) live behind the writer, which reports violations as
//! `LedgerError::Domain` carrying the localized message for the client.
//! Anything else is `Internal` and stays server-side.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use eyre::{eyre, Result};
use thiserror::Error;

use vaultpair_core::{CardData, TransactionData, UserData, UserRecord};

pub mod memory;
pub mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business-rule violation; the message is client-facing and localized.
    #[error("{0}")]
    Domain(String),
    /// System failure; the diagnostic is for operators, never for clients.
    #[error("ledger internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    pub fn is_domain(&self) -> bool {
        matches!(self, LedgerError::Domain(_))
    }
}

/// Read-side operations. Run concurrently with writes; a read may observe
/// either pre- or post-state of an in-flight write on the same card.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    async fn get_all_users(&self) -> Result<Vec<UserRecord>, LedgerError>;

    async fn get_cards_by_user_id(&self, user_id: i64) -> Result<Vec<CardData>, LedgerError>;

    /// Authenticate card number + PIN and return the user snapshot.
    async fn login(&self, card_number: &str, pin: &str) -> Result<UserData, LedgerError>;

    async fn check_balance(&self, card_number: &str) -> Result<i64, LedgerError>;

    async fn get_transaction_history(
        &self,
        card_number: &str,
    ) -> Result<Vec<TransactionData>, LedgerError>;
}

/// Write-side operations, serialized by the coordinator/executor pipeline.
#[async_trait]
pub trait LedgerWriter: Send + Sync {
    async fn register_user(
        &self,
        name: &str,
        dob: NaiveDate,
        phone: &str,
        citizen_id: &str,
    ) -> Result<i64, LedgerError>;

    async fn register_card(
        &self,
        card_number: &str,
        pin: &str,
        balance: i64,
        user_id: i64,
    ) -> Result<(), LedgerError>;

    async fn deposit_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError>;

    async fn withdraw_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError>;

    async fn transfer_money(
        &self,
        from_card_number: &str,
        to_card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError>;

    async fn change_pin(&self, card_number: &str, new_pin: &str) -> Result<(), LedgerError>;
}

/// A connected ledger: one reader and one writer over the same store.
#[derive(Clone)]
pub struct Ledger {
    pub reader: Arc<dyn LedgerReader>,
    pub writer: Arc<dyn LedgerWriter>,
}

impl Ledger {
    /// Connect by URL scheme: `postgres://…` for the production backend,
    /// the literal `memory:` for the in-process backend.
    pub async fn connect(url: &str) -> Result<Ledger> {
        if url == "memory:" {
            let ledger = Arc::new(MemoryLedger::new());
            return Ok(Ledger {
                reader: ledger.clone(),
                writer: ledger,
            });
        }
        if url.starts_with("postgres") {
            let ledger = Arc::new(PgLedger::connect(url).await?);
            return Ok(Ledger {
                reader: ledger.clone(),
                writer: ledger,
            });
        }
        Err(eyre!("unsupported database url scheme"))
    }

    /// Wrap an in-memory backend (tests, demos).
    pub fn in_memory() -> (Ledger, Arc<MemoryLedger>) {
        let backend = Arc::new(MemoryLedger::new());
        (
            Ledger {
                reader: backend.clone(),
                writer: backend.clone(),
            },
            backend,
        )
    }
}
