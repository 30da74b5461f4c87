//! In-memory ledger backend
//!
//! Same contract and business rules as the Postgres backend, held in plain
//! maps. Used by the test suites and by `DATABASE_URL=memory:` single-box
//! runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use vaultpair_core::messages;
use vaultpair_core::{CardData, TransactionData, TransactionType, UserData, UserRecord};

use super::{LedgerError, LedgerReader, LedgerWriter};

#[derive(Default)]
struct State {
    users: Vec<UserRecord>,
    cards: HashMap<String, CardData>,
    transactions: Vec<TransactionData>,
    next_user_id: i64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<State>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current balance without going through the reader trait; test helper.
    pub async fn balance_of(&self, card_number: &str) -> Option<i64> {
        let state = self.state.lock().await;
        state.cards.get(card_number).map(|c| c.balance)
    }

    /// Number of recorded transactions; test helper.
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

fn check_amount(amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::Domain(messages::INVALID_AMOUNT.to_string()));
    }
    Ok(())
}

fn card_not_found() -> LedgerError {
    LedgerError::Domain(messages::CARD_NOT_FOUND.to_string())
}

#[async_trait]
impl LedgerReader for MemoryLedger {
    async fn get_all_users(&self) -> Result<Vec<UserRecord>, LedgerError> {
        Ok(self.state.lock().await.users.clone())
    }

    async fn get_cards_by_user_id(&self, user_id: i64) -> Result<Vec<CardData>, LedgerError> {
        let state = self.state.lock().await;
        Ok(state
            .cards
            .values()
            .filter(|c| c.owner_id == user_id)
            .cloned()
            .collect())
    }

    async fn login(&self, card_number: &str, pin: &str) -> Result<UserData, LedgerError> {
        let state = self.state.lock().await;
        let card = state
            .cards
            .get(card_number)
            .filter(|c| c.pin == pin)
            .ok_or_else(|| LedgerError::Domain(messages::LOGIN_FAILED.to_string()))?;
        let user = state
            .users
            .iter()
            .find(|u| u.id == card.owner_id)
            .ok_or_else(|| LedgerError::Internal(format!("card [{card_number}] has no owner")))?;
        Ok(UserData {
            id: user.id,
            name: user.name.clone(),
            dob: user.dob,
            phone: user.phone.clone(),
            citizen_id: user.citizen_id.clone(),
            card_number: card_number.to_string(),
        })
    }

    async fn check_balance(&self, card_number: &str) -> Result<i64, LedgerError> {
        let state = self.state.lock().await;
        state
            .cards
            .get(card_number)
            .map(|c| c.balance)
            .ok_or_else(card_not_found)
    }

    async fn get_transaction_history(
        &self,
        card_number: &str,
    ) -> Result<Vec<TransactionData>, LedgerError> {
        let state = self.state.lock().await;
        if !state.cards.contains_key(card_number) {
            return Err(card_not_found());
        }
        Ok(state
            .transactions
            .iter()
            .filter(|t| match t.transaction_type {
                TransactionType::TransferOut => t.from_card_number == card_number,
                TransactionType::TransferIn => t.to_card_number == card_number,
                _ => t.from_card_number == card_number,
            })
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LedgerWriter for MemoryLedger {
    async fn register_user(
        &self,
        name: &str,
        dob: NaiveDate,
        phone: &str,
        citizen_id: &str,
    ) -> Result<i64, LedgerError> {
        let mut state = self.state.lock().await;
        if state
            .users
            .iter()
            .any(|u| u.phone == phone || u.citizen_id == citizen_id)
        {
            return Err(LedgerError::Domain(messages::USER_EXISTS.to_string()));
        }
        state.next_user_id += 1;
        let id = state.next_user_id;
        state.users.push(UserRecord {
            id,
            name: name.to_string(),
            dob,
            phone: phone.to_string(),
            citizen_id: citizen_id.to_string(),
        });
        Ok(id)
    }

    async fn register_card(
        &self,
        card_number: &str,
        pin: &str,
        balance: i64,
        user_id: i64,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if state.cards.contains_key(card_number) {
            return Err(LedgerError::Domain(messages::CARD_EXISTS.to_string()));
        }
        if !state.users.iter().any(|u| u.id == user_id) {
            return Err(LedgerError::Domain(messages::USER_EXISTS.to_string()));
        }
        state.cards.insert(
            card_number.to_string(),
            CardData {
                owner_id: user_id,
                number: card_number.to_string(),
                pin: pin.to_string(),
                balance,
            },
        );
        Ok(())
    }

    async fn deposit_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let card = state.cards.get_mut(card_number).ok_or_else(card_not_found)?;
        card.balance += amount;
        state.transactions.push(TransactionData {
            amount,
            transaction_type: TransactionType::Deposit,
            from_card_number: card_number.to_string(),
            to_card_number: card_number.to_string(),
            timestamp: transaction_time,
        });
        Ok(())
    }

    async fn withdraw_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        check_amount(amount)?;
        let mut state = self.state.lock().await;
        let state = &mut *state;
        let card = state.cards.get_mut(card_number).ok_or_else(card_not_found)?;
        if card.balance < amount {
            return Err(LedgerError::Domain(
                messages::INSUFFICIENT_FUNDS.to_string(),
            ));
        }
        card.balance -= amount;
        state.transactions.push(TransactionData {
            amount,
            transaction_type: TransactionType::Withdraw,
            from_card_number: card_number.to_string(),
            to_card_number: card_number.to_string(),
            timestamp: transaction_time,
        });
        Ok(())
    }

    async fn transfer_money(
        &self,
        from_card_number: &str,
        to_card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        check_amount(amount)?;
        if from_card_number == to_card_number {
            return Err(LedgerError::Domain(messages::SELF_TRANSFER.to_string()));
        }

        let mut state = self.state.lock().await;
        let state = &mut *state;
        if !state.cards.contains_key(to_card_number) {
            return Err(card_not_found());
        }
        let from = state
            .cards
            .get_mut(from_card_number)
            .ok_or_else(card_not_found)?;
        if from.balance < amount {
            return Err(LedgerError::Domain(
                messages::INSUFFICIENT_FUNDS.to_string(),
            ));
        }
        from.balance -= amount;
        state
            .cards
            .get_mut(to_card_number)
            .expect("destination card checked above")
            .balance += amount;

        state.transactions.push(TransactionData {
            amount,
            transaction_type: TransactionType::TransferOut,
            from_card_number: from_card_number.to_string(),
            to_card_number: to_card_number.to_string(),
            timestamp: transaction_time,
        });
        state.transactions.push(TransactionData {
            amount,
            transaction_type: TransactionType::TransferIn,
            from_card_number: from_card_number.to_string(),
            to_card_number: to_card_number.to_string(),
            timestamp: transaction_time,
        });
        Ok(())
    }

    async fn change_pin(&self, card_number: &str, new_pin: &str) -> Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        let card = state.cards.get_mut(card_number).ok_or_else(card_not_found)?;
        if card.pin == new_pin {
            return Err(LedgerError::Domain(messages::PIN_UNCHANGED.to_string()));
        }
        card.pin = new_pin.to_string();
        Ok(())
    }
}
