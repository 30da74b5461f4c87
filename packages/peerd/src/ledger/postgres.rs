//! Postgres ledger backend
//!
//! All operations go through stored procedures; the procedures own the
//! business rules and signal violations with `RAISE EXCEPTION` (SQLSTATE
//! `P0001`), which maps to `LedgerError::Domain` with the raised message.

use async_trait::async_trait;
use chrono::NaiveDate;
use eyre::{Result, WrapErr};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use vaultpair_core::{CardData, TransactionData, TransactionType, UserData, UserRecord};

use super::{LedgerError, LedgerReader, LedgerWriter};

const DOMAIN_SQLSTATE: &str = "P0001";

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    /// Connect and run pending migrations (schema + stored procedures).
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .wrap_err("Failed to connect to database")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .wrap_err("Failed to run database migrations")?;
        Ok(Self { pool })
    }
}

fn map_sql_err(e: sqlx::Error) -> LedgerError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(DOMAIN_SQLSTATE) {
            return LedgerError::Domain(db.message().to_string());
        }
    }
    LedgerError::Internal(e.to_string())
}

fn parse_transaction_row(row: &sqlx::postgres::PgRow) -> Result<TransactionData, LedgerError> {
    let kind: String = row.try_get("transaction_type").map_err(map_sql_err)?;
    let transaction_type: TransactionType = kind.parse().map_err(LedgerError::Internal)?;
    Ok(TransactionData {
        amount: row.try_get("amount").map_err(map_sql_err)?,
        transaction_type,
        from_card_number: row.try_get("from_card_number").map_err(map_sql_err)?,
        to_card_number: row.try_get("to_card_number").map_err(map_sql_err)?,
        timestamp: row.try_get("ts").map_err(map_sql_err)?,
    })
}

#[async_trait]
impl LedgerReader for PgLedger {
    async fn get_all_users(&self) -> Result<Vec<UserRecord>, LedgerError> {
        let rows = sqlx::query("SELECT id, name, dob, phone, citizen_id FROM get_all_users()")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sql_err)?;

        rows.iter()
            .map(|row| {
                Ok(UserRecord {
                    id: row.try_get("id").map_err(map_sql_err)?,
                    name: row.try_get("name").map_err(map_sql_err)?,
                    dob: row.try_get("dob").map_err(map_sql_err)?,
                    phone: row.try_get("phone").map_err(map_sql_err)?,
                    citizen_id: row.try_get("citizen_id").map_err(map_sql_err)?,
                })
            })
            .collect()
    }

    async fn get_cards_by_user_id(&self, user_id: i64) -> Result<Vec<CardData>, LedgerError> {
        let rows =
            sqlx::query("SELECT owner_id, number, pin, balance FROM get_cards_by_user_id($1)")
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
                .map_err(map_sql_err)?;

        rows.iter()
            .map(|row| {
                Ok(CardData {
                    owner_id: row.try_get("owner_id").map_err(map_sql_err)?,
                    number: row.try_get("number").map_err(map_sql_err)?,
                    pin: row.try_get("pin").map_err(map_sql_err)?,
                    balance: row.try_get("balance").map_err(map_sql_err)?,
                })
            })
            .collect()
    }

    async fn login(&self, card_number: &str, pin: &str) -> Result<UserData, LedgerError> {
        let row = sqlx::query("SELECT id, name, dob, phone, citizen_id FROM login($1, $2)")
            .bind(card_number)
            .bind(pin)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sql_err)?;

        Ok(UserData {
            id: row.try_get("id").map_err(map_sql_err)?,
            name: row.try_get("name").map_err(map_sql_err)?,
            dob: row.try_get("dob").map_err(map_sql_err)?,
            phone: row.try_get("phone").map_err(map_sql_err)?,
            citizen_id: row.try_get("citizen_id").map_err(map_sql_err)?,
            card_number: card_number.to_string(),
        })
    }

    async fn check_balance(&self, card_number: &str) -> Result<i64, LedgerError> {
        let row = sqlx::query("SELECT check_balance($1) AS balance")
            .bind(card_number)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sql_err)?;
        row.try_get("balance").map_err(map_sql_err)
    }

    async fn get_transaction_history(
        &self,
        card_number: &str,
    ) -> Result<Vec<TransactionData>, LedgerError> {
        let rows = sqlx::query(
            "SELECT amount, transaction_type, from_card_number, to_card_number, ts \
             FROM get_transaction_history($1)",
        )
        .bind(card_number)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sql_err)?;

        rows.iter().map(parse_transaction_row).collect()
    }
}

#[async_trait]
impl LedgerWriter for PgLedger {
    async fn register_user(
        &self,
        name: &str,
        dob: NaiveDate,
        phone: &str,
        citizen_id: &str,
    ) -> Result<i64, LedgerError> {
        let row = sqlx::query("SELECT register_user($1, $2, $3, $4) AS id")
            .bind(name)
            .bind(dob)
            .bind(phone)
            .bind(citizen_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sql_err)?;
        row.try_get("id").map_err(map_sql_err)
    }

    async fn register_card(
        &self,
        card_number: &str,
        pin: &str,
        balance: i64,
        user_id: i64,
    ) -> Result<(), LedgerError> {
        sqlx::query("SELECT register_card($1, $2, $3, $4)")
            .bind(card_number)
            .bind(pin)
            .bind(balance)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(map_sql_err)?;
        Ok(())
    }

    async fn deposit_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        sqlx::query("SELECT deposit_money($1, $2, $3)")
            .bind(card_number)
            .bind(amount)
            .bind(transaction_time)
            .execute(&self.pool)
            .await
            .map_err(map_sql_err)?;
        Ok(())
    }

    async fn withdraw_money(
        &self,
        card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        sqlx::query("SELECT withdraw_money($1, $2, $3)")
            .bind(card_number)
            .bind(amount)
            .bind(transaction_time)
            .execute(&self.pool)
            .await
            .map_err(map_sql_err)?;
        Ok(())
    }

    async fn transfer_money(
        &self,
        from_card_number: &str,
        to_card_number: &str,
        amount: i64,
        transaction_time: i64,
    ) -> Result<(), LedgerError> {
        sqlx::query("SELECT transfer_money($1, $2, $3, $4)")
            .bind(from_card_number)
            .bind(to_card_number)
            .bind(amount)
            .bind(transaction_time)
            .execute(&self.pool)
            .await
            .map_err(map_sql_err)?;
        Ok(())
    }

    async fn change_pin(&self, card_number: &str, new_pin: &str) -> Result<(), LedgerError> {
        sqlx::query("SELECT change_pin($1, $2)")
            .bind(card_number)
            .bind(new_pin)
            .execute(&self.pool)
            .await
            .map_err(map_sql_err)?;
        Ok(())
    }
}
