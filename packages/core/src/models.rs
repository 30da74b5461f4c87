use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity record as stored by the ledger. Phone and citizen id are unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub dob: NaiveDate,
    pub phone: String,
    pub citizen_id: String,
}

/// Authenticated user snapshot, as returned by the ledger's `login`.
///
/// `card_number` is the card the session was opened with; phone and
/// citizen id are unique per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserData {
    pub id: i64,
    pub name: String,
    pub dob: NaiveDate,
    pub phone: String,
    pub citizen_id: String,
    pub card_number: String,
}

/// Payment instrument. Balance is a non-negative integer in the smallest
/// currency unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardData {
    pub owner_id: i64,
    pub number: String,
    pub pin: String,
    pub balance: i64,
}

/// Kind of an append-only transaction log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransactionType {
    Deposit,
    Withdraw,
    TransferOut,
    TransferIn,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Deposit => "deposit",
            TransactionType::Withdraw => "withdraw",
            TransactionType::TransferOut => "transfer-out",
            TransactionType::TransferIn => "transfer-in",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deposit" => Ok(TransactionType::Deposit),
            "withdraw" => Ok(TransactionType::Withdraw),
            "transfer-out" => Ok(TransactionType::TransferOut),
            "transfer-in" => Ok(TransactionType::TransferIn),
            other => Err(format!("unknown transaction type [{other}]")),
        }
    }
}

/// One transaction log entry; timestamp is milliseconds since epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionData {
    pub amount: i64,
    pub transaction_type: TransactionType,
    pub from_card_number: String,
    pub to_card_number: String,
    pub timestamp: i64,
}

/// Result of `auth@login`. `session_id` names the per-session user service
/// bound in the serving peer's registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResult {
    pub success: bool,
    pub message: String,
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_transaction_type_wire_names() {
        assert_eq!(
            serde_json::to_value(TransactionType::TransferOut).unwrap(),
            json!("transfer-out")
        );
        let back: TransactionType = serde_json::from_value(json!("transfer-in")).unwrap();
        assert_eq!(back, TransactionType::TransferIn);
        assert_eq!(TransactionType::Deposit.to_string(), "deposit");
    }

    #[test]
    fn test_user_data_dob_serializes_as_date_string() {
        let user = UserData {
            id: 1,
            name: "Nguyễn Văn A".to_string(),
            dob: NaiveDate::from_ymd_opt(2000, 5, 20).unwrap(),
            phone: "0900000001".to_string(),
            citizen_id: "012345678901".to_string(),
            card_number: "111111".to_string(),
        };
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(value["dob"], json!("2000-05-20"));
        let back: UserData = serde_json::from_value(value).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn test_login_result_null_session() {
        let result = LoginResult {
            success: false,
            message: "Đăng nhập thất bại!".to_string(),
            session_id: None,
        };
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["session_id"], serde_json::Value::Null);
    }
}
