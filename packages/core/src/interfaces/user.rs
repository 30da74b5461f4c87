//! Per-session user service interface
//!
//! One instance of this service is bound per login, under the opaque session
//! id the client received from `auth@login`. Reads answer immediately; writes
//! enqueue a command and deliver their outcome through the callback.

use std::sync::Arc;

use serde_json::json;

use rmi::{InterfaceDescriptor, MethodSig, RemoteService, RmiError, RpcStub};

use crate::models::{TransactionData, UserData};

pub static USER_SERVICE: InterfaceDescriptor = InterfaceDescriptor::new(
    "UserService",
    &[
        MethodSig {
            name: "get_balance",
            params: &[],
            returns: "int",
        },
        MethodSig {
            name: "get_transaction_history",
            params: &[],
            returns: "array<record>",
        },
        MethodSig {
            name: "get_info",
            params: &[],
            returns: "record",
        },
        MethodSig {
            name: "change_pin",
            params: &["new_pin: string", "callback: SuccessCallback"],
            returns: "null",
        },
        MethodSig {
            name: "deposit",
            params: &["amount: int", "callback: SuccessCallback"],
            returns: "null",
        },
        MethodSig {
            name: "withdraw",
            params: &["amount: int", "callback: SuccessCallback"],
            returns: "null",
        },
        MethodSig {
            name: "transfer",
            params: &["to_card: string", "amount: int", "callback: SuccessCallback"],
            returns: "null",
        },
        MethodSig {
            name: "logout",
            params: &["callback: SuccessCallback"],
            returns: "null",
        },
    ],
);

/// Typed client over a bound session service.
#[derive(Clone, Debug)]
pub struct UserClient {
    stub: RpcStub,
}

impl UserClient {
    pub fn new(stub: RpcStub) -> Self {
        Self { stub }
    }

    pub fn lookup(registry: &rmi::RemoteRegistry, session_id: &str) -> Self {
        Self::new(registry.lookup(session_id, &USER_SERVICE))
    }

    pub fn session_id(&self) -> &str {
        self.stub.service_name()
    }

    pub async fn get_balance(&self) -> Result<i64, RmiError> {
        let value = self.stub.invoke("get_balance", vec![]).await?;
        value
            .as_i64()
            .ok_or_else(|| RmiError::Codec("balance is not an integer".to_string()))
    }

    pub async fn get_info(&self) -> Result<UserData, RmiError> {
        let value = self.stub.invoke("get_info", vec![]).await?;
        serde_json::from_value(value).map_err(|e| RmiError::Codec(e.to_string()))
    }

    pub async fn get_transaction_history(&self) -> Result<Vec<TransactionData>, RmiError> {
        let value = self.stub.invoke("get_transaction_history", vec![]).await?;
        serde_json::from_value(value).map_err(|e| RmiError::Codec(e.to_string()))
    }

    pub async fn deposit(
        &self,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        self.stub
            .invoke("deposit", vec![json!(amount), callback_arg])
            .await
            .map(|_| ())
    }

    pub async fn withdraw(
        &self,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        self.stub
            .invoke("withdraw", vec![json!(amount), callback_arg])
            .await
            .map(|_| ())
    }

    pub async fn transfer(
        &self,
        to_card: &str,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        self.stub
            .invoke("transfer", vec![json!(to_card), json!(amount), callback_arg])
            .await
            .map(|_| ())
    }

    pub async fn change_pin(
        &self,
        new_pin: &str,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        self.stub
            .invoke("change_pin", vec![json!(new_pin), callback_arg])
            .await
            .map(|_| ())
    }

    pub async fn logout(&self, callback: &Arc<dyn RemoteService>) -> Result<(), RmiError> {
        let callback_arg = self.stub.export_arg(callback)?;
        self.stub
            .invoke("logout", vec![callback_arg])
            .await
            .map(|_| ())
    }
}
