//! `auth` service: login and session creation

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use rmi::{
    codec, Dispatched, InterfaceDescriptor, LocalRegistry, ObjectIdentity, RemoteService,
    RmiContext, RmiError,
};
use vaultpair_core::interfaces::{NotifyLevel, SuccessCallbackClient, AUTH_SERVICE};
use vaultpair_core::messages;
use vaultpair_core::time::MonotonicClock;
use vaultpair_core::LoginResult;

use crate::ledger::LedgerReader;
use crate::queue::CommandQueue;

use super::user::UserService;

pub struct AuthService {
    identity: ObjectIdentity,
    registry: LocalRegistry,
    reader: Arc<dyn LedgerReader>,
    queue: Arc<CommandQueue>,
    clock: Arc<MonotonicClock>,
    peer_id: u32,
}

impl AuthService {
    pub fn new(
        registry: LocalRegistry,
        reader: Arc<dyn LedgerReader>,
        queue: Arc<CommandQueue>,
        clock: Arc<MonotonicClock>,
        peer_id: u32,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity: ObjectIdentity::new(),
            registry,
            reader,
            queue,
            clock,
            peer_id,
        })
    }

    async fn login(
        &self,
        card_number: String,
        pin: String,
        callback: SuccessCallbackClient,
    ) -> Result<LoginResult, RmiError> {
        let user = match self.reader.login(&card_number, &pin).await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!(card = %card_number, error = %e, "login refused");
                if let Err(e) = callback.notify(messages::LOGIN_FAILED, NotifyLevel::Error).await {
                    tracing::warn!(error = %e, "login-failure callback undeliverable");
                }
                return Ok(LoginResult {
                    success: false,
                    message: messages::LOGIN_FAILED.to_string(),
                    session_id: None,
                });
            }
        };

        // Session ids are uuid4; loop until one binds in case of a collision.
        let session_id = loop {
            let candidate = Uuid::new_v4().to_string();
            let service = UserService::new(
                candidate.clone(),
                user.clone(),
                self.registry.clone(),
                self.reader.clone(),
                self.queue.clone(),
                self.clock.clone(),
                self.peer_id,
            );
            match self.registry.bind(&candidate, service) {
                Ok(()) => break candidate,
                Err(RmiError::NameTaken(_)) => continue,
                Err(e) => return Err(e),
            }
        };

        tracing::info!(user = %user.name, card = %card_number, session = %session_id, "login ok");
        if let Err(e) = callback
            .notify(messages::LOGIN_SUCCESS, NotifyLevel::Success)
            .await
        {
            tracing::warn!(error = %e, "login-success callback undeliverable");
        }

        Ok(LoginResult {
            success: true,
            message: messages::LOGIN_SUCCESS.to_string(),
            session_id: Some(session_id),
        })
    }
}

#[async_trait]
impl RemoteService for AuthService {
    fn descriptor(&self) -> &'static InterfaceDescriptor {
        &AUTH_SERVICE
    }

    fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    fn class_name(&self) -> &'static str {
        "AuthService"
    }

    async fn dispatch(
        &self,
        method: &str,
        args: Vec<Value>,
        ctx: &RmiContext,
    ) -> Result<Dispatched, RmiError> {
        match method {
            "login" => {
                codec::expect_arity(method, &args, 3)?;
                let card_number: String = codec::arg(method, &args, 0)?;
                let pin: String = codec::arg(method, &args, 1)?;
                let callback_ref = codec::arg_remote_ref(method, &args, 2)?;
                let callback = SuccessCallbackClient::from_ref(&callback_ref, &ctx.http);

                let result = self.login(card_number, pin, callback).await?;
                Dispatched::value(&result)
            }
            other => Err(RmiError::BadMethod(other.to_string())),
        }
    }
}
