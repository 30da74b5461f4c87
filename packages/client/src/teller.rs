//! Failover connection and session handling

use std::sync::Arc;

use eyre::{eyre, Result};

use rmi::{LocalRegistry, RemoteRegistry, RemoteService, RmiContext, RmiError};
use vaultpair_core::interfaces::{AuthClient, UserClient};
use vaultpair_core::net::parse_host_port;
use vaultpair_core::{LoginResult, TransactionData, UserData};

use crate::config::ClientConfig;

/// A running client endpoint: the local callback registry plus the static
/// peer table. Cheap to clone.
#[derive(Clone)]
pub struct Teller {
    config: ClientConfig,
    registry: LocalRegistry,
}

impl Teller {
    /// Start the client's own registry (required for callbacks) on an
    /// ephemeral port and return a connect-ready handle.
    pub async fn start(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let registry = LocalRegistry::new(config.callback_host.clone(), 0);
        registry.listen(true).await?;
        Ok(Self { config, registry })
    }

    /// The callback registry, for explicit unbinds after a session ends.
    pub fn registry(&self) -> &LocalRegistry {
        &self.registry
    }

    fn remote(&self, addr: &str) -> Result<RemoteRegistry> {
        let (host, port) = parse_host_port(addr)?;
        Ok(RemoteRegistry::new(host, port)
            .with_context(RmiContext::new(self.registry.clone())))
    }

    /// Log in against the primary peer, failing over to the other peer on a
    /// connection-level failure. A login *refusal* is not a failover case.
    pub async fn login(
        &self,
        card_number: &str,
        pin: &str,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<Session> {
        let mut last_connection_error: Option<RmiError> = None;

        for (peer_id, addr) in self.config.ordered_peers() {
            let remote = self.remote(&addr)?;
            let auth = AuthClient::lookup(&remote);

            match auth.login(card_number, pin, callback).await {
                Ok(LoginResult {
                    success: true,
                    session_id: Some(session_id),
                    ..
                }) => {
                    tracing::info!(peer = peer_id, session = %session_id, "logged in");
                    let user = UserClient::lookup(&remote, &session_id);
                    return Ok(Session {
                        peer_id,
                        session_id,
                        user,
                    });
                }
                Ok(result) => {
                    return Err(eyre!("login refused: {}", result.message));
                }
                Err(e) if e.is_connection() => {
                    tracing::warn!(peer = peer_id, error = %e, "peer unreachable, failing over");
                    last_connection_error = Some(e);
                }
                Err(e) => return Err(e.into()),
            }
        }

        match last_connection_error {
            Some(e) => Err(eyre!("no peer reachable, last error: {e}")),
            None => Err(eyre!("no peers configured")),
        }
    }
}

/// One authenticated session on one peer.
#[derive(Debug)]
pub struct Session {
    pub peer_id: u32,
    pub session_id: String,
    user: UserClient,
}

impl Session {
    pub async fn get_balance(&self) -> Result<i64, RmiError> {
        self.user.get_balance().await
    }

    pub async fn get_info(&self) -> Result<UserData, RmiError> {
        self.user.get_info().await
    }

    pub async fn get_transaction_history(&self) -> Result<Vec<TransactionData>, RmiError> {
        self.user.get_transaction_history().await
    }

    pub async fn deposit(
        &self,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        self.user.deposit(amount, callback).await
    }

    pub async fn withdraw(
        &self,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        self.user.withdraw(amount, callback).await
    }

    pub async fn transfer(
        &self,
        to_card: &str,
        amount: i64,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        self.user.transfer(to_card, amount, callback).await
    }

    pub async fn change_pin(
        &self,
        new_pin: &str,
        callback: &Arc<dyn RemoteService>,
    ) -> Result<(), RmiError> {
        self.user.change_pin(new_pin, callback).await
    }

    /// End the session: the peer unbinds the session service and confirms
    /// through the callback.
    pub async fn logout(&self, callback: &Arc<dyn RemoteService>) -> Result<(), RmiError> {
        self.user.logout(callback).await
    }
}
