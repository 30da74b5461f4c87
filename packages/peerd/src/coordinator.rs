//! Single-writer token coordinator
//!
//! Owns the token state and the pending-sync log. A single worker task
//! drains the command queue when this peer holds the token, pushes executed
//! batches to the peer, and hands the token over when the peer demands it.
//! Losing contact with the peer triggers unilateral seizure of the token.
//!
//! Locking discipline: the state mutex is only ever held to read or flip
//! fields, never across a network or database call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};

use vaultpair_core::interfaces::PeerClient;
use vaultpair_core::AtmCommand;

use crate::emitter::EventEmitter;
use crate::executor::CommandExecutor;
use crate::metrics;
use crate::queue::CommandQueue;

/// Settable/clearable signal the worker waits on while token acquisition is
/// in flight.
struct TokenEvent {
    tx: watch::Sender<bool>,
}

impl TokenEvent {
    fn new(initial: bool) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    fn set(&self) {
        let _ = self.tx.send(true);
    }

    fn clear(&self) {
        let _ = self.tx.send(false);
    }

    /// Wait until the signal is set, up to `timeout`. Returns true iff set.
    async fn wait_set(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let result = tokio::time::timeout(timeout, rx.wait_for(|set| *set)).await;
        matches!(result, Ok(Ok(_)))
    }
}

struct CoordState {
    has_token: bool,
    peer_demanding: bool,
    pending_sync_logs: Vec<AtmCommand>,
    /// Highest applied sequence number per origin peer; replicated commands
    /// at or below it are re-deliveries and are dropped.
    last_applied_seq: HashMap<u32, u64>,
}

/// Point-in-time view for the health endpoint and tests.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinatorStatus {
    pub has_token: bool,
    pub peer_demanding: bool,
    pub pending_sync_logs: usize,
}

pub struct CoordinatorSettings {
    pub peer_id: u32,
    pub peer_addr: String,
    pub poll_interval: Duration,
    pub token_request_timeout: Duration,
    pub holds_token_at_start: bool,
}

pub struct Coordinator {
    peer_id: u32,
    queue: Arc<CommandQueue>,
    executor: Arc<CommandExecutor>,
    emitter: EventEmitter,
    peer: PeerClient,
    poll_interval: Duration,
    token_request_timeout: Duration,
    state: Mutex<CoordState>,
    token_event: TokenEvent,
}

impl Coordinator {
    pub fn new(
        settings: CoordinatorSettings,
        queue: Arc<CommandQueue>,
        executor: Arc<CommandExecutor>,
    ) -> eyre::Result<Arc<Self>> {
        let peer = PeerClient::from_addr(&settings.peer_addr)?;
        let has_token = settings.holds_token_at_start;

        if has_token {
            tracing::info!(peer_id = settings.peer_id, "holding token at startup");
        } else {
            tracing::info!(peer_id = settings.peer_id, "waiting for token at startup");
        }
        metrics::TOKEN_HELD.set(if has_token { 1.0 } else { 0.0 });

        Ok(Arc::new(Self {
            peer_id: settings.peer_id,
            queue,
            executor,
            emitter: EventEmitter::start(),
            peer,
            poll_interval: settings.poll_interval,
            token_request_timeout: settings.token_request_timeout,
            state: Mutex::new(CoordState {
                has_token,
                peer_demanding: false,
                pending_sync_logs: Vec::new(),
                last_applied_seq: HashMap::new(),
            }),
            token_event: TokenEvent::new(has_token),
        }))
    }

    /// Worker loop. Runs until the shutdown channel fires.
    pub async fn run(self: Arc<Self>, mut shutdown: mpsc::Receiver<()>) -> eyre::Result<()> {
        tracing::info!(
            peer_id = self.peer_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "coordinator worker starting"
        );
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("shutdown signal received, stopping coordinator");
                    return Ok(());
                }
                _ = self.tick() => {}
            }
        }
    }

    /// One worker iteration: wake within T_poll even when idle so a pending
    /// peer demand is honored promptly.
    async fn tick(&self) {
        self.queue.wait_for_data(self.poll_interval).await;

        let queue_empty = self.queue.is_empty();
        let (has_token, peer_demanding) = {
            let state = self.state.lock().expect("coordinator lock");
            (state.has_token, state.peer_demanding)
        };

        // Yield-when-idle: nothing to do locally and the peer wants the token.
        if has_token && peer_demanding && queue_empty {
            self.sync_and_pass_token().await;
            return;
        }

        if queue_empty {
            return;
        }

        if !has_token && !self.request_token_logic().await {
            return;
        }

        let commands = self.queue.get_all();
        if !commands.is_empty() {
            let executed = self.executor.exec_direct(commands).await;
            let pending = {
                let mut state = self.state.lock().expect("coordinator lock");
                state.pending_sync_logs.extend(executed);
                state.pending_sync_logs.len()
            };
            metrics::PENDING_SYNC_LOGS.set(pending as f64);
        }

        let (peer_demanding, have_logs) = {
            let state = self.state.lock().expect("coordinator lock");
            (state.peer_demanding, !state.pending_sync_logs.is_empty())
        };
        if peer_demanding {
            self.sync_and_pass_token().await;
        } else if have_logs {
            self.sync_data_only().await;
        }
    }

    /// Ask the peer for the token and wait for it to arrive. A connection
    /// failure means the peer is dead: seize the token locally.
    async fn request_token_logic(&self) -> bool {
        match self.peer.request_token().await {
            Ok(_) => {
                self.token_event.wait_set(self.token_request_timeout).await
            }
            Err(e) if e.is_connection() => {
                tracing::warn!(error = %e, "peer unreachable on request_token, seizing token");
                {
                    let mut state = self.state.lock().expect("coordinator lock");
                    state.has_token = true;
                    state.peer_demanding = false;
                }
                self.token_event.set();
                metrics::TOKEN_SEIZURES.inc();
                metrics::TOKEN_HELD.set(1.0);
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "request_token failed");
                false
            }
        }
    }

    /// Push the pending log to the peer together with the token.
    async fn sync_and_pass_token(&self) {
        let (batch, sent) = self.sanitized_batch();
        tracing::debug!(logs = sent, "syncing and passing token");

        match self.peer.receive_sync(&batch, true).await {
            Ok(_) => {
                let pending = {
                    let mut state = self.state.lock().expect("coordinator lock");
                    state.has_token = false;
                    state.peer_demanding = false;
                    // Only the entries that were actually sent are acknowledged;
                    // commands executed meanwhile stay queued for the next sync.
                    state.pending_sync_logs = state.pending_sync_logs.split_off(sent);
                    state.pending_sync_logs.len()
                };
                self.token_event.clear();
                metrics::TOKEN_PASSES.inc();
                metrics::TOKEN_HELD.set(0.0);
                metrics::PENDING_SYNC_LOGS.set(pending as f64);
                metrics::SYNC_BATCHES.with_label_values(&["sent"]).inc();
                tracing::info!(synced = sent, "token passed to peer");
            }
            Err(e) => {
                if e.is_connection() {
                    tracing::warn!(error = %e, "peer unreachable on receive_sync, keeping token");
                } else {
                    tracing::error!(error = %e, "receive_sync failed, keeping token");
                }
                let mut state = self.state.lock().expect("coordinator lock");
                state.peer_demanding = false;
            }
        }
    }

    /// Background sync: push the pending log, keep the token.
    async fn sync_data_only(&self) {
        let (batch, sent) = self.sanitized_batch();
        if sent == 0 {
            return;
        }

        match self.peer.receive_sync(&batch, false).await {
            Ok(_) => {
                let pending = {
                    let mut state = self.state.lock().expect("coordinator lock");
                    state.pending_sync_logs = state.pending_sync_logs.split_off(sent);
                    state.pending_sync_logs.len()
                };
                metrics::PENDING_SYNC_LOGS.set(pending as f64);
                metrics::SYNC_BATCHES.with_label_values(&["sent"]).inc();
                tracing::debug!(synced = sent, "background sync acknowledged");
            }
            Err(e) => {
                tracing::warn!(error = %e, "background sync failed, retrying on a later tick");
            }
        }
    }

    /// Snapshot the pending log with client callbacks stripped. Remote
    /// references to client callbacks must not cross the peer boundary.
    fn sanitized_batch(&self) -> (Vec<AtmCommand>, usize) {
        let state = self.state.lock().expect("coordinator lock");
        let batch: Vec<AtmCommand> = state
            .pending_sync_logs
            .iter()
            .map(AtmCommand::sanitized)
            .collect();
        let len = batch.len();
        (batch, len)
    }

    // --- Inbound handlers, called by the peer service off the worker task ---

    /// `peer@request_token`: record the demand, return immediately.
    pub fn note_peer_demand(&self) {
        let mut state = self.state.lock().expect("coordinator lock");
        state.peer_demanding = true;
        tracing::debug!("peer requested token");
    }

    /// `peer@receive_sync`: queue the batch for asynchronous application and,
    /// if the token came along, accept it.
    pub fn handle_incoming_sync(&self, logs: Vec<AtmCommand>, pass_token: bool) {
        if !logs.is_empty() {
            metrics::SYNC_BATCHES.with_label_values(&["received"]).inc();
            let fresh = self.filter_fresh(logs);
            if !fresh.is_empty() {
                let executor = self.executor.clone();
                let count = fresh.len();
                tracing::debug!(commands = count, "applying replicated batch");
                self.emitter.emit("apply-replica-batch", async move {
                    let applied = executor.exec_direct(fresh).await;
                    tracing::debug!(applied = applied.len(), "replicated batch applied");
                    Ok(())
                });
            }
        }

        if pass_token {
            self.accept_token();
        }
    }

    /// Drop re-delivered commands: a batch retried after a lost ack carries
    /// sequence numbers at or below what this replica already applied.
    fn filter_fresh(&self, logs: Vec<AtmCommand>) -> Vec<AtmCommand> {
        let mut state = self.state.lock().expect("coordinator lock");
        let mut fresh = Vec::with_capacity(logs.len());
        for command in logs {
            let last = state.last_applied_seq.entry(command.peer_id).or_insert(0);
            if command.seq > *last {
                *last = command.seq;
                fresh.push(command);
            } else {
                metrics::REPLICA_DUPLICATES.inc();
                tracing::debug!(
                    origin = command.peer_id,
                    seq = command.seq,
                    "dropping already-applied replicated command"
                );
            }
        }
        fresh
    }

    /// Token handed to us by the peer.
    pub fn accept_token(&self) {
        {
            let mut state = self.state.lock().expect("coordinator lock");
            state.has_token = true;
            state.peer_demanding = false;
        }
        self.token_event.set();
        metrics::TOKEN_HELD.set(1.0);
        tracing::info!("token accepted from peer");
    }

    /// `peer@get_token_status`
    pub fn holds_token(&self) -> bool {
        self.state.lock().expect("coordinator lock").has_token
    }

    pub fn status(&self) -> CoordinatorStatus {
        let state = self.state.lock().expect("coordinator lock");
        CoordinatorStatus {
            has_token: state.has_token,
            peer_demanding: state.peer_demanding,
            pending_sync_logs: state.pending_sync_logs.len(),
        }
    }
}
