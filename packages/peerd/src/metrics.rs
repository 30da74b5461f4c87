//! Prometheus metrics for the peer daemon
//!
//! Exposed on the health server's /metrics endpoint.

#![allow(dead_code)]

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Gauge,
};

lazy_static! {
    // Health
    pub static ref UP: Gauge = register_gauge!(
        "peerd_up",
        "Whether the peer daemon is up and running"
    ).unwrap();

    // Token coordination
    pub static ref TOKEN_HELD: Gauge = register_gauge!(
        "peerd_token_held",
        "Whether this peer currently holds the write token"
    ).unwrap();

    pub static ref TOKEN_PASSES: Counter = register_counter!(
        "peerd_token_passes_total",
        "Total number of times the token was passed to the peer"
    ).unwrap();

    pub static ref TOKEN_SEIZURES: Counter = register_counter!(
        "peerd_token_seizures_total",
        "Total number of times the token was seized after a peer failure"
    ).unwrap();

    // Command pipeline
    pub static ref QUEUE_DEPTH: Gauge = register_gauge!(
        "peerd_queue_depth",
        "Number of commands waiting in the local queue"
    ).unwrap();

    pub static ref PENDING_SYNC_LOGS: Gauge = register_gauge!(
        "peerd_pending_sync_logs",
        "Executed commands not yet acknowledged by the peer"
    ).unwrap();

    pub static ref COMMANDS_EXECUTED: CounterVec = register_counter_vec!(
        "peerd_commands_executed_total",
        "Total commands applied to the local ledger",
        &["type", "origin"]
    ).unwrap();

    pub static ref COMMANDS_FAILED: CounterVec = register_counter_vec!(
        "peerd_commands_failed_total",
        "Total commands refused by the ledger writer",
        &["type", "kind"]
    ).unwrap();

    pub static ref CALLBACK_FAILURES: Counter = register_counter!(
        "peerd_callback_failures_total",
        "Client callbacks that could not be delivered"
    ).unwrap();

    // Replication
    pub static ref SYNC_BATCHES: CounterVec = register_counter_vec!(
        "peerd_sync_batches_total",
        "Replication batches by direction",
        &["direction"]
    ).unwrap();

    pub static ref REPLICA_DUPLICATES: Counter = register_counter!(
        "peerd_replica_duplicates_total",
        "Replicated commands dropped because their sequence number was stale"
    ).unwrap();
}

/// Origin label for command metrics.
pub fn origin_label(command_peer: u32, local_peer: u32) -> &'static str {
    if command_peer == local_peer {
        "local"
    } else {
        "replica"
    }
}
