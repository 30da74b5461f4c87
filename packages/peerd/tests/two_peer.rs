//! Two-peer end-to-end tests
//!
//! Each test boots real peers (registry + coordinator + services) on
//! loopback ports over in-memory ledgers, connects with the client SDK, and
//! drives the token/replication machinery end to end.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde_json::json;
use tokio::sync::mpsc;

use rmi::{InterfaceDescriptor, LocalRegistry, MethodSig, RemoteRegistry};
use vaultpair_core::interfaces::{AUTH_SERVICE_NAME, PEER_SERVICE_NAME};
use vaultpair_core::messages;
use vaultpair_core::time::MonotonicClock;

use peerd::coordinator::{Coordinator, CoordinatorSettings};
use peerd::executor::CommandExecutor;
use peerd::ledger::{LedgerWriter, MemoryLedger};
use peerd::queue::CommandQueue;
use peerd::services::{AuthService, PeerService};

use vaultpair_client::{ClientConfig, NotifyCallback, Teller};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const TOKEN_TIMEOUT: Duration = Duration::from_millis(2000);

struct PeerHandle {
    coordinator: Arc<Coordinator>,
    ledger: Arc<MemoryLedger>,
    _shutdown: mpsc::Sender<()>,
}

/// Reserve a loopback port that nothing is listening on.
fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

/// Seed one peer's independent database copy. Both peers get identical data.
async fn seed(ledger: &MemoryLedger) {
    let user_id = ledger
        .register_user(
            "Nguyễn Văn A",
            NaiveDate::from_ymd_opt(2000, 5, 20).unwrap(),
            "0900000001",
            "012345678901",
        )
        .await
        .unwrap();
    ledger
        .register_card("111111", "1234", 1000, user_id)
        .await
        .unwrap();
    ledger
        .register_card("222222", "5678", 500, user_id)
        .await
        .unwrap();
    ledger
        .register_card("333333", "9999", 100, user_id)
        .await
        .unwrap();
}

async fn start_peer(
    peer_id: u32,
    self_port: u16,
    peer_port: u16,
    holds_token: bool,
) -> PeerHandle {
    let ledger = Arc::new(MemoryLedger::new());
    seed(&ledger).await;

    let registry = LocalRegistry::new("127.0.0.1", self_port);
    let queue = Arc::new(CommandQueue::new());
    let clock = Arc::new(MonotonicClock::new());
    let executor = Arc::new(CommandExecutor::new(
        ledger.clone(),
        peer_id,
        registry.http_client(),
    ));

    let coordinator = Coordinator::new(
        CoordinatorSettings {
            peer_id,
            peer_addr: format!("127.0.0.1:{peer_port}"),
            poll_interval: POLL_INTERVAL,
            token_request_timeout: TOKEN_TIMEOUT,
            holds_token_at_start: holds_token,
        },
        queue.clone(),
        executor,
    )
    .unwrap();

    let auth = AuthService::new(
        registry.clone(),
        ledger.clone(),
        queue.clone(),
        clock,
        peer_id,
    );
    registry.bind(AUTH_SERVICE_NAME, auth).unwrap();
    registry
        .bind(PEER_SERVICE_NAME, PeerService::new(coordinator.clone()))
        .unwrap();

    registry.listen(true).await.unwrap();

    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(coordinator.clone().run(shutdown_rx));

    PeerHandle {
        coordinator,
        ledger,
        _shutdown: shutdown_tx,
    }
}

async fn teller_for(port1: u16, port2: u16, primary: u32) -> Teller {
    let config = ClientConfig::new(
        format!("127.0.0.1:{port1}"),
        format!("127.0.0.1:{port2}"),
    )
    .with_primary(primary);
    Teller::start(config).await.unwrap()
}

/// Receive the next callback delivery, failing the test after 3 seconds.
async fn expect_notify(
    rx: &mut mpsc::UnboundedReceiver<(String, String)>,
    message: &str,
    level: &str,
) {
    let (got_message, got_level) = tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("callback within 3s")
        .expect("callback channel open");
    assert_eq!(got_message, message);
    assert_eq!(got_level, level);
}

async fn wait_until<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    loop {
        if check().await {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::test]
async fn test_happy_path_deposit_single_peer() {
    let (port1, port2) = (free_port(), free_port());
    let peer1 = start_peer(1, port1, port2, true).await;
    // Peer 2 stays down for the whole scenario.

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    assert_eq!(session.peer_id, 1);
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    assert_eq!(session.get_balance().await.unwrap(), 1000);

    session.deposit(500, &callback).await.unwrap();
    expect_notify(&mut rx, messages::TXN_SUCCESS, "success").await;

    assert_eq!(session.get_balance().await.unwrap(), 1500);
    assert_eq!(peer1.ledger.balance_of("111111").await, Some(1500));
}

#[tokio::test]
async fn test_token_demand_and_pass() {
    let (port1, port2) = (free_port(), free_port());
    let peer1 = start_peer(1, port1, port2, true).await;
    let peer2 = start_peer(2, port2, port1, false).await;

    assert!(peer1.coordinator.holds_token());
    assert!(!peer2.coordinator.holds_token());

    // Client of peer 2 deposits; peer 2 must demand and receive the token.
    let teller = teller_for(port1, port2, 2).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    assert_eq!(session.peer_id, 2);
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    session.deposit(200, &callback).await.unwrap();
    expect_notify(&mut rx, messages::TXN_SUCCESS, "success").await;

    // The deposit was applied by peer 2, which now holds the token.
    assert_eq!(peer2.ledger.balance_of("111111").await, Some(1200));
    assert!(peer2.coordinator.holds_token());
    assert!(!peer1.coordinator.holds_token());

    // Peer 1 receives the same command through a later sync.
    wait_until("deposit replicated to peer 1", || async {
        peer1.ledger.balance_of("111111").await == Some(1200)
    })
    .await;
}

#[tokio::test]
async fn test_replication_after_write() {
    let (port1, port2) = (free_port(), free_port());
    let peer1 = start_peer(1, port1, port2, true).await;
    let peer2 = start_peer(2, port2, port1, false).await;

    // Client of peer 1 transfers while peer 1 already holds the token.
    let teller1 = teller_for(port1, port2, 1).await;
    let (callback1, mut rx1) = NotifyCallback::channel();
    let callback1: Arc<dyn rmi::RemoteService> = callback1;

    let session1 = teller1.login("111111", "1234", &callback1).await.unwrap();
    expect_notify(&mut rx1, messages::LOGIN_SUCCESS, "success").await;

    session1.transfer("222222", 300, &callback1).await.unwrap();
    expect_notify(&mut rx1, messages::TXN_SUCCESS, "success").await;

    // Peer 2 never asked for the token, so peer 1 keeps it.
    assert!(peer1.coordinator.holds_token());
    assert_eq!(peer1.ledger.balance_of("111111").await, Some(700));

    // The background sync delivers the transfer to peer 2 without the token.
    wait_until("transfer replicated to peer 2", || async {
        peer2.ledger.balance_of("222222").await == Some(800)
    })
    .await;
    assert!(peer1.coordinator.holds_token());

    // Client of peer 2 deposits into the destination card; the transfer must
    // land on peer 2 before the deposit does.
    let teller2 = teller_for(port1, port2, 2).await;
    let (callback2, mut rx2) = NotifyCallback::channel();
    let callback2: Arc<dyn rmi::RemoteService> = callback2;

    let session2 = teller2.login("222222", "5678", &callback2).await.unwrap();
    expect_notify(&mut rx2, messages::LOGIN_SUCCESS, "success").await;

    session2.deposit(10, &callback2).await.unwrap();
    expect_notify(&mut rx2, messages::TXN_SUCCESS, "success").await;

    wait_until("both writes applied on both peers", || async {
        peer2.ledger.balance_of("222222").await == Some(810)
            && peer1.ledger.balance_of("222222").await == Some(810)
            && peer1.ledger.balance_of("111111").await == Some(700)
            && peer2.ledger.balance_of("111111").await == Some(700)
    })
    .await;

    // Origin order: the replica saw the transfer before the deposit.
    let history = session2.get_transaction_history().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(
        history[0].transaction_type,
        vaultpair_core::TransactionType::TransferIn
    );
    assert_eq!(
        history[1].transaction_type,
        vaultpair_core::TransactionType::Deposit
    );
}

#[tokio::test]
async fn test_failover_on_peer_death() {
    let (port1, port2) = (free_port(), free_port());
    // Peer 2 is the initial token holder but is never started (dead).
    let peer1 = start_peer(1, port1, port2, false).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    // The withdraw forces a token request, which fails at the transport
    // level; peer 1 seizes the token and executes anyway.
    session.withdraw(50, &callback).await.unwrap();
    expect_notify(&mut rx, messages::TXN_SUCCESS, "success").await;

    assert!(peer1.coordinator.holds_token());
    assert_eq!(peer1.ledger.balance_of("111111").await, Some(950));

    // The executed command stays in the pending log; sync retries keep
    // failing without blocking further client calls.
    assert_eq!(peer1.coordinator.status().pending_sync_logs, 1);
    assert_eq!(session.get_balance().await.unwrap(), 950);
}

#[tokio::test]
async fn test_insufficient_funds_not_replicated() {
    let (port1, port2) = (free_port(), free_port());
    let peer1 = start_peer(1, port1, port2, true).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("333333", "9999", &callback).await.unwrap();
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    session.withdraw(500, &callback).await.unwrap();
    expect_notify(&mut rx, messages::INSUFFICIENT_FUNDS, "error").await;

    assert_eq!(session.get_balance().await.unwrap(), 100);
    // Refused commands never reach the pending-sync log.
    assert_eq!(peer1.coordinator.status().pending_sync_logs, 0);
}

#[tokio::test]
async fn test_interface_mismatch_rejected_before_execution() {
    // A drifted client build: withdraw grew an extra argument.
    static USER_SERVICE_DRIFTED: InterfaceDescriptor = InterfaceDescriptor::new(
        "UserService",
        &[MethodSig {
            name: "withdraw",
            params: &["amount: int", "currency: string", "callback: SuccessCallback"],
            returns: "null",
        }],
    );

    let (port1, port2) = (free_port(), free_port());
    let peer1 = start_peer(1, port1, port2, true).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    let remote = RemoteRegistry::new("127.0.0.1", port1);
    let drifted = remote.lookup(&session.session_id, &USER_SERVICE_DRIFTED);
    let err = drifted
        .invoke("withdraw", vec![json!(50), json!("VND"), json!(null)])
        .await
        .unwrap_err();
    assert!(err.is_fault_kind(rmi::error::FAULT_INTERFACE_MISMATCH));

    // Rejected before any executor work: no balance change, nothing queued.
    tokio::time::sleep(POLL_INTERVAL * 2).await;
    assert_eq!(peer1.ledger.balance_of("111111").await, Some(1000));
    assert_eq!(peer1.coordinator.status().pending_sync_logs, 0);
}

#[tokio::test]
async fn test_logout_unbinds_session() {
    let (port1, port2) = (free_port(), free_port());
    let _peer1 = start_peer(1, port1, port2, true).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    session.logout(&callback).await.unwrap();
    expect_notify(&mut rx, messages::LOGGED_OUT, "success").await;

    // The session service is gone; further calls fault.
    let err = session.get_balance().await.unwrap_err();
    assert!(err.is_fault_kind(rmi::error::FAULT_NO_SUCH_SERVICE));
}

#[tokio::test]
async fn test_failed_login_returns_refusal() {
    let (port1, port2) = (free_port(), free_port());
    let _peer1 = start_peer(1, port1, port2, true).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let err = teller.login("111111", "0000", &callback).await.unwrap_err();
    assert!(err.to_string().contains(messages::LOGIN_FAILED));
    expect_notify(&mut rx, messages::LOGIN_FAILED, "error").await;
}

#[tokio::test]
async fn test_client_fails_over_to_second_peer() {
    let (port1, port2) = (free_port(), free_port());
    // Primary peer 1 is down; peer 2 runs with the token.
    let _peer2 = start_peer(2, port2, port1, true).await;

    let teller = teller_for(port1, port2, 1).await;
    let (callback, mut rx) = NotifyCallback::channel();
    let callback: Arc<dyn rmi::RemoteService> = callback;

    let session = teller.login("111111", "1234", &callback).await.unwrap();
    assert_eq!(session.peer_id, 2);
    expect_notify(&mut rx, messages::LOGIN_SUCCESS, "success").await;

    session.deposit(25, &callback).await.unwrap();
    expect_notify(&mut rx, messages::TXN_SUCCESS, "success").await;
    assert_eq!(session.get_balance().await.unwrap(), 1025);
}
