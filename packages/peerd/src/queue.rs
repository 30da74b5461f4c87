//! Thread-safe, event-signalling FIFO of pending write commands
//!
//! One producer set (RPC handlers) and one expected waiter (the coordinator
//! worker). Enqueue stamps each command with this peer's next sequence
//! number, so a command's position in the queue and its `seq` always agree.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::Notify;

use vaultpair_core::AtmCommand;

use crate::metrics;

#[derive(Default)]
struct Inner {
    items: VecDeque<AtmCommand>,
    next_seq: u64,
}

/// FIFO command queue with a wakeup signal for the coordinator worker.
#[derive(Default)]
pub struct CommandQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a command, stamp its sequence number, and wake the waiter.
    pub fn add(&self, mut command: AtmCommand) {
        let depth = {
            let mut inner = self.inner.lock().expect("queue lock");
            inner.next_seq += 1;
            command.seq = inner.next_seq;
            inner.items.push_back(command);
            inner.items.len()
        };
        metrics::QUEUE_DEPTH.set(depth as f64);
        self.notify.notify_one();
    }

    /// Atomically drain every queued command, in FIFO order.
    pub fn get_all(&self) -> Vec<AtmCommand> {
        let drained: Vec<AtmCommand> = {
            let mut inner = self.inner.lock().expect("queue lock");
            inner.items.drain(..).collect()
        };
        metrics::QUEUE_DEPTH.set(0.0);
        drained
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock").items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until the queue is non-empty or the timeout elapses. Returns
    /// true iff the queue is non-empty at wakeup.
    pub async fn wait_for_data(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.is_empty() {
                return true;
            }
            let notified = self.notify.notified();
            if !self.is_empty() {
                return true;
            }
            match tokio::time::timeout_at(deadline, notified).await {
                Ok(()) => continue,
                Err(_) => return !self.is_empty(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vaultpair_core::command::CommandKind;

    fn deposit(card: &str, amount: i64) -> AtmCommand {
        AtmCommand {
            peer_id: 1,
            card_number: card.to_string(),
            timestamp: 1,
            seq: 0,
            success_callback: None,
            kind: CommandKind::Deposit { amount },
        }
    }

    #[test]
    fn test_fifo_order_and_sequence_stamps() {
        let queue = CommandQueue::new();
        queue.add(deposit("111111", 100));
        queue.add(deposit("111111", 200));
        queue.add(deposit("222222", 300));

        assert_eq!(queue.len(), 3);
        let drained = queue.get_all();
        assert!(queue.is_empty());

        let amounts: Vec<i64> = drained
            .iter()
            .map(|c| match c.kind {
                CommandKind::Deposit { amount } => amount,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(amounts, vec![100, 200, 300]);
        assert_eq!(
            drained.iter().map(|c| c.seq).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_sequence_survives_drain() {
        let queue = CommandQueue::new();
        queue.add(deposit("111111", 1));
        queue.get_all();
        queue.add(deposit("111111", 2));
        let drained = queue.get_all();
        assert_eq!(drained[0].seq, 2);
    }

    #[tokio::test]
    async fn test_wait_times_out_when_empty() {
        let queue = CommandQueue::new();
        assert!(!queue.wait_for_data(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_nonempty() {
        let queue = CommandQueue::new();
        queue.add(deposit("111111", 1));
        assert!(queue.wait_for_data(Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn test_add_wakes_waiter() {
        let queue = Arc::new(CommandQueue::new());
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.wait_for_data(Duration::from_secs(5)).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.add(deposit("111111", 1));
        assert!(waiter.await.unwrap());
    }
}
