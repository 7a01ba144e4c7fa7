//! In-memory DON transport that records every message sent to a node.

use async_trait::async_trait;
use gateway_core::{
    don::{Don, DonError},
    types::Message,
};
use parking_lot::Mutex;
use std::{collections::HashSet, time::Duration};
use tokio::sync::Notify;

/// Records sends per node. Nodes marked unreachable fail with `NodeNotConnected`.
#[derive(Debug, Default)]
pub struct MockDon {
    sent: Mutex<Vec<(String, Message)>>,
    unreachable: Mutex<HashSet<String>>,
    send_delay: Mutex<Duration>,
    notify: Notify,
}

impl MockDon {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, node: &str) {
        self.unreachable.lock().insert(node.to_string());
    }

    /// Every subsequent send sleeps for `delay` before recording.
    pub fn set_send_delay(&self, delay: Duration) {
        *self.send_delay.lock() = delay;
    }

    #[must_use]
    pub fn sent(&self) -> Vec<(String, Message)> {
        self.sent.lock().clone()
    }

    #[must_use]
    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    #[must_use]
    pub fn sent_to(&self, node: &str) -> Vec<Message> {
        self.sent.lock().iter().filter(|(addr, _)| addr == node).map(|(_, m)| m.clone()).collect()
    }

    /// Waits until at least `count` messages have been recorded.
    pub async fn wait_for_sends(&self, count: usize) {
        loop {
            let notified = self.notify.notified();
            if self.sent_count() >= count {
                return;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl Don for MockDon {
    async fn send_to_node(&self, node_addr: &str, msg: &Message) -> Result<(), DonError> {
        let delay = *self.send_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.unreachable.lock().contains(node_addr) {
            return Err(DonError::NodeNotConnected(node_addr.to_string()));
        }

        self.sent.lock().push((node_addr.to_string(), msg.clone()));
        self.notify.notify_waiters();
        Ok(())
    }
}
