use dashmap::DashMap;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use tokio::{sync::oneshot, time::Instant};
use tracing::{debug, warn};

use crate::types::{ErrorCode, Message, UserCallbackPayload, METHOD_WEB_API_TRIGGER};

/// Single-use sink for a caller's terminal outcome.
pub type CallbackSink = oneshot::Sender<UserCallbackPayload>;

/// Identifies one registration, so a caller can resolve its own entry without touching
/// a later registration that reused the id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration(u64);

#[derive(Debug)]
struct PendingCallback {
    sink: CallbackSink,
    registered_at: Instant,
    registration: Registration,
}

/// Outstanding caller requests keyed by message id.
///
/// Every lookup removes the entry before writing to its sink, so each sink is written
/// at most once no matter how many node replies race for it.
#[derive(Debug, Default)]
pub struct CallbackTable {
    pending: DashMap<String, PendingCallback>,
    next_registration: AtomicU64,
}

impl CallbackTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `sink` under `id`. An earlier registration for the same id is replaced
    /// and its sink dropped, which closes it.
    pub fn register(&self, id: &str, sink: CallbackSink) -> Registration {
        let registration = Registration(self.next_registration.fetch_add(1, Ordering::Relaxed));
        let entry = PendingCallback { sink, registered_at: Instant::now(), registration };
        if self.pending.insert(id.to_string(), entry).is_some() {
            debug!(message_id = id, "replaced pending callback with duplicate message id");
        }
        registration
    }

    /// Like [`resolve_and_deliver`](Self::resolve_and_deliver), but only while `id` is
    /// still held by `registration`.
    pub fn resolve_registration(
        &self,
        id: &str,
        registration: Registration,
        payload: UserCallbackPayload,
    ) -> bool {
        let Some((_, callback)) =
            self.pending.remove_if(id, |_, cb| cb.registration == registration)
        else {
            debug!(message_id = id, "callback no longer held by this registration");
            return false;
        };
        callback.sink.send(payload).is_ok()
    }

    /// Removes the callback for `id` and writes `payload` to it.
    ///
    /// Returns `true` when a waiting caller received the payload. Unknown ids (including
    /// ids already resolved) are a no-op.
    pub fn resolve_and_deliver(&self, id: &str, payload: UserCallbackPayload) -> bool {
        let Some((_, callback)) = self.pending.remove(id) else {
            return false;
        };

        if callback.sink.send(payload).is_err() {
            debug!(message_id = id, "caller went away before its reply arrived");
            return false;
        }
        true
    }

    /// Delivers `RequestTimeout` to every callback registered more than `ttl` ago.
    pub fn expire_older_than(&self, ttl: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| now.saturating_duration_since(entry.registered_at) >= ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut count = 0;
        for id in expired {
            // A fresh registration under the same id may have replaced the old one.
            let Some((_, callback)) = self
                .pending
                .remove_if(&id, |_, cb| now.saturating_duration_since(cb.registered_at) >= ttl)
            else {
                continue;
            };
            count += 1;

            match Message::new(id.as_str(), METHOD_WEB_API_TRIGGER, "", &serde_json::Value::Null) {
                Ok(msg) => {
                    let _ = callback.sink.send(UserCallbackPayload::error(
                        msg,
                        ErrorCode::RequestTimeout,
                        "no node replied before the request expired",
                    ));
                }
                Err(e) => warn!(message_id = %id, error = %e, "failed to build timeout reply"),
            }
        }

        if count > 0 {
            debug!(expired = count, "expired pending callbacks");
        }
        count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }
}
