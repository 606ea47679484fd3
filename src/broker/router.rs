//! Address router
//!
//! The router owns the queue table and the request/response correlation
//! state shared by all connections. Locking is deliberately fine-grained:
//! the table mutex is held only to look up or create a queue, each queue has
//! its own mutex, and no lock is ever held across an await point. Work on
//! one queue therefore never blocks work on another.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::broker::message::Message;
use crate::broker::queue::{Distribution, Queue};

pub type SharedQueue = Arc<Mutex<Queue>>;

/// An in-flight request waiting for its response: where the reply should go
/// and when we first saw the request.
#[derive(Debug, Clone)]
struct PendingRequest {
    reply_to: String,
    created_at: Instant,
}

/// Maps address names to queues, creating them on first reference, and
/// redirects responses to the reply queue recorded for their correlation id.
#[derive(Debug)]
pub struct Router {
    queues: Mutex<HashMap<String, SharedQueue>>,
    pending: Mutex<HashMap<String, PendingRequest>>,
    request_ttl: Duration,
    multicast_prefix: String,
}

impl Router {
    pub fn new(request_ttl: Duration, multicast_prefix: impl Into<String>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            request_ttl,
            multicast_prefix: multicast_prefix.into(),
        }
    }

    /// Returns the queue for an address, creating it on first reference.
    /// The table lock makes get-or-create atomic: a race between two
    /// connections can never produce two queues for one name.
    pub fn resolve(&self, address: &str) -> SharedQueue {
        let mut queues = self.queues.lock().unwrap();
        queues
            .entry(address.to_string())
            .or_insert_with(|| {
                let distribution = if !self.multicast_prefix.is_empty()
                    && address.starts_with(&self.multicast_prefix)
                {
                    Distribution::Multicast
                } else {
                    Distribution::Anycast
                };
                Arc::new(Mutex::new(Queue::new(address, false, distribution)))
            })
            .clone()
    }

    /// Creates a fresh ephemeral queue under a generated address. Used for
    /// dynamic reply queues; the queue is destroyed when its last consumer
    /// detaches.
    pub fn resolve_dynamic(&self) -> (String, SharedQueue) {
        let mut queues = self.queues.lock().unwrap();
        loop {
            let address = Uuid::new_v4().to_string();
            if queues.contains_key(&address) {
                continue;
            }
            let queue = Arc::new(Mutex::new(Queue::new(&address, true, Distribution::Anycast)));
            queues.insert(address.clone(), queue.clone());
            return (address, queue);
        }
    }

    pub fn has_queue(&self, address: &str) -> bool {
        self.queues.lock().unwrap().contains_key(address)
    }

    /// Routes one message.
    ///
    /// A correlation id matching a pending request redirects the message to
    /// the recorded reply-to queue and consumes the entry. Otherwise a
    /// message carrying both a correlation id and a reply-to address is
    /// itself a request: the reply route is recorded before the message goes
    /// to its target queue.
    pub fn route(&self, message: Message, target: &str) {
        if let Some(correlation_id) = message.correlation_id.clone() {
            let entry = self.pending.lock().unwrap().remove(&correlation_id);
            if let Some(pending) = entry {
                debug!(
                    "redirecting response for correlation id '{correlation_id}' to '{}'",
                    pending.reply_to
                );
                self.resolve(&pending.reply_to).lock().unwrap().enqueue(message);
                return;
            }

            if let Some(reply_to) = message.reply_to.clone() {
                self.pending.lock().unwrap().insert(
                    correlation_id,
                    PendingRequest {
                        reply_to,
                        created_at: Instant::now(),
                    },
                );
            }
        }

        self.resolve(target).lock().unwrap().enqueue(message);
    }

    /// Detaches a consumer from a queue and destroys the queue when the
    /// detach reported it empty and ephemeral.
    pub fn detach(&self, address: &str, consumer_id: &str) {
        let mut queues = self.queues.lock().unwrap();
        if let Some(queue) = queues.get(address).cloned() {
            if queue.lock().unwrap().detach(consumer_id) {
                info!("destroying ephemeral queue '{address}'");
                queues.remove(address);
            }
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Drops pending requests older than the configured TTL. Expiry is not
    /// surfaced to any client; the original requester applies its own
    /// timeout.
    pub fn expire_pending(&self) -> usize {
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        let ttl = self.request_ttl;
        pending.retain(|correlation_id, request| {
            let keep = request.created_at.elapsed() < ttl;
            if !keep {
                warn!("expiring unanswered request with correlation id '{correlation_id}'");
            }
            keep
        });
        before - pending.len()
    }

    /// Background sweep bounding memory growth from abandoned requests.
    /// One periodic task for the whole table, not a timer per request.
    pub async fn run_expiry_loop(router: Arc<Router>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let dropped = router.expire_pending();
            if dropped > 0 {
                debug!("dropped {dropped} expired pending requests");
            }
        }
    }
}
