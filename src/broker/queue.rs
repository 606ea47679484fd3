use std::collections::VecDeque;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

use crate::broker::message::Message;
use crate::transport::frame::ServerFrame;

/// How messages on one address are spread across consumers.
///
/// `Anycast` is the queue default: each message goes to exactly one consumer,
/// chosen round-robin among those with credit. `Multicast` is the topic
/// variant: every consumer with credit gets its own copy and nothing is
/// buffered while consumers exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distribution {
    Anycast,
    Multicast,
}

/// A consumer link attached to a queue.
///
/// The queue does not own the connection; it holds the connection's outbound
/// frame channel and the credit the remote peer has granted on this link.
#[derive(Debug)]
pub struct Consumer {
    id: String,
    link: String,
    sender: UnboundedSender<ServerFrame>,
    credit: u32,
    next_delivery: u64,
}

impl Consumer {
    pub fn new(id: impl Into<String>, link: impl Into<String>, sender: UnboundedSender<ServerFrame>) -> Self {
        Self {
            id: id.into(),
            link: link.into(),
            sender,
            credit: 0,
            next_delivery: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// An ordered, in-memory mailbox of messages for one address.
///
/// Messages wait in FIFO order until a consumer with credit is available;
/// a message is removed from the queue the instant it is handed to a
/// consumer, so it is never dispatched twice.
#[derive(Debug)]
pub struct Queue {
    name: String,
    ephemeral: bool,
    distribution: Distribution,
    messages: VecDeque<Message>,
    consumers: Vec<Consumer>,
    cursor: usize,
}

impl Queue {
    pub fn new(name: &str, ephemeral: bool, distribution: Distribution) -> Self {
        info!("creating queue '{name}'");

        Self {
            name: name.to_string(),
            ephemeral,
            distribution,
            messages: VecDeque::new(),
            consumers: Vec::new(),
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Number of messages waiting for a consumer with credit.
    pub fn pending(&self) -> usize {
        self.messages.len()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Adds a consumer and dispatches anything it already has credit for.
    pub fn attach(&mut self, consumer: Consumer) {
        info!("adding consumer '{}' to queue '{}'", consumer.id, self.name);

        self.consumers.push(consumer);
        self.dispatch();
    }

    /// Removes a consumer. Returns true when the queue should be destroyed:
    /// the last consumer just left an ephemeral queue.
    pub fn detach(&mut self, consumer_id: &str) -> bool {
        info!("removing consumer '{consumer_id}' from queue '{}'", self.name);

        self.consumers.retain(|c| c.id != consumer_id);
        self.cursor = 0;
        self.ephemeral && self.consumers.is_empty()
    }

    /// Replenishes a consumer's credit and dispatches what it can now take.
    pub fn grant_credit(&mut self, consumer_id: &str, credit: u32) {
        if let Some(consumer) = self.consumers.iter_mut().find(|c| c.id == consumer_id) {
            consumer.credit = consumer.credit.saturating_add(credit);
        }
        self.dispatch();
    }

    /// Appends a message and dispatches immediately if a consumer with
    /// credit exists. FIFO order is preserved per queue across producers.
    pub fn enqueue(&mut self, message: Message) {
        if self.distribution == Distribution::Multicast {
            self.fan_out(message);
            return;
        }

        self.messages.push_back(message);
        self.dispatch();
    }

    /// Multicast path: a copy to every consumer with credit, nothing kept.
    /// With no consumers attached the message is dropped, like any pub/sub
    /// topic.
    fn fan_out(&mut self, message: Message) {
        for consumer in self.consumers.iter_mut() {
            if consumer.credit == 0 {
                continue;
            }
            consumer.credit -= 1;
            let frame = ServerFrame::Deliver {
                link: consumer.link.clone(),
                delivery: consumer.next_delivery,
                message: message.clone(),
            };
            consumer.next_delivery += 1;
            if consumer.sender.send(frame).is_err() {
                debug!("consumer '{}' is gone, copy dropped", consumer.id);
            }
        }
    }

    /// Hands queued messages to consumers while both are available. Each
    /// message goes to exactly one consumer; credit is decremented before
    /// the frame is pushed onto the connection's outbound channel, which
    /// never blocks.
    fn dispatch(&mut self) {
        loop {
            if self.messages.is_empty() {
                break;
            }
            let Some(idx) = self.pick_consumer() else {
                break;
            };
            let Some(message) = self.messages.pop_front() else {
                break;
            };

            let consumer = &mut self.consumers[idx];
            consumer.credit -= 1;
            let frame = ServerFrame::Deliver {
                link: consumer.link.clone(),
                delivery: consumer.next_delivery,
                message,
            };
            consumer.next_delivery += 1;

            if let Err(err) = consumer.sender.send(frame) {
                // The connection is gone: put the message back at the head
                // and drop the dead consumer.
                if let ServerFrame::Deliver { message, .. } = err.0 {
                    self.messages.push_front(message);
                }
                let id = self.consumers.remove(idx).id;
                debug!("dropping dead consumer '{id}' from queue '{}'", self.name);
                self.cursor = 0;
            }
        }
    }

    /// Round-robin choice among consumers with credit.
    fn pick_consumer(&mut self) -> Option<usize> {
        let n = self.consumers.len();
        for step in 0..n {
            let idx = (self.cursor + step) % n;
            if self.consumers[idx].credit > 0 {
                self.cursor = (idx + 1) % n;
                return Some(idx);
            }
        }
        None
    }
}
