//! Per-connection handler
//!
//! One task per client connection. The read loop decodes frames and
//! dispatches synchronously to the router and queues; the only suspension
//! points are the transport read and the shutdown signal. A separate task
//! drains the connection's outbound channel into the socket, so queue
//! dispatch never waits on a slow client.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::accept_async;
use tracing::{debug, info, warn};
use tungstenite::protocol::Message as WsMessage;
use uuid::Uuid;

use crate::broker::message::Message;
use crate::broker::queue::Consumer;
use crate::broker::router::Router;
use crate::transport::frame::{ClientFrame, LinkRole, ServerFrame};
use crate::utils::error::{Error, Result};

#[derive(Debug, Clone)]
struct LinkState {
    role: LinkRole,
    address: Option<String>,
}

struct ConnectionHandler {
    id: String,
    router: Arc<Router>,
    links: HashMap<String, LinkState>,
    outbound: mpsc::UnboundedSender<ServerFrame>,
}

/// Runs one client connection to completion. Returns when the peer hangs
/// up, violates the protocol, or the broker shuts down.
pub async fn run(stream: TcpStream, router: Arc<Router>, mut shutdown: watch::Receiver<bool>) {
    let ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed: {e}");
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerFrame>();
    let id = format!("conn-{}", Uuid::new_v4());
    info!("opening connection {id}");

    let writer_id = id.clone();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(e) => {
                    warn!("failed to encode frame for {writer_id}: {e}");
                    continue;
                }
            };
            if ws_sender.send(WsMessage::text(text)).await.is_err() {
                break;
            }
        }
        debug!("send loop closed for {writer_id}");
    });

    let mut handler = ConnectionHandler {
        id: id.clone(),
        router,
        links: HashMap::new(),
        outbound: tx,
    };

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            next = ws_receiver.next() => {
                let Some(Ok(msg)) = next else { break };
                if !msg.is_text() {
                    continue;
                }
                let Ok(text) = msg.to_text() else { continue };
                match serde_json::from_str::<ClientFrame>(text) {
                    Ok(frame) => {
                        if let Err(e) = handler.handle(frame) {
                            warn!("{id}: {e}");
                            handler.send(ServerFrame::Close { error: e.to_string() });
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("malformed frame from {id}: {e}");
                        handler.send(ServerFrame::Close {
                            error: format!("malformed frame: {e}"),
                        });
                        break;
                    }
                }
            }
        }
    }

    handler.detach_all();
    info!("closing connection {id}");

    // Dropping the handler drops the outbound sender; the writer drains
    // whatever is queued and exits.
    drop(handler);
    let _ = writer.await;
}

impl ConnectionHandler {
    fn handle(&mut self, frame: ClientFrame) -> Result<()> {
        match frame {
            ClientFrame::Attach {
                link,
                role,
                address,
                dynamic,
            } => self.on_attach(link, role, address, dynamic),
            ClientFrame::Detach { link } => self.on_detach(&link),
            ClientFrame::Flow { link, credit } => self.on_flow(&link, credit),
            ClientFrame::Transfer {
                link,
                delivery,
                message,
            } => self.on_transfer(&link, delivery, message),
        }
    }

    fn on_attach(
        &mut self,
        link: String,
        role: LinkRole,
        address: Option<String>,
        dynamic: bool,
    ) -> Result<()> {
        if self.links.contains_key(&link) {
            return Err(Error::Protocol(format!("link '{link}' already attached")));
        }

        match role {
            LinkRole::Receiver => {
                let (address, queue) = if dynamic {
                    self.router.resolve_dynamic()
                } else {
                    let address = address.ok_or_else(|| {
                        Error::Protocol(format!("receiver link '{link}' needs an address"))
                    })?;
                    let queue = self.router.resolve(&address);
                    (address, queue)
                };

                let consumer =
                    Consumer::new(self.consumer_id(&link), link.as_str(), self.outbound.clone());
                queue.lock().unwrap().attach(consumer);

                self.links.insert(
                    link.clone(),
                    LinkState {
                        role,
                        address: Some(address.clone()),
                    },
                );
                self.send(ServerFrame::Attached { link, address });
            }
            LinkRole::Sender => {
                // No address means an anonymous sender; each transfer must
                // carry its target in `message.to`.
                self.links.insert(
                    link.clone(),
                    LinkState {
                        role,
                        address: address.clone(),
                    },
                );
                self.send(ServerFrame::Attached {
                    link,
                    address: address.unwrap_or_default(),
                });
            }
        }
        Ok(())
    }

    fn on_detach(&mut self, link: &str) -> Result<()> {
        let Some(state) = self.links.remove(link) else {
            return Err(Error::Protocol(format!("detach for unknown link '{link}'")));
        };

        if state.role == LinkRole::Receiver {
            if let Some(address) = &state.address {
                self.router.detach(address, &self.consumer_id(link));
            }
        }
        self.send(ServerFrame::Detached {
            link: link.to_string(),
            error: None,
        });
        Ok(())
    }

    fn on_flow(&mut self, link: &str, credit: u32) -> Result<()> {
        let Some(state) = self.links.get(link) else {
            return Err(Error::Protocol(format!("flow for unknown link '{link}'")));
        };
        if state.role != LinkRole::Receiver {
            self.close_link(link, "flow on a sender link");
            return Ok(());
        }
        let Some(address) = state.address.clone() else {
            self.close_link(link, "flow on a link without an address");
            return Ok(());
        };

        let queue = self.router.resolve(&address);
        queue
            .lock()
            .unwrap()
            .grant_credit(&self.consumer_id(link), credit);
        Ok(())
    }

    fn on_transfer(&mut self, link: &str, delivery: u64, message: Message) -> Result<()> {
        let Some(state) = self.links.get(link) else {
            return Err(Error::Protocol(format!(
                "transfer for unknown link '{link}'"
            )));
        };
        if state.role != LinkRole::Sender {
            self.close_link(link, "transfer on a receiver link");
            return Ok(());
        }

        let Some(target) = message.to.clone().or_else(|| state.address.clone()) else {
            self.close_link(link, "transfer without a target address");
            return Ok(());
        };

        let mut message = message;
        if message.timestamp == 0 {
            message.timestamp = chrono::Utc::now().timestamp_millis();
        }

        debug!("{}: transfer {delivery} on '{link}' to '{target}'", self.id);
        self.router.route(message, &target);
        self.send(ServerFrame::Disposition {
            link: link.to_string(),
            delivery,
            accepted: true,
        });
        Ok(())
    }

    /// Closes one link after a local protocol error. The rest of the
    /// connection and all queue state stay untouched.
    fn close_link(&mut self, link: &str, reason: &str) {
        warn!("{}: closing link '{link}': {reason}", self.id);
        if let Some(state) = self.links.remove(link) {
            if state.role == LinkRole::Receiver {
                if let Some(address) = &state.address {
                    self.router.detach(address, &self.consumer_id(link));
                }
            }
        }
        self.send(ServerFrame::Detached {
            link: link.to_string(),
            error: Some(reason.to_string()),
        });
    }

    /// Detaches every link this connection owns. Named queues and their
    /// pending messages stay; ephemeral queues may be destroyed.
    fn detach_all(&mut self) {
        let links: Vec<(String, LinkState)> = self.links.drain().collect();
        for (link, state) in links {
            if state.role == LinkRole::Receiver {
                if let Some(address) = state.address {
                    self.router.detach(&address, &format!("{}/{link}", self.id));
                }
            }
        }
    }

    fn consumer_id(&self, link: &str) -> String {
        format!("{}/{link}", self.id)
    }

    fn send(&self, frame: ServerFrame) {
        let _ = self.outbound.send(frame);
    }
}
