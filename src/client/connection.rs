//! Client connection and links
//!
//! A `Connection` owns two background tasks: a writer draining an outbound
//! frame channel into the socket, and a reader demultiplexing server frames
//! to per-link channels. Links are handles over those channels; dropping a
//! link stops its frames from being delivered, dropping the connection's
//! last handle closes the socket once the tasks finish.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tracing::{debug, warn};
use tungstenite::protocol::Message as WsMessage;

use crate::broker::message::Message;
use crate::transport::frame::{ClientFrame, LinkRole, ServerFrame};
use crate::utils::error::{Error, Result};

type LinkMap = Arc<Mutex<HashMap<String, mpsc::UnboundedSender<ServerFrame>>>>;

/// A client connection to the broker.
pub struct Connection {
    outbound: mpsc::UnboundedSender<ClientFrame>,
    links: LinkMap,
    next_link: AtomicU64,
}

impl Connection {
    /// Connects to a broker over loopback or the network.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let url = format!("ws://{host}:{port}");
        let (ws, _) = connect_async(url).await?;
        let (mut ws_sender, mut ws_receiver) = ws.split();

        let (tx, mut rx) = mpsc::unbounded_channel::<ClientFrame>();
        let links: LinkMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("failed to encode frame: {e}");
                        continue;
                    }
                };
                if ws_sender.send(WsMessage::text(text)).await.is_err() {
                    break;
                }
            }
        });

        let reader_links = links.clone();
        tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_receiver.next().await {
                if !msg.is_text() {
                    continue;
                }
                let Ok(text) = msg.to_text() else { continue };
                match serde_json::from_str::<ServerFrame>(text) {
                    Ok(ServerFrame::Close { error }) => {
                        warn!("connection closed by broker: {error}");
                        break;
                    }
                    Ok(frame) => {
                        let Some(link) = frame.link().map(str::to_string) else {
                            continue;
                        };
                        let sender = reader_links.lock().unwrap().get(&link).cloned();
                        match sender {
                            Some(sender) => {
                                let _ = sender.send(frame);
                            }
                            None => debug!("dropping frame for unknown link '{link}'"),
                        }
                    }
                    Err(e) => warn!("malformed frame from broker: {e}"),
                }
            }
            // Closing the per-link channels wakes anything blocked on them.
            reader_links.lock().unwrap().clear();
        });

        Ok(Self {
            outbound: tx,
            links,
            next_link: AtomicU64::new(0),
        })
    }

    /// Attaches a sender link. With no address the link is anonymous and
    /// every message must carry its target in `message.to`.
    pub async fn attach_sender(&self, address: Option<&str>) -> Result<SenderLink> {
        let name = self.next_link_name("sender");
        let mut frames = self.register_link(&name);

        self.send_frame(ClientFrame::Attach {
            link: name.clone(),
            role: LinkRole::Sender,
            address: address.map(str::to_string),
            dynamic: false,
        })?;

        match frames.recv().await {
            Some(ServerFrame::Attached { .. }) => Ok(SenderLink {
                name,
                outbound: self.outbound.clone(),
                frames,
                next_delivery: 0,
            }),
            Some(ServerFrame::Detached { error, .. }) => Err(Error::Protocol(
                error.unwrap_or_else(|| "link rejected".to_string()),
            )),
            _ => Err(Error::ConnectionClosed),
        }
    }

    /// Attaches a receiver link. With no address the broker creates a
    /// dynamic (ephemeral) queue and reports its generated address. An
    /// initial credit window is granted before the link is returned.
    pub async fn attach_receiver(&self, address: Option<&str>) -> Result<ReceiverLink> {
        let name = self.next_link_name("receiver");
        let mut frames = self.register_link(&name);
        let dynamic = address.is_none();

        self.send_frame(ClientFrame::Attach {
            link: name.clone(),
            role: LinkRole::Receiver,
            address: address.map(str::to_string),
            dynamic,
        })?;

        let address = match frames.recv().await {
            Some(ServerFrame::Attached { address, .. }) => address,
            Some(ServerFrame::Detached { error, .. }) => {
                return Err(Error::Protocol(
                    error.unwrap_or_else(|| "link rejected".to_string()),
                ));
            }
            _ => return Err(Error::ConnectionClosed),
        };

        let mut link = ReceiverLink {
            name,
            address,
            outbound: self.outbound.clone(),
            frames,
            credit: 0,
        };
        link.grant(ReceiverLink::CREDIT_WINDOW)?;
        Ok(link)
    }

    fn next_link_name(&self, kind: &str) -> String {
        format!("{kind}-{}", self.next_link.fetch_add(1, Ordering::Relaxed))
    }

    fn register_link(&self, name: &str) -> mpsc::UnboundedReceiver<ServerFrame> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.links.lock().unwrap().insert(name.to_string(), tx);
        rx
    }

    fn send_frame(&self, frame: ClientFrame) -> Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| Error::ConnectionClosed)
    }
}

/// A link for sending messages to one address (or, anonymously, to the
/// address named per message).
pub struct SenderLink {
    name: String,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    frames: mpsc::UnboundedReceiver<ServerFrame>,
    next_delivery: u64,
}

impl SenderLink {
    /// Sends one message and waits for the broker to settle it.
    pub async fn send(&mut self, message: Message) -> Result<()> {
        let delivery = self.next_delivery;
        self.next_delivery += 1;

        self.outbound
            .send(ClientFrame::Transfer {
                link: self.name.clone(),
                delivery,
                message,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        loop {
            match self.frames.recv().await {
                Some(ServerFrame::Disposition {
                    delivery: settled,
                    accepted,
                    ..
                }) if settled == delivery => {
                    if accepted {
                        return Ok(());
                    }
                    return Err(Error::Protocol(format!("delivery {delivery} was rejected")));
                }
                Some(ServerFrame::Detached { error, .. }) => {
                    return Err(Error::Protocol(
                        error.unwrap_or_else(|| "link detached".to_string()),
                    ));
                }
                Some(_) => continue,
                None => return Err(Error::ConnectionClosed),
            }
        }
    }
}

/// A link consuming messages from one address, with a client-driven credit
/// window.
pub struct ReceiverLink {
    name: String,
    address: String,
    outbound: mpsc::UnboundedSender<ClientFrame>,
    frames: mpsc::UnboundedReceiver<ServerFrame>,
    credit: u32,
}

impl ReceiverLink {
    /// Credit granted on attach and topped back up as deliveries drain it.
    pub const CREDIT_WINDOW: u32 = 10;

    /// The queue address this link consumes from. For dynamic links this is
    /// the broker-generated reply address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Receives the next message, replenishing credit once half the window
    /// is consumed.
    pub async fn recv(&mut self) -> Result<Message> {
        if self.credit <= Self::CREDIT_WINDOW / 2 {
            self.grant(Self::CREDIT_WINDOW - self.credit)?;
        }

        loop {
            match self.frames.recv().await {
                Some(ServerFrame::Deliver { message, .. }) => {
                    self.credit = self.credit.saturating_sub(1);
                    return Ok(message);
                }
                Some(ServerFrame::Detached { error, .. }) => {
                    return Err(Error::Protocol(
                        error.unwrap_or_else(|| "link detached".to_string()),
                    ));
                }
                Some(_) => continue,
                None => return Err(Error::ConnectionClosed),
            }
        }
    }

    /// Detaches the link. For a dynamic link this destroys the reply queue
    /// if no other consumer is attached.
    pub fn detach(&self) -> Result<()> {
        self.outbound
            .send(ClientFrame::Detach {
                link: self.name.clone(),
            })
            .map_err(|_| Error::ConnectionClosed)
    }

    fn grant(&mut self, credit: u32) -> Result<()> {
        self.outbound
            .send(ClientFrame::Flow {
                link: self.name.clone(),
                credit,
            })
            .map_err(|_| Error::ConnectionClosed)?;
        self.credit += credit;
        Ok(())
    }
}
