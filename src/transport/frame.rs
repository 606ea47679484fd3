use serde::{Deserialize, Serialize};

use crate::broker::message::Message;

/// Direction of a link from the client's point of view: a `sender` link
/// transfers messages to the broker, a `receiver` link gets deliveries from
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRole {
    Sender,
    Receiver,
}

/// Frames sent from a client to the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Opens a named link. Receiver links either name an address or request a
    /// dynamic one (the broker generates an ephemeral reply queue). Sender
    /// links without an address are anonymous and route per message via
    /// `message.to`.
    Attach {
        link: String,
        role: LinkRole,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
        #[serde(default)]
        dynamic: bool,
    },
    /// Closes a link. Detaching the last consumer of an ephemeral queue
    /// destroys the queue.
    Detach { link: String },
    /// Grants the broker `credit` more deliveries on a receiver link.
    Flow { link: String, credit: u32 },
    /// Sends one message on a sender link.
    Transfer {
        link: String,
        delivery: u64,
        message: Message,
    },
}

/// Frames sent from the broker to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirms an attach, echoing the resolved (or generated) address.
    Attached { link: String, address: String },
    /// Confirms a detach, or reports a link-level protocol error.
    Detached {
        link: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A message delivered on a receiver link. Deliveries are pre-settled;
    /// they consume one unit of granted credit.
    Deliver {
        link: String,
        delivery: u64,
        message: Message,
    },
    /// Settlement of a transfer the client sent.
    Disposition {
        link: String,
        delivery: u64,
        accepted: bool,
    },
    /// Fatal connection-level error; the broker drops the connection after
    /// sending this.
    Close { error: String },
}

impl ServerFrame {
    /// The link a frame belongs to, if any.
    pub fn link(&self) -> Option<&str> {
        match self {
            ServerFrame::Attached { link, .. }
            | ServerFrame::Detached { link, .. }
            | ServerFrame::Deliver { link, .. }
            | ServerFrame::Disposition { link, .. } => Some(link),
            ServerFrame::Close { .. } => None,
        }
    }
}
