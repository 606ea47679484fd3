use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message envelope moving through the system.
///
/// A message is immutable once sent. The broker moves it from queue to
/// consumer without copying it (except on multicast addresses, where each
/// consumer gets its own clone).
///
/// # Fields
///
/// - `id` - Generator-assigned identifier; may be empty.
/// - `body` - The payload, usually a plain string or JSON text.
/// - `to` - Target address, used by anonymous sender links.
/// - `correlation_id` - Links a response to its originating request.
/// - `reply_to` - Address a response to this message should be routed to.
/// - `timestamp` - Unix timestamp in milliseconds at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    #[serde(default)]
    pub timestamp: i64,
}

impl Message {
    /// Creates a message with the given body, an empty id, and the current
    /// timestamp.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            body: body.into(),
            to: None,
            correlation_id: None,
            reply_to: None,
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    /// Creates a message with a fresh UUID id.
    pub fn with_generated_id(body: impl Into<String>) -> Self {
        let mut message = Self::new(body);
        message.id = Uuid::new_v4().to_string();
        message
    }
}
