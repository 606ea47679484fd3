//! The `transport` module defines the wire protocol between clients and the
//! broker, and the address-URL syntax the CLI tools accept.
//!
//! Frames are JSON objects carried as WebSocket text messages; the WebSocket
//! layer provides reliable, delimited framing per connection so the broker
//! core only ever sees decoded frames.

pub mod frame;
pub mod url;

pub use frame::{ClientFrame, LinkRole, ServerFrame};
pub use url::{AddressUrl, parse_address_url};

#[cfg(test)]
mod tests;
