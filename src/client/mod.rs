//! The `client` module implements the client side of the wire protocol:
//! a `Connection` holding the socket tasks, plus `SenderLink` and
//! `ReceiverLink` handles used by the CLI tools.

pub mod connection;

pub use connection::{Connection, ReceiverLink, SenderLink};
