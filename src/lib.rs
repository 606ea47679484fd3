//! # qtools
//!
//! `qtools` is a small AMQP-style messaging toolkit: one-way senders and
//! receivers, request/response clients and servers, a message generator, and
//! a minimal in-memory broker used for testing. Clients talk to the broker
//! with JSON frames carried over WebSocket connections.
//!
//! ## Core Modules
//!
//! - `broker`: queues, the address router, per-connection handlers, and the
//!   broker listener/lifecycle.
//! - `client`: the client-side connection and sender/receiver links used by
//!   the CLI tools.
//! - `transport`: the wire frames exchanged between clients and the broker,
//!   and address-URL parsing.
//! - `config`: loading and merging broker/server configuration.
//! - `utils`: shared error types and logging setup.

pub mod broker;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

#[cfg(test)]
mod tests;
