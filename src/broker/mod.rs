//! The `broker` module contains the in-memory message broker: queues with
//! credit-based dispatch, the address router (including request/response
//! correlation tracking), per-connection handlers, and the listener
//! lifecycle.

pub mod connection;
pub mod message;
pub mod queue;
pub mod router;
pub mod server;

pub use router::Router;
pub use server::{Broker, BrokerState};
