//! The `utils` module collects shared pieces used across the toolkit: the
//! crate-wide error type and logging setup.

pub mod error;
pub mod logging;
