//! Core of the Telegram SDK: domain records, the ordered `Collection`, and
//! bounded collectors over an update stream.
//!
//! This crate is intentionally framework-agnostic. Telegram transport lives
//! behind the `UpdateSource` port, implemented in adapter crates.

pub mod collection;
pub mod collector;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod updates;

pub use collection::Collection;
pub use errors::{Error, Result};
