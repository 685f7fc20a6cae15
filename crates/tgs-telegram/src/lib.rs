//! Telegram adapter (teloxide).
//!
//! Converts Bot API updates into `tgs-core` update events and feeds them to an
//! `UpdateBus`, where collectors pick them up.

pub mod convert;
pub mod polling;
