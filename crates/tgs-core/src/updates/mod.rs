//! Update stream abstractions (Telegram today; any push source later).

pub mod bus;
pub mod port;
pub mod types;
