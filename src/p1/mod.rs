//! # DSMR P1 Port
//!
//! Reading telegrams from a smart meter's P1 port and turning them into
//! counter readings.

pub mod serial;
pub mod serial_mock;
pub mod telegram;

pub use serial::{P1DeviceHandle, P1Transport, TelegramSource};
pub use telegram::{parse_telegram, Reading, Telegram, TelegramParser};
