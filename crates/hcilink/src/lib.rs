//! hcilink - A Bluetooth Low Energy HCI host engine
//!
//! This library drives a BLE controller over a byte transport (UART, SPI
//! bridge or a Linux HCI user channel). It reassembles HCI frames from
//! partial reads, issues commands and waits for their completions, tracks
//! advertising and connection state, and routes connection data to the
//! Attribute Protocol and L2CAP signaling layers.

pub mod config;
pub mod error;
pub mod gap;
pub mod hci;

// Re-export common types for convenience
pub use config::HciConfig;
pub use error::{HciError, Result};
pub use gap::{AddressType, BdAddr, Role};
pub use hci::{AttLayer, HciEngine, HciSocket, L2capLayer, Transport};
