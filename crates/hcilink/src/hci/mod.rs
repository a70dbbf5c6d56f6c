//! Bluetooth HCI (Host Controller Interface) engine
//!
//! Frames bytes from a [`Transport`] into HCI packets, correlates commands
//! with their completions, decodes events and hands ACL payloads to the ATT
//! and L2CAP layers.

pub mod buffer;
pub mod command;
pub mod constants;
mod controller;
pub mod eir;
pub mod engine;
pub mod event;
pub mod layers;
pub mod packet;
pub mod socket;
pub mod state;
pub mod transport;

#[cfg(test)]
mod mock;

pub use command::{
    AdvertisingParameters, CommandCompletion, ConnectionParameters, CreateConnectionParameters,
    EventMask, HciCommand, LeEventMask, ScanParameters,
};
pub use engine::HciEngine;
pub use event::{ConnectionComplete, HciEvent, LeMetaEvent};
pub use layers::{AttLayer, L2capLayer};
pub use socket::HciSocket;
pub use state::{AdvertisingReport, ConnectionState};
pub use transport::Transport;
