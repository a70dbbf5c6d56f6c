//! Generic Access Profile types shared by the HCI engine
//!
//! Device addresses, address types and connection roles as they appear on
//! the wire.

pub mod constants;
pub mod types;

pub use constants::*;
pub use types::*;
