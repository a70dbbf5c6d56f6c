//! Engine configuration

use crate::hci::command::{EventMask, LeEventMask};
use crate::hci::constants::COMMAND_TIMEOUT;
use std::time::Duration;

/// HCI engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HciConfig {
    /// Events enabled by Set Event Mask during `init`
    pub event_mask: EventMask,
    /// LE sub-events enabled by LE Set Event Mask during `init`
    pub le_event_mask: LeEventMask,
    /// How long a command waits for its Command Complete or Command Status
    pub command_timeout: Duration,
}

impl Default for HciConfig {
    fn default() -> Self {
        Self {
            event_mask: EventMask::default(),
            le_event_mask: LeEventMask::default(),
            command_timeout: COMMAND_TIMEOUT,
        }
    }
}
