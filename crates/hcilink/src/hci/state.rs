//! Connection and advertising state observed by the event decoder
//!
//! Both records are single slots: every new report or connection event
//! overwrites the previous one in place. Callers read them between polls.

use crate::gap::{AddressType, BdAddr, Role};
use crate::hci::constants::LE_ADV_DATA_MAX_LEN;
use crate::hci::eir;

/// Most recent LE advertising report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvertisingReport {
    /// Set when a report has been decoded since the slot was last cleared
    pub reported: bool,
    pub event_type: u8,
    pub address_type: AddressType,
    pub address: BdAddr,
    pub rssi: i8,
    eir_len: u8,
    eir: [u8; LE_ADV_DATA_MAX_LEN],
}

impl AdvertisingReport {
    pub(crate) fn new(
        event_type: u8,
        address_type: AddressType,
        address: BdAddr,
        eir: &[u8],
        rssi: i8,
    ) -> Self {
        let eir_len = eir.len().min(LE_ADV_DATA_MAX_LEN);
        let mut data = [0u8; LE_ADV_DATA_MAX_LEN];
        data[..eir_len].copy_from_slice(&eir[..eir_len]);
        Self {
            reported: true,
            event_type,
            address_type,
            address,
            rssi,
            eir_len: eir_len as u8,
            eir: data,
        }
    }

    /// Advertising payload carried by the report
    pub fn eir(&self) -> &[u8] {
        &self.eir[..self.eir_len as usize]
    }

    pub fn local_name(&self) -> Option<String> {
        eir::local_name(self.eir())
    }

    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        eir::manufacturer_data(self.eir())
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Most recent connection or disconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConnectionState {
    pub connected: bool,
    pub disconnected: bool,
    pub status: u8,
    pub handle: u16,
    pub role: Role,
    pub peer_address_type: AddressType,
    pub peer_address: BdAddr,
    /// 1.25 ms units
    pub interval: u16,
    pub latency: u16,
    /// 10 ms units
    pub supervision_timeout: u16,
}

impl ConnectionState {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Outbound ACL frames not yet acknowledged by the controller.
///
/// Advisory only; sending is never blocked on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketCredit {
    pending: u16,
}

impl PacketCredit {
    pub fn pending(&self) -> u16 {
        self.pending
    }

    pub fn sent(&mut self) {
        self.pending = self.pending.saturating_add(1);
    }

    /// Applies a Number Of Completed Packets count, flooring at zero
    pub fn completed(&mut self, count: u16) {
        self.pending = self.pending.saturating_sub(count);
    }
}
