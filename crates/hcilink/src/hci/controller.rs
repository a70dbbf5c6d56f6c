//! Controller commands issued by the engine
//!
//! Thin wrappers that build an [`HciCommand`], send it through the
//! dispatcher and fold any return parameters back into engine state.

use crate::error::{HciError, Result};
use crate::gap::BdAddr;
use crate::hci::command::{
    AdvertisingData, AdvertisingParameters, ConnectionParameters, CreateConnectionParameters,
    EventMask, HciCommand, LeEventMask, ScanParameters,
};
use crate::hci::constants::*;
use crate::hci::engine::HciEngine;
use crate::hci::layers::{AttLayer, L2capLayer};
use crate::hci::transport::Transport;
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

impl<T: Transport, A: AttLayer, L: L2capLayer> HciEngine<T, A, L> {
    /// Brings the controller to a known state: reset, read its address,
    /// enable the configured events and size the ACL buffers.
    pub fn init(&mut self) -> Result<()> {
        self.reset()?;
        let address = self.read_bd_addr()?;
        let event_mask = self.config().event_mask;
        self.set_event_mask(event_mask)?;
        let le_event_mask = self.config().le_event_mask;
        self.le_set_event_mask(le_event_mask)?;
        let mtu = self.read_le_buffer_size()?;
        info!("Controller {} ready, ATT MTU {}", address, mtu);
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.send_command(&HciCommand::Reset)?;
        Ok(())
    }

    pub fn set_event_mask(&mut self, event_mask: EventMask) -> Result<()> {
        self.send_command(&HciCommand::SetEventMask { event_mask })?;
        Ok(())
    }

    pub fn le_set_event_mask(&mut self, event_mask: LeEventMask) -> Result<()> {
        self.send_command(&HciCommand::LeSetEventMask { event_mask })?;
        Ok(())
    }

    /// Reads the controller's LE ACL buffer size and returns the ATT MTU
    /// derived from it.
    ///
    /// The MTU is the controller's packet length, raised to the 27-byte
    /// minimum and capped by what one frame in the receive buffer can carry.
    /// It is propagated to the ATT layer.
    pub fn read_le_buffer_size(&mut self) -> Result<u16> {
        let completion = self.send_command(&HciCommand::LeReadBufferSize)?;
        let payload = &completion.payload;
        if payload.len() < 3 {
            return Err(HciError::InvalidPacket(
                "LE Read Buffer Size response too short".into(),
            ));
        }

        let packet_len = LittleEndian::read_u16(&payload[0..2]);
        self.set_max_packets(payload[2]);

        let mtu = packet_len.clamp(LE_MIN_ACL_DATA_LEN, ATT_MAX_MTU);
        debug!(
            "LE buffers: {} x {} bytes, ATT MTU {}",
            payload[2], packet_len, mtu
        );
        self.set_att_mtu(mtu)?;
        Ok(mtu)
    }

    /// Reads the public device address and remembers it
    pub fn read_bd_addr(&mut self) -> Result<BdAddr> {
        let completion = self.send_command(&HciCommand::ReadBdAddr)?;
        let address = BdAddr::from_slice(&completion.payload).ok_or_else(|| {
            HciError::InvalidPacket("Read BD_ADDR response too short".into())
        })?;
        self.set_address(address);
        Ok(address)
    }

    pub fn le_set_random_address(&mut self, address: BdAddr) -> Result<()> {
        self.send_command(&HciCommand::LeSetRandomAddress { address })?;
        Ok(())
    }

    pub fn le_set_scan_parameters(&mut self, params: &ScanParameters) -> Result<()> {
        self.send_command(&HciCommand::LeSetScanParameters(*params))?;
        Ok(())
    }

    pub fn le_set_scan_enable(&mut self, enable: bool, filter_duplicates: bool) -> Result<()> {
        let completion = self.send_command(&HciCommand::LeSetScanEnable {
            enable,
            filter_duplicates,
        })?;
        if completion.is_success() {
            self.set_scanning(enable);
        }
        Ok(())
    }

    pub fn le_set_advertising_parameters(&mut self, params: &AdvertisingParameters) -> Result<()> {
        self.send_command(&HciCommand::LeSetAdvertisingParameters(*params))?;
        Ok(())
    }

    /// Sets the advertising payload; at most 31 bytes
    pub fn le_set_advertising_data(&mut self, data: &[u8]) -> Result<()> {
        let data = AdvertisingData::new(data)?;
        self.send_command(&HciCommand::LeSetAdvertisingData(data))?;
        Ok(())
    }

    /// Sets the scan response payload; at most 31 bytes
    pub fn le_set_scan_response_data(&mut self, data: &[u8]) -> Result<()> {
        let data = AdvertisingData::new(data)?;
        self.send_command(&HciCommand::LeSetScanResponseData(data))?;
        Ok(())
    }

    /// Turns advertising on or off without waiting for the controller.
    pub fn le_set_advertise_enable(&mut self, enable: bool) -> Result<()> {
        self.send_command_without_response(&HciCommand::LeSetAdvertisingEnable { enable })
    }

    /// Starts connecting; completion is reported later by a connection event.
    pub fn le_create_connection(&mut self, params: &CreateConnectionParameters) -> Result<()> {
        self.send_command(&HciCommand::LeCreateConnection(*params))?;
        Ok(())
    }

    pub fn le_cancel_connection(&mut self) -> Result<()> {
        self.send_command(&HciCommand::LeCreateConnectionCancel)?;
        Ok(())
    }

    pub fn le_connection_update(&mut self, params: &ConnectionParameters) -> Result<()> {
        self.send_command(&HciCommand::LeConnectionUpdate(*params))?;
        Ok(())
    }

    /// Terminates a connection as if the user ended it
    pub fn disconnect(&mut self, handle: u16) -> Result<()> {
        self.send_command(&HciCommand::Disconnect {
            handle,
            reason: HCI_OE_USER_ENDED_CONNECTION,
        })?;
        Ok(())
    }
}
