//! Upper-layer collaborators fed by the engine
//!
//! The Attribute Protocol and L2CAP signaling layers live outside this
//! crate. The engine tells them about connections coming and going and
//! hands them the payloads of their fixed channels.

use crate::error::Result;
use crate::gap::Role;

/// Attribute Protocol layer
pub trait AttLayer {
    fn add_connection(&mut self, handle: u16);

    fn remove_connection(&mut self, handle: u16);

    /// Delivers one ATT PDU received on `handle`
    fn handle_data(&mut self, handle: u16, data: &[u8]) -> Result<()>;

    /// Propagates the MTU negotiated with the controller
    fn set_max_mtu(&mut self, mtu: u16) -> Result<()>;
}

/// L2CAP signaling layer
pub trait L2capLayer {
    fn add_connection(
        &mut self,
        handle: u16,
        role: Role,
        interval: u16,
        timeout: u16,
    ) -> Result<()>;

    fn remove_connection(&mut self, handle: u16);

    /// Delivers one signaling packet received on `handle`
    fn handle_data(&mut self, handle: u16, data: &[u8]) -> Result<()>;
}

// Hosts that only scan or advertise have no upper layers.
impl AttLayer for () {
    fn add_connection(&mut self, _handle: u16) {}

    fn remove_connection(&mut self, _handle: u16) {}

    fn handle_data(&mut self, _handle: u16, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    fn set_max_mtu(&mut self, _mtu: u16) -> Result<()> {
        Ok(())
    }
}

impl L2capLayer for () {
    fn add_connection(
        &mut self,
        _handle: u16,
        _role: Role,
        _interval: u16,
        _timeout: u16,
    ) -> Result<()> {
        Ok(())
    }

    fn remove_connection(&mut self, _handle: u16) {}

    fn handle_data(&mut self, _handle: u16, _data: &[u8]) -> Result<()> {
        Ok(())
    }
}
