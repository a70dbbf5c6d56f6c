//! In-memory collaborators for engine tests

use crate::error::{HciError, Result};
use crate::gap::Role;
use crate::hci::constants::HCI_COMMAND_PKT;
use crate::hci::layers::{AttLayer, L2capLayer};
use crate::hci::transport::Transport;
use std::collections::VecDeque;
use std::io;

/// Transport fed from a byte queue.
///
/// Replies registered with [`MockTransport::reply_to`] are queued for
/// reading when a command with the matching opcode is written. In packet
/// mode each read returns one queued packet and drops whatever does not fit.
#[derive(Debug, Default)]
pub struct MockTransport {
    rx: VecDeque<u8>,
    chunk: Option<usize>,
    packets: Option<VecDeque<usize>>,
    read_requests: Vec<usize>,
    written: Vec<Vec<u8>>,
    replies: Vec<(u16, Vec<u8>)>,
    read_error: Option<io::ErrorKind>,
    pub sessions_opened: usize,
    pub sessions_closed: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes at most `chunk` bytes visible per read
    pub fn with_chunk_size(chunk: usize) -> Self {
        Self {
            chunk: Some(chunk),
            ..Self::default()
        }
    }

    /// Delivers one packet per read, like an HCI socket
    pub fn with_packets() -> Self {
        Self {
            packets: Some(VecDeque::new()),
            ..Self::default()
        }
    }

    pub fn push_rx(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    pub fn push_packet(&mut self, bytes: &[u8]) {
        if let Some(packets) = self.packets.as_mut() {
            packets.push_back(bytes.len());
        }
        self.push_rx(bytes);
    }

    pub fn reply_to(&mut self, opcode: u16, bytes: &[u8]) {
        self.replies.push((opcode, bytes.to_vec()));
    }

    pub fn fail_reads(&mut self, kind: io::ErrorKind) {
        self.read_error = Some(kind);
    }

    pub fn read_requests(&self) -> &[usize] {
        &self.read_requests
    }

    pub fn written(&self) -> &[Vec<u8>] {
        &self.written
    }

    /// Opcodes of every command frame written so far
    pub fn written_opcodes(&self) -> Vec<u16> {
        self.written
            .iter()
            .filter(|frame| frame.len() >= 4 && frame[0] == HCI_COMMAND_PKT)
            .map(|frame| u16::from_le_bytes([frame[1], frame[2]]))
            .collect()
    }

    pub fn rx_len(&self) -> usize {
        self.rx.len()
    }

    fn visible(&self) -> usize {
        if let Some(packets) = &self.packets {
            return packets.front().copied().unwrap_or(0);
        }
        match self.chunk {
            Some(chunk) => self.rx.len().min(chunk),
            None => self.rx.len(),
        }
    }
}

impl Transport for MockTransport {
    fn start_read(&mut self) {
        self.sessions_opened += 1;
    }

    fn end_read(&mut self) {
        self.sessions_closed += 1;
    }

    fn buffered(&mut self) -> io::Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(kind.into());
        }
        Ok(self.visible())
    }

    fn preserves_packet_boundaries(&self) -> bool {
        self.packets.is_some()
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.read_error {
            return Err(kind.into());
        }
        self.read_requests.push(buf.len());
        let packet = self.visible();
        let count = buf.len().min(packet);
        let taken = if self.packets.is_some() { packet } else { count };
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..taken)) {
            *slot = byte;
        }
        if let Some(packets) = self.packets.as_mut() {
            packets.pop_front();
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.push(buf.to_vec());

        if buf.len() >= 4 && buf[0] == HCI_COMMAND_PKT {
            let opcode = u16::from_le_bytes([buf[1], buf[2]]);
            if let Some(index) = self.replies.iter().position(|(op, _)| *op == opcode) {
                let (_, reply) = self.replies.remove(index);
                self.push_packet(&reply);
            }
        }
        Ok(buf.len())
    }
}

/// ATT layer that records every call
#[derive(Debug, Default)]
pub struct RecordingAtt {
    pub connections: Vec<u16>,
    pub removed: Vec<u16>,
    pub data: Vec<(u16, Vec<u8>)>,
    pub max_mtu: Option<u16>,
}

impl AttLayer for RecordingAtt {
    fn add_connection(&mut self, handle: u16) {
        self.connections.push(handle);
    }

    fn remove_connection(&mut self, handle: u16) {
        self.removed.push(handle);
    }

    fn handle_data(&mut self, handle: u16, data: &[u8]) -> Result<()> {
        self.data.push((handle, data.to_vec()));
        Ok(())
    }

    fn set_max_mtu(&mut self, mtu: u16) -> Result<()> {
        self.max_mtu = Some(mtu);
        Ok(())
    }
}

/// L2CAP signaling layer that records every call
#[derive(Debug, Default)]
pub struct RecordingL2cap {
    pub connections: Vec<(u16, Role, u16, u16)>,
    pub removed: Vec<u16>,
    pub data: Vec<(u16, Vec<u8>)>,
    pub refuse_connections: bool,
}

impl L2capLayer for RecordingL2cap {
    fn add_connection(
        &mut self,
        handle: u16,
        role: Role,
        interval: u16,
        timeout: u16,
    ) -> Result<()> {
        if self.refuse_connections {
            return Err(HciError::UpperLayer(format!(
                "no room for handle 0x{:04X}",
                handle
            )));
        }
        self.connections.push((handle, role, interval, timeout));
        Ok(())
    }

    fn remove_connection(&mut self, handle: u16) {
        self.removed.push(handle);
    }

    fn handle_data(&mut self, handle: u16, data: &[u8]) -> Result<()> {
        self.data.push((handle, data.to_vec()));
        Ok(())
    }
}
