//! HCI engine
//!
//! [`HciEngine`] owns the transport, the receive buffer and the single-slot
//! state records. The caller drives it cooperatively: [`HciEngine::poll`]
//! pulls bytes from the transport and handles at most one complete frame,
//! and the blocking command call polls until its completion arrives.

use crate::config::HciConfig;
use crate::error::{HciError, Result};
use crate::gap::BdAddr;
use crate::hci::buffer::PacketBuffer;
use crate::hci::command::{encode_command, CommandCompletion, CompletionSlot, HciCommand};
use crate::hci::constants::*;
use crate::hci::event::{HciEvent, LeMetaEvent};
use crate::hci::layers::{AttLayer, L2capLayer};
use crate::hci::packet::{declared_frame_len, encode_acl, next_frame, AclHeader, Frame};
use crate::hci::state::{AdvertisingReport, ConnectionState, PacketCredit};
use crate::hci::transport::Transport;
use log::{debug, trace, warn};
use std::thread;
use std::time::{Duration, Instant};

/// Host side of the HCI link to one controller
pub struct HciEngine<T: Transport, A: AttLayer = (), L: L2capLayer = ()> {
    transport: T,
    att: A,
    l2cap: L,
    config: HciConfig,
    buffer: PacketBuffer,
    write_buf: [u8; HCI_BUFFER_SIZE],
    slot: CompletionSlot,
    address: Option<BdAddr>,
    scanning: bool,
    advertising_report: AdvertisingReport,
    connection: ConnectionState,
    max_packets: u8,
    credit: PacketCredit,
}

impl<T: Transport, A: AttLayer, L: L2capLayer> HciEngine<T, A, L> {
    pub fn new(transport: T, att: A, l2cap: L) -> Self {
        Self::with_config(transport, att, l2cap, HciConfig::default())
    }

    pub fn with_config(transport: T, att: A, l2cap: L, config: HciConfig) -> Self {
        Self {
            transport,
            att,
            l2cap,
            config,
            buffer: PacketBuffer::new(),
            write_buf: [0u8; HCI_BUFFER_SIZE],
            slot: CompletionSlot::default(),
            address: None,
            scanning: false,
            advertising_report: AdvertisingReport::default(),
            connection: ConnectionState::default(),
            max_packets: 0,
            credit: PacketCredit::default(),
        }
    }

    pub fn config(&self) -> &HciConfig {
        &self.config
    }

    /// Timeout applied to blocking commands
    pub fn command_timeout(&self) -> Duration {
        self.config.command_timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn att(&self) -> &A {
        &self.att
    }

    pub fn l2cap(&self) -> &L {
        &self.l2cap
    }

    /// Most recent advertising report
    pub fn advertising_report(&self) -> &AdvertisingReport {
        &self.advertising_report
    }

    pub fn clear_advertising_report(&mut self) {
        self.advertising_report.clear();
    }

    /// Most recent connection or disconnection
    pub fn connection(&self) -> &ConnectionState {
        &self.connection
    }

    pub fn clear_connection_state(&mut self) {
        self.connection.clear();
    }

    /// Outbound ACL frames the controller has not yet reported as completed
    pub fn pending_packets(&self) -> u16 {
        self.credit.pending()
    }

    /// Total LE ACL buffers reported by the controller
    pub fn max_packets(&self) -> u8 {
        self.max_packets
    }

    pub(crate) fn set_max_packets(&mut self, max_packets: u8) {
        self.max_packets = max_packets;
    }

    /// Local device address, once read from the controller
    pub fn address(&self) -> Option<BdAddr> {
        self.address
    }

    pub(crate) fn set_address(&mut self, address: BdAddr) {
        self.address = Some(address);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning
    }

    pub(crate) fn set_scanning(&mut self, scanning: bool) {
        self.scanning = scanning;
    }

    /// Propagates the negotiated MTU to the ATT layer
    pub(crate) fn set_att_mtu(&mut self, mtu: u16) -> Result<()> {
        self.att.set_max_mtu(mtu)
    }

    /// Discards whatever the controller queued before the engine took over.
    pub fn start(&mut self) -> Result<()> {
        self.transport.start_read();
        let result = self.drain();
        self.transport.end_read();
        self.buffer.clear();
        self.slot.arm();

        let drained = result?;
        if drained > 0 {
            debug!("Discarded {} stale bytes from the transport", drained);
        }
        Ok(())
    }

    fn drain(&mut self) -> Result<usize> {
        let mut scratch = [0u8; DRAIN_CHUNK_SIZE];
        let mut drained = 0;
        while self.transport.buffered()? > 0 {
            let read = self.transport.read(&mut scratch)?;
            if read == 0 {
                break;
            }
            drained += read;
        }
        Ok(drained)
    }

    /// Pulls available bytes from the transport and handles the next
    /// complete frame, if any.
    ///
    /// A partial frame stays buffered for the next call. Framing errors are
    /// absorbed by discarding the buffer; transport and upper-layer errors
    /// are returned.
    pub fn poll(&mut self) -> Result<()> {
        self.transport.start_read();
        let result = self.poll_frames();
        self.transport.end_read();
        result
    }

    fn poll_frames(&mut self) -> Result<()> {
        let mut waited = false;

        loop {
            let available = match self.transport.buffered() {
                Ok(available) => available,
                Err(err) => {
                    self.buffer.clear();
                    return Err(err.into());
                }
            };

            if available > 0 {
                waited = false;
                if let Err(err) = self.buffer.fill_from(&mut self.transport, available) {
                    self.buffer.clear();
                    return Err(err);
                }
            }

            match self.process_next_frame() {
                Ok(true) => return Ok(()),
                Ok(false) if self.overflowed() => {
                    warn!(
                        "Discarding {} buffered bytes without a complete frame",
                        self.buffer.len()
                    );
                    self.buffer.clear();
                    thread::sleep(ERROR_BACKOFF);
                }
                Ok(false) => {
                    if available == 0 && (self.buffer.is_empty() || waited) {
                        return Ok(());
                    }
                    waited = available == 0;
                    thread::sleep(POLL_BACKOFF);
                }
                Err(err) if err.is_recoverable() => {
                    warn!("Resynchronising after framing error: {}", err);
                    self.buffer.clear();
                    thread::sleep(ERROR_BACKOFF);
                }
                Err(err) => {
                    self.buffer.clear();
                    return Err(err);
                }
            }
        }
    }

    /// The buffer cannot make progress: it is full, or the head frame
    /// declares more bytes than it can ever hold.
    fn overflowed(&self) -> bool {
        self.buffer.is_full()
            || declared_frame_len(self.buffer.unread())
                .is_some_and(|len| len > self.buffer.capacity())
    }

    /// Handles the frame at the head of the buffer. Returns `false` while
    /// the frame is incomplete.
    fn process_next_frame(&mut self) -> Result<bool> {
        let Some((frame, len)) = next_frame(self.buffer.unread())? else {
            return Ok(false);
        };

        let event = match frame {
            Frame::Event(body) => {
                trace!("HCI event < {}", hex::encode(body));
                Some(HciEvent::parse(body)?)
            }
            Frame::Acl(body) => {
                trace!("HCI ACL < {}", hex::encode(body));
                route_acl(&mut self.att, &mut self.l2cap, body)?;
                None
            }
            Frame::Sync(body) => {
                debug!("Skipping synchronous data frame ({} bytes)", body.len());
                None
            }
        };

        self.buffer.consume(len);

        if let Some(event) = event {
            self.handle_event(event)?;
        }
        Ok(true)
    }

    fn write_command(&mut self, opcode: u16, params: &[u8]) -> Result<()> {
        if params.len() > HCI_MAX_PARAM_LEN {
            return Err(HciError::InvalidParamLength(params.len()));
        }

        let len = encode_command(&mut self.write_buf, opcode, params);
        trace!("HCI command > {}", hex::encode(&self.write_buf[..len]));
        self.transport.write_all(&self.write_buf[..len])?;
        self.slot.arm();
        Ok(())
    }

    /// Sends a command and waits for the Command Complete or Command Status
    /// event carrying the same opcode.
    ///
    /// Completions for other opcodes keep the call waiting. A non-zero
    /// status is returned to the caller rather than treated as an error.
    pub fn send_with_response(&mut self, opcode: u16, params: &[u8]) -> Result<CommandCompletion> {
        self.write_command(opcode, params)?;

        let started = Instant::now();
        loop {
            self.poll()?;

            if let Some(completion) = self.slot.take_matching(opcode) {
                if !completion.is_success() {
                    warn!(
                        "Command 0x{:04X} failed with status 0x{:02X}",
                        opcode, completion.status
                    );
                }
                return Ok(completion);
            }

            if started.elapsed() >= self.config.command_timeout {
                warn!("Command 0x{:04X} timed out", opcode);
                self.slot.arm();
                return Err(HciError::Timeout { opcode });
            }

            thread::sleep(POLL_BACKOFF);
        }
    }

    /// Sends a command without waiting for its completion
    pub fn send_without_response(&mut self, opcode: u16, params: &[u8]) -> Result<()> {
        self.write_command(opcode, params)
    }

    pub fn send_command(&mut self, command: &HciCommand) -> Result<CommandCompletion> {
        debug!("Sending {:?}", command);
        self.send_with_response(command.opcode(), &command.parameters())
    }

    pub fn send_command_without_response(&mut self, command: &HciCommand) -> Result<()> {
        debug!("Sending {:?} without waiting", command);
        self.send_without_response(command.opcode(), &command.parameters())
    }

    /// Sends one L2CAP packet on `cid` over the connection `handle`
    pub fn send_acl(&mut self, handle: u16, cid: u16, data: &[u8]) -> Result<()> {
        let len = encode_acl(&mut self.write_buf, handle, cid, data)?;
        trace!("HCI ACL > {}", hex::encode(&self.write_buf[..len]));
        self.transport.write_all(&self.write_buf[..len])?;
        self.credit.sent();
        Ok(())
    }

    fn handle_event(&mut self, event: HciEvent) -> Result<()> {
        match event {
            HciEvent::DisconnectionComplete {
                status,
                handle,
                reason,
            } => {
                debug!(
                    "Disconnection complete: handle 0x{:04X}, reason 0x{:02X}",
                    handle, reason
                );
                self.att.remove_connection(handle);
                self.l2cap.remove_connection(handle);
                self.connection.connected = false;
                self.connection.disconnected = true;
                self.connection.status = status;
                self.connection.handle = handle;

                // Connections stop advertising, so resume once one ends
                self.le_set_advertise_enable(true)?;
            }

            HciEvent::EncryptionChange {
                status,
                handle,
                enabled,
            } => {
                debug!(
                    "Encryption change: handle 0x{:04X}, status 0x{:02X}, enabled {}",
                    handle, status, enabled
                );
            }

            HciEvent::CommandComplete(completion) | HciEvent::CommandStatus(completion) => {
                debug!(
                    "Completion for 0x{:04X}: status 0x{:02X}",
                    completion.opcode, completion.status
                );
                self.slot.record(completion);
            }

            HciEvent::HardwareError { code } => {
                warn!("Controller hardware error 0x{:02X}", code);
                return Err(HciError::UnknownEvent(EVT_HARDWARE_ERROR));
            }

            HciEvent::NumberOfCompletedPackets(completed) => {
                let total = completed
                    .iter()
                    .fold(0u16, |total, &(_, count)| total.saturating_add(count));
                self.credit.completed(total);
            }

            HciEvent::LeMeta(meta) => self.handle_le_meta(meta)?,

            HciEvent::Other { code } => {
                debug!("Ignoring event 0x{:02X}", code);
            }
        }
        Ok(())
    }

    fn handle_le_meta(&mut self, event: LeMetaEvent) -> Result<()> {
        match event {
            LeMetaEvent::ConnectionComplete(conn) => {
                self.connection = ConnectionState {
                    connected: conn.status == 0x00,
                    disconnected: false,
                    status: conn.status,
                    handle: conn.handle,
                    role: conn.role,
                    peer_address_type: conn.peer_address_type,
                    peer_address: conn.peer_address,
                    interval: conn.interval,
                    latency: conn.latency,
                    supervision_timeout: conn.supervision_timeout,
                };

                if conn.status != 0x00 {
                    warn!("Connection failed with status 0x{:02X}", conn.status);
                    return Ok(());
                }

                debug!(
                    "Connected to {} as {:?}: handle 0x{:04X}",
                    conn.peer_address, conn.role, conn.handle
                );
                self.att.add_connection(conn.handle);
                self.l2cap.add_connection(
                    conn.handle,
                    conn.role,
                    conn.interval,
                    conn.supervision_timeout,
                )?;
                self.le_set_advertise_enable(false)?;
            }

            LeMetaEvent::AdvertisingReport(reports) => {
                if let Some(first) = reports.first() {
                    trace!(
                        "{} advertising report(s), first from {} at {} dBm",
                        reports.len(),
                        first.address,
                        first.rssi
                    );
                    self.advertising_report = *first;
                }
            }

            LeMetaEvent::RemoteConnectionParameterRequest(params) => {
                debug!(
                    "Accepting connection parameters for handle 0x{:04X}",
                    params.handle
                );
                self.send_command_without_response(
                    &HciCommand::LeRemoteConnectionParameterRequestReply(params),
                )?;
            }

            LeMetaEvent::Unsupported { subevent } => {
                self.advertising_report.clear();
                return Err(HciError::UnknownEvent(subevent));
            }

            LeMetaEvent::ConnectionUpdateComplete {
                status,
                handle,
                interval,
                latency,
                supervision_timeout,
            } => {
                debug!(
                    "Connection update 0x{:02X} on 0x{:04X}: interval {}, latency {}, timeout {}",
                    status, handle, interval, latency, supervision_timeout
                );
            }

            LeMetaEvent::LongTermKeyRequest { handle } => {
                debug!("Long term key requested for handle 0x{:04X}", handle);
            }

            LeMetaEvent::DataLengthChange { handle } => {
                debug!("Data length changed on handle 0x{:04X}", handle);
            }

            LeMetaEvent::ReadLocalP256Complete { status } => {
                debug!("Local P-256 key read: status 0x{:02X}", status);
            }

            LeMetaEvent::GenerateDhKeyComplete { status } => {
                debug!("DHKey generated: status 0x{:02X}", status);
            }
        }
        Ok(())
    }
}

/// Routes the L2CAP payload of an ACL frame to the layer owning its channel.
fn route_acl<A: AttLayer, L: L2capLayer>(att: &mut A, l2cap: &mut L, body: &[u8]) -> Result<()> {
    let header = AclHeader::parse(body)?;
    let payload = header.payload(body);

    match header.cid {
        ATT_CID => att.handle_data(header.handle, payload),
        SIGNALING_CID => l2cap.handle_data(header.handle, payload),
        cid => {
            debug!(
                "Dropping {} bytes on channel 0x{:04X} for handle 0x{:04X}",
                payload.len(),
                cid,
                header.handle
            );
            Ok(())
        }
    }
}
