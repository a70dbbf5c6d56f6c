//! HCI commands and their completions
//!
//! Each command variant knows its opcode and packs its parameters at the
//! fixed offsets the controller expects.

use crate::error::{HciError, Result};
use crate::gap::{AddressType, BdAddr};
use crate::hci::constants::*;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};

/// Builds a 16-bit opcode from its group and command fields
pub const fn opcode(ogf: u8, ocf: u16) -> u16 {
    ((ogf as u16) << OGF_SHIFT) | (ocf & 0x03FF)
}

bitflags! {
    /// Events the controller may report to the host (Set Event Mask)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventMask: u64 {
        const DISCONNECTION_COMPLETE = 1 << 4;
        const ENCRYPTION_CHANGE = 1 << 7;
        const HARDWARE_ERROR = 1 << 15;
        const DATA_BUFFER_OVERFLOW = 1 << 25;
        const ENCRYPTION_KEY_REFRESH_COMPLETE = 1 << 47;
        const LE_META = 1 << 61;
    }
}

impl Default for EventMask {
    fn default() -> Self {
        EventMask::from_bits_retain(0x3FFF_FFFF_FFFF_FFFF)
    }
}

bitflags! {
    /// LE sub-events the controller may report (LE Set Event Mask)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LeEventMask: u64 {
        const CONNECTION_COMPLETE = 1 << 0;
        const ADVERTISING_REPORT = 1 << 1;
        const CONNECTION_UPDATE_COMPLETE = 1 << 2;
        const READ_REMOTE_FEATURES_COMPLETE = 1 << 3;
        const LONG_TERM_KEY_REQUEST = 1 << 4;
        const REMOTE_CONNECTION_PARAMETER_REQUEST = 1 << 5;
        const DATA_LENGTH_CHANGE = 1 << 6;
        const READ_LOCAL_P256_COMPLETE = 1 << 7;
        const GENERATE_DHKEY_COMPLETE = 1 << 8;
        const ENHANCED_CONNECTION_COMPLETE = 1 << 9;
    }
}

impl Default for LeEventMask {
    fn default() -> Self {
        LeEventMask::from_bits_retain(0x0000_0000_0000_03FF)
    }
}

/// Advertising or scan response payload, at most 31 bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdvertisingData {
    len: u8,
    data: [u8; LE_ADV_DATA_MAX_LEN],
}

impl AdvertisingData {
    pub fn new(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > LE_ADV_DATA_MAX_LEN {
            return Err(HciError::InvalidParamLength(bytes.len()));
        }
        let mut data = [0u8; LE_ADV_DATA_MAX_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(Self {
            len: bytes.len() as u8,
            data,
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }
}

/// LE Set Scan Parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanParameters {
    /// 0 = passive, 1 = active
    pub scan_type: u8,
    /// 0.625 ms units
    pub interval: u16,
    /// 0.625 ms units
    pub window: u16,
    pub own_address_type: AddressType,
    pub filter_policy: u8,
}

impl Default for ScanParameters {
    fn default() -> Self {
        Self {
            scan_type: 0x01,
            interval: 0x0010,
            window: 0x0010,
            own_address_type: AddressType::Public,
            filter_policy: 0x00,
        }
    }
}

/// LE Set Advertising Parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdvertisingParameters {
    /// 0.625 ms units
    pub min_interval: u16,
    /// 0.625 ms units
    pub max_interval: u16,
    pub advertising_type: u8,
    pub own_address_type: AddressType,
    pub direct_address_type: AddressType,
    pub direct_address: BdAddr,
    pub channel_map: u8,
    pub filter_policy: u8,
}

impl Default for AdvertisingParameters {
    fn default() -> Self {
        Self {
            min_interval: 0x0800,
            max_interval: 0x0800,
            advertising_type: 0x00,
            own_address_type: AddressType::Public,
            direct_address_type: AddressType::Public,
            direct_address: BdAddr::default(),
            channel_map: 0x07,
            filter_policy: 0x00,
        }
    }
}

/// LE Create Connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateConnectionParameters {
    pub scan_interval: u16,
    pub scan_window: u16,
    pub initiator_filter: u8,
    pub peer_address_type: AddressType,
    pub peer_address: BdAddr,
    pub own_address_type: AddressType,
    /// 1.25 ms units
    pub min_interval: u16,
    /// 1.25 ms units
    pub max_interval: u16,
    pub latency: u16,
    /// 10 ms units
    pub supervision_timeout: u16,
    pub min_ce_length: u16,
    pub max_ce_length: u16,
}

impl CreateConnectionParameters {
    /// Parameters for connecting to `peer` with the usual timing
    pub fn to_peer(peer_address_type: AddressType, peer_address: BdAddr) -> Self {
        Self {
            scan_interval: 0x0060,
            scan_window: 0x0030,
            initiator_filter: 0x00,
            peer_address_type,
            peer_address,
            own_address_type: AddressType::Public,
            min_interval: 0x0006,
            max_interval: 0x0008,
            latency: 0x0000,
            supervision_timeout: 0x00C8,
            min_ce_length: 0x0004,
            max_ce_length: 0x0006,
        }
    }
}

/// Connection timing used by LE Connection Update and by the reply to a
/// remote connection parameter request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionParameters {
    pub handle: u16,
    /// 1.25 ms units
    pub min_interval: u16,
    /// 1.25 ms units
    pub max_interval: u16,
    pub latency: u16,
    /// 10 ms units
    pub supervision_timeout: u16,
}

/// Commands the engine issues to the controller
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HciCommand {
    // Link Control Commands (OGF: 0x01)
    Disconnect { handle: u16, reason: u8 },

    // Host Controller Commands (OGF: 0x03)
    Reset,
    SetEventMask { event_mask: EventMask },

    // Informational Parameters (OGF: 0x04)
    ReadBdAddr,

    // LE Commands (OGF: 0x08)
    LeSetEventMask { event_mask: LeEventMask },
    LeReadBufferSize,
    LeSetRandomAddress { address: BdAddr },
    LeSetAdvertisingParameters(AdvertisingParameters),
    LeSetAdvertisingData(AdvertisingData),
    LeSetScanResponseData(AdvertisingData),
    LeSetAdvertisingEnable { enable: bool },
    LeSetScanParameters(ScanParameters),
    LeSetScanEnable { enable: bool, filter_duplicates: bool },
    LeCreateConnection(CreateConnectionParameters),
    LeCreateConnectionCancel,
    LeConnectionUpdate(ConnectionParameters),
    LeRemoteConnectionParameterRequestReply(ConnectionParameters),
}

impl HciCommand {
    /// Get the OGF and OCF for this command
    pub fn opcode_parts(&self) -> (u8, u16) {
        match self {
            Self::Disconnect { .. } => (OGF_LINK_CTL, OCF_DISCONNECT),

            Self::Reset => (OGF_HOST_CTL, OCF_RESET),
            Self::SetEventMask { .. } => (OGF_HOST_CTL, OCF_SET_EVENT_MASK),

            Self::ReadBdAddr => (OGF_INFO_PARAM, OCF_READ_BD_ADDR),

            Self::LeSetEventMask { .. } => (OGF_LE, OCF_LE_SET_EVENT_MASK),
            Self::LeReadBufferSize => (OGF_LE, OCF_LE_READ_BUFFER_SIZE),
            Self::LeSetRandomAddress { .. } => (OGF_LE, OCF_LE_SET_RANDOM_ADDRESS),
            Self::LeSetAdvertisingParameters(_) => (OGF_LE, OCF_LE_SET_ADVERTISING_PARAMETERS),
            Self::LeSetAdvertisingData(_) => (OGF_LE, OCF_LE_SET_ADVERTISING_DATA),
            Self::LeSetScanResponseData(_) => (OGF_LE, OCF_LE_SET_SCAN_RESPONSE_DATA),
            Self::LeSetAdvertisingEnable { .. } => (OGF_LE, OCF_LE_SET_ADVERTISING_ENABLE),
            Self::LeSetScanParameters(_) => (OGF_LE, OCF_LE_SET_SCAN_PARAMETERS),
            Self::LeSetScanEnable { .. } => (OGF_LE, OCF_LE_SET_SCAN_ENABLE),
            Self::LeCreateConnection(_) => (OGF_LE, OCF_LE_CREATE_CONNECTION),
            Self::LeCreateConnectionCancel => (OGF_LE, OCF_LE_CREATE_CONNECTION_CANCEL),
            Self::LeConnectionUpdate(_) => (OGF_LE, OCF_LE_CONNECTION_UPDATE),
            Self::LeRemoteConnectionParameterRequestReply(_) => {
                (OGF_LE, OCF_LE_REMOTE_CONN_PARAM_REQ_REPLY)
            }
        }
    }

    pub fn opcode(&self) -> u16 {
        let (ogf, ocf) = self.opcode_parts();
        opcode(ogf, ocf)
    }

    /// Convert the command to its raw parameter bytes
    pub fn parameters(&self) -> Vec<u8> {
        match self {
            Self::Reset
            | Self::ReadBdAddr
            | Self::LeReadBufferSize
            | Self::LeCreateConnectionCancel => vec![],

            Self::Disconnect { handle, reason } => {
                let mut params = [0u8; 3];
                LittleEndian::write_u16(&mut params[0..], *handle);
                params[2] = *reason;
                params.to_vec()
            }

            Self::SetEventMask { event_mask } => event_mask.bits().to_le_bytes().to_vec(),

            Self::LeSetEventMask { event_mask } => event_mask.bits().to_le_bytes().to_vec(),

            Self::LeSetRandomAddress { address } => address.bytes.to_vec(),

            Self::LeSetAdvertisingParameters(p) => {
                let mut params = [0u8; 15];
                LittleEndian::write_u16(&mut params[0..], p.min_interval);
                LittleEndian::write_u16(&mut params[2..], p.max_interval);
                params[4] = p.advertising_type;
                params[5] = p.own_address_type.into();
                params[6] = p.direct_address_type.into();
                params[7..13].copy_from_slice(&p.direct_address.bytes);
                params[13] = p.channel_map;
                params[14] = p.filter_policy;
                params.to_vec()
            }

            // Length byte followed by the payload zero-padded to 31 bytes
            Self::LeSetAdvertisingData(data) | Self::LeSetScanResponseData(data) => {
                let mut params = [0u8; 1 + LE_ADV_DATA_MAX_LEN];
                params[0] = data.len;
                params[1..].copy_from_slice(&data.data);
                params.to_vec()
            }

            Self::LeSetAdvertisingEnable { enable } => vec![*enable as u8],

            Self::LeSetScanParameters(p) => {
                let mut params = [0u8; 7];
                params[0] = p.scan_type;
                LittleEndian::write_u16(&mut params[1..], p.interval);
                LittleEndian::write_u16(&mut params[3..], p.window);
                params[5] = p.own_address_type.into();
                params[6] = p.filter_policy;
                params.to_vec()
            }

            Self::LeSetScanEnable {
                enable,
                filter_duplicates,
            } => vec![*enable as u8, *filter_duplicates as u8],

            Self::LeCreateConnection(p) => {
                let mut params = [0u8; 25];
                LittleEndian::write_u16(&mut params[0..], p.scan_interval);
                LittleEndian::write_u16(&mut params[2..], p.scan_window);
                params[4] = p.initiator_filter;
                params[5] = p.peer_address_type.into();
                params[6..12].copy_from_slice(&p.peer_address.bytes);
                params[12] = p.own_address_type.into();
                LittleEndian::write_u16(&mut params[13..], p.min_interval);
                LittleEndian::write_u16(&mut params[15..], p.max_interval);
                LittleEndian::write_u16(&mut params[17..], p.latency);
                LittleEndian::write_u16(&mut params[19..], p.supervision_timeout);
                LittleEndian::write_u16(&mut params[21..], p.min_ce_length);
                LittleEndian::write_u16(&mut params[23..], p.max_ce_length);
                params.to_vec()
            }

            Self::LeConnectionUpdate(p) => {
                connection_parameters(p, LE_CONN_UPDATE_MIN_CE_LEN, LE_CONN_UPDATE_MAX_CE_LEN)
            }

            Self::LeRemoteConnectionParameterRequestReply(p) => connection_parameters(
                p,
                LE_CONN_PARAM_REPLY_MIN_CE_LEN,
                LE_CONN_PARAM_REPLY_MAX_CE_LEN,
            ),
        }
    }

    /// Convert the command to a raw HCI packet
    pub fn to_packet(&self) -> Vec<u8> {
        let params = self.parameters();
        let mut packet = vec![0u8; 1 + HCI_COMMAND_HEADER_SIZE + params.len()];
        encode_command(&mut packet, self.opcode(), &params);
        packet
    }
}

fn connection_parameters(
    p: &ConnectionParameters,
    min_ce_length: u16,
    max_ce_length: u16,
) -> Vec<u8> {
    let mut params = [0u8; 14];
    LittleEndian::write_u16(&mut params[0..], p.handle);
    LittleEndian::write_u16(&mut params[2..], p.min_interval);
    LittleEndian::write_u16(&mut params[4..], p.max_interval);
    LittleEndian::write_u16(&mut params[6..], p.latency);
    LittleEndian::write_u16(&mut params[8..], p.supervision_timeout);
    LittleEndian::write_u16(&mut params[10..], min_ce_length);
    LittleEndian::write_u16(&mut params[12..], max_ce_length);
    params.to_vec()
}

/// Writes `[Command][opcode:2][len:1][params]` into `out`, returning the
/// frame length. `out` must hold at least `4 + params.len()` bytes.
pub fn encode_command(out: &mut [u8], opcode: u16, params: &[u8]) -> usize {
    let total = 1 + HCI_COMMAND_HEADER_SIZE + params.len();
    out[0] = HCI_COMMAND_PKT;
    LittleEndian::write_u16(&mut out[1..3], opcode);
    out[3] = params.len() as u8;
    out[4..total].copy_from_slice(params);
    total
}

/// Result of a command as reported by Command Complete or Command Status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandCompletion {
    pub opcode: u16,
    pub status: u8,
    /// Return parameters following the status byte; empty for Command Status
    pub payload: Vec<u8>,
}

impl CommandCompletion {
    pub fn is_success(&self) -> bool {
        self.status == 0x00
    }
}

/// Completion state for the single command allowed in flight.
///
/// An empty slot means no completion has been seen since the last command
/// was written; events for other opcodes overwrite the slot without
/// satisfying the waiter.
#[derive(Debug, Default)]
pub struct CompletionSlot {
    completion: Option<CommandCompletion>,
}

impl CompletionSlot {
    /// Clears the slot ahead of a new command
    pub fn arm(&mut self) {
        self.completion = None;
    }

    pub fn record(&mut self, completion: CommandCompletion) {
        self.completion = Some(completion);
    }

    /// Takes the completion if it answers `opcode`
    pub fn take_matching(&mut self, opcode: u16) -> Option<CommandCompletion> {
        match &self.completion {
            Some(completion) if completion.opcode == opcode => self.completion.take(),
            _ => None,
        }
    }
}
