//! HCI protocol constants
//!
//! This module contains constants used in the Bluetooth HCI protocol.

use std::time::Duration;

// HCI packet types
pub const HCI_COMMAND_PKT: u8 = 0x01;
pub const HCI_ACL_PKT: u8 = 0x02;
pub const HCI_SCO_PKT: u8 = 0x03;
pub const HCI_EVENT_PKT: u8 = 0x04;

// Maximum size of HCI command parameters
pub const HCI_MAX_PARAM_LEN: usize = 251;

// Capacity of the inbound frame buffer and the outbound write buffer.
// Holds the largest event frame (1 + 2 + 255 bytes), rounded up to 4.
pub const HCI_BUFFER_SIZE: usize = 260;

// Frame header sizes, excluding the packet type byte
pub const HCI_COMMAND_HEADER_SIZE: usize = 3;
pub const HCI_ACL_HEADER_SIZE: usize = 4;
pub const HCI_SCO_HEADER_SIZE: usize = 3;
pub const HCI_EVENT_HEADER_SIZE: usize = 2;

// Basic L2CAP header carried inside every ACL start fragment
pub const L2CAP_HEADER_SIZE: usize = 4;

// ACL handle field layout
pub const ACL_HANDLE_MASK: u16 = 0x0FFF;
pub const ACL_FLAGS_SHIFT: u16 = 12;

// Fixed L2CAP channel identifiers on LE links
pub const ATT_CID: u16 = 0x0004;
pub const SIGNALING_CID: u16 = 0x0005;

// Common OGF (Opcode Group Field) values
pub const OGF_LINK_CTL: u8 = 0x01;
pub const OGF_HOST_CTL: u8 = 0x03;
pub const OGF_INFO_PARAM: u8 = 0x04;
pub const OGF_LE: u8 = 0x08;

pub const OGF_SHIFT: u16 = 10;

// Link Control Commands (OGF: 0x01)
pub const OCF_DISCONNECT: u16 = 0x0006;

// Host Controller Commands (OGF: 0x03)
pub const OCF_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_RESET: u16 = 0x0003;

// Informational Parameters (OGF: 0x04)
pub const OCF_READ_BD_ADDR: u16 = 0x0009;

// LE Command OCF values (OGF: 0x08)
pub const OCF_LE_SET_EVENT_MASK: u16 = 0x0001;
pub const OCF_LE_READ_BUFFER_SIZE: u16 = 0x0002;
pub const OCF_LE_SET_RANDOM_ADDRESS: u16 = 0x0005;
pub const OCF_LE_SET_ADVERTISING_PARAMETERS: u16 = 0x0006;
pub const OCF_LE_SET_ADVERTISING_DATA: u16 = 0x0008;
pub const OCF_LE_SET_SCAN_RESPONSE_DATA: u16 = 0x0009;
pub const OCF_LE_SET_ADVERTISING_ENABLE: u16 = 0x000A;
pub const OCF_LE_SET_SCAN_PARAMETERS: u16 = 0x000B;
pub const OCF_LE_SET_SCAN_ENABLE: u16 = 0x000C;
pub const OCF_LE_CREATE_CONNECTION: u16 = 0x000D;
pub const OCF_LE_CREATE_CONNECTION_CANCEL: u16 = 0x000E;
pub const OCF_LE_CONNECTION_UPDATE: u16 = 0x0013;
pub const OCF_LE_REMOTE_CONN_PARAM_REQ_REPLY: u16 = 0x0020;

// HCI Events
pub const EVT_DISCONN_COMPLETE: u8 = 0x05;
pub const EVT_ENCRYPTION_CHANGE: u8 = 0x08;
pub const EVT_CMD_COMPLETE: u8 = 0x0E;
pub const EVT_CMD_STATUS: u8 = 0x0F;
pub const EVT_HARDWARE_ERROR: u8 = 0x10;
pub const EVT_NUM_COMP_PKTS: u8 = 0x13;
pub const EVT_LE_META_EVENT: u8 = 0x3E;

// LE Meta Events
pub const EVT_LE_CONN_COMPLETE: u8 = 0x01;
pub const EVT_LE_ADVERTISING_REPORT: u8 = 0x02;
pub const EVT_LE_CONN_UPDATE_COMPLETE: u8 = 0x03;
pub const EVT_LE_READ_REMOTE_FEATURES_COMPLETE: u8 = 0x04;
pub const EVT_LE_LONG_TERM_KEY_REQUEST: u8 = 0x05;
pub const EVT_LE_REMOTE_CONN_PARAM_REQUEST: u8 = 0x06;
pub const EVT_LE_DATA_LENGTH_CHANGE: u8 = 0x07;
pub const EVT_LE_READ_LOCAL_P256_COMPLETE: u8 = 0x08;
pub const EVT_LE_GENERATE_DHKEY_COMPLETE: u8 = 0x09;
pub const EVT_LE_ENHANCED_CONN_COMPLETE: u8 = 0x0A;

// Disconnect reason: remote user terminated connection
pub const HCI_OE_USER_ENDED_CONNECTION: u8 = 0x13;

// Maximum advertising / scan response / EIR payload
pub const LE_ADV_DATA_MAX_LEN: usize = 31;

// Smallest LE ACL data length a controller may report
pub const LE_MIN_ACL_DATA_LEN: u16 = 27;

// Minimum and maximum connection event length offered when accepting a
// remote connection parameter request (0.625 ms units)
pub const LE_CONN_PARAM_REPLY_MIN_CE_LEN: u16 = 0x000F;
pub const LE_CONN_PARAM_REPLY_MAX_CE_LEN: u16 = 0x0FFF;

// Minimum and maximum connection event length requested by connection updates
pub const LE_CONN_UPDATE_MIN_CE_LEN: u16 = 0x0004;
pub const LE_CONN_UPDATE_MAX_CE_LEN: u16 = 0x0006;

// Framer backoff after an incomplete read and after a discarded buffer
pub const POLL_BACKOFF: Duration = Duration::from_millis(1);
pub const ERROR_BACKOFF: Duration = Duration::from_millis(5);

// Default bound on waiting for a command completion
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(3);

// Chunk size used when draining stale bytes at start-up
pub const DRAIN_CHUNK_SIZE: usize = 32;

// Largest ATT MTU whose PDU plus L2CAP header fits one buffered ACL frame
pub const ATT_MAX_MTU: u16 = (HCI_BUFFER_SIZE - 1 - HCI_ACL_HEADER_SIZE - L2CAP_HEADER_SIZE) as u16;
