//! HCI event decoding
//!
//! Event frames are decoded into owned [`HciEvent`] values before the engine
//! acts on them, so the receive buffer can be compacted independently of
//! event handling. LE meta-events carry a second tag byte and decode into
//! [`LeMetaEvent`].

use crate::error::{HciError, Result};
use crate::gap::{AddressType, BdAddr, Role};
use crate::hci::command::{CommandCompletion, ConnectionParameters};
use crate::hci::constants::*;
use crate::hci::state::AdvertisingReport;
use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use std::io::{Cursor, Read};

/// A decoded HCI event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HciEvent {
    DisconnectionComplete {
        status: u8,
        handle: u16,
        reason: u8,
    },
    EncryptionChange {
        status: u8,
        handle: u16,
        enabled: u8,
    },
    CommandComplete(CommandCompletion),
    CommandStatus(CommandCompletion),
    HardwareError {
        code: u8,
    },
    /// (handle, completed packets) pairs
    NumberOfCompletedPackets(Vec<(u16, u16)>),
    LeMeta(LeMetaEvent),
    /// Any other event code; observed and ignored
    Other {
        code: u8,
    },
}

/// A decoded LE meta-event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeMetaEvent {
    ConnectionComplete(ConnectionComplete),
    /// One entry per report carried by the event
    AdvertisingReport(Vec<AdvertisingReport>),
    ConnectionUpdateComplete {
        status: u8,
        handle: u16,
        interval: u16,
        latency: u16,
        supervision_timeout: u16,
    },
    LongTermKeyRequest {
        handle: u16,
    },
    RemoteConnectionParameterRequest(ConnectionParameters),
    DataLengthChange {
        handle: u16,
    },
    ReadLocalP256Complete {
        status: u8,
    },
    GenerateDhKeyComplete {
        status: u8,
    },
    /// A sub-event this engine does not handle
    Unsupported {
        subevent: u8,
    },
}

/// LE Connection Complete and LE Enhanced Connection Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionComplete {
    pub enhanced: bool,
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

fn too_short(what: &str) -> HciError {
    HciError::InvalidPacket(format!("{} too short", what))
}

impl HciEvent {
    /// Decode an event frame body: `[code][len][params...]`
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HCI_EVENT_HEADER_SIZE {
            return Err(too_short("Event header"));
        }

        let event_code = data[0];
        let parameter_total_length = data[1] as usize;
        let params = data
            .get(HCI_EVENT_HEADER_SIZE..HCI_EVENT_HEADER_SIZE + parameter_total_length)
            .ok_or_else(|| too_short("Event parameters"))?;

        match event_code {
            EVT_DISCONN_COMPLETE => {
                let mut cursor = Cursor::new(params);
                let what = "Disconnection Complete";
                Ok(Self::DisconnectionComplete {
                    status: cursor.read_u8().map_err(|_| too_short(what))?,
                    handle: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    reason: cursor.read_u8().map_err(|_| too_short(what))?,
                })
            }

            EVT_ENCRYPTION_CHANGE => {
                let mut cursor = Cursor::new(params);
                let what = "Encryption Change";
                Ok(Self::EncryptionChange {
                    status: cursor.read_u8().map_err(|_| too_short(what))?,
                    handle: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    enabled: cursor.read_u8().map_err(|_| too_short(what))?,
                })
            }

            EVT_CMD_COMPLETE => {
                // Num_HCI_Command_Packets, Command_Opcode, Return_Parameters
                if params.len() < 3 {
                    return Err(too_short("Command Complete"));
                }
                let opcode = u16::from_le_bytes([params[1], params[2]]);
                let status = params.get(3).copied().unwrap_or(0x00);
                let payload = params.get(4..).unwrap_or_default().to_vec();
                Ok(Self::CommandComplete(CommandCompletion {
                    opcode,
                    status,
                    payload,
                }))
            }

            EVT_CMD_STATUS => {
                // Status, Num_HCI_Command_Packets, Command_Opcode
                if params.len() < 4 {
                    return Err(too_short("Command Status"));
                }
                Ok(Self::CommandStatus(CommandCompletion {
                    opcode: u16::from_le_bytes([params[2], params[3]]),
                    status: params[0],
                    payload: Vec::new(),
                }))
            }

            EVT_HARDWARE_ERROR => {
                let code = *params.first().ok_or_else(|| too_short("Hardware Error"))?;
                Ok(Self::HardwareError { code })
            }

            EVT_NUM_COMP_PKTS => {
                let mut cursor = Cursor::new(params);
                let what = "Number Of Completed Packets";
                let num_handles = cursor.read_u8().map_err(|_| too_short(what))?;
                let mut completed = Vec::with_capacity(num_handles as usize);
                for _ in 0..num_handles {
                    let handle = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;
                    let count = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;
                    completed.push((handle & ACL_HANDLE_MASK, count));
                }
                Ok(Self::NumberOfCompletedPackets(completed))
            }

            EVT_LE_META_EVENT => LeMetaEvent::parse(params).map(Self::LeMeta),

            code => Ok(Self::Other { code }),
        }
    }
}

impl LeMetaEvent {
    /// Decode LE meta-event parameters, starting at the sub-event code
    pub fn parse(params: &[u8]) -> Result<Self> {
        let subevent = *params.first().ok_or_else(|| too_short("LE Meta Event"))?;
        let body = &params[1..];

        match subevent {
            EVT_LE_CONN_COMPLETE => {
                parse_connection_complete(body, false).map(Self::ConnectionComplete)
            }

            EVT_LE_ENHANCED_CONN_COMPLETE => {
                parse_connection_complete(body, true).map(Self::ConnectionComplete)
            }

            EVT_LE_ADVERTISING_REPORT => {
                parse_advertising_reports(body).map(Self::AdvertisingReport)
            }

            EVT_LE_CONN_UPDATE_COMPLETE => {
                let mut cursor = Cursor::new(body);
                let what = "LE Connection Update Complete";
                Ok(Self::ConnectionUpdateComplete {
                    status: cursor.read_u8().map_err(|_| too_short(what))?,
                    handle: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    interval: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    latency: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    supervision_timeout: cursor
                        .read_u16::<LittleEndian>()
                        .map_err(|_| too_short(what))?,
                })
            }

            EVT_LE_LONG_TERM_KEY_REQUEST => {
                let handle = Cursor::new(body)
                    .read_u16::<LittleEndian>()
                    .map_err(|_| too_short("LE Long Term Key Request"))?;
                Ok(Self::LongTermKeyRequest { handle })
            }

            EVT_LE_REMOTE_CONN_PARAM_REQUEST => {
                let mut cursor = Cursor::new(body);
                let what = "LE Remote Connection Parameter Request";
                Ok(Self::RemoteConnectionParameterRequest(ConnectionParameters {
                    handle: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    min_interval: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    max_interval: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    latency: cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?,
                    supervision_timeout: cursor
                        .read_u16::<LittleEndian>()
                        .map_err(|_| too_short(what))?,
                }))
            }

            EVT_LE_DATA_LENGTH_CHANGE => {
                let handle = Cursor::new(body)
                    .read_u16::<LittleEndian>()
                    .map_err(|_| too_short("LE Data Length Change"))?;
                Ok(Self::DataLengthChange { handle })
            }

            EVT_LE_READ_LOCAL_P256_COMPLETE => {
                let status = *body
                    .first()
                    .ok_or_else(|| too_short("LE Read Local P-256 Complete"))?;
                Ok(Self::ReadLocalP256Complete { status })
            }

            EVT_LE_GENERATE_DHKEY_COMPLETE => {
                let status = *body
                    .first()
                    .ok_or_else(|| too_short("LE Generate DHKey Complete"))?;
                Ok(Self::GenerateDhKeyComplete { status })
            }

            subevent => Ok(Self::Unsupported { subevent }),
        }
    }
}

fn parse_connection_complete(body: &[u8], enhanced: bool) -> Result<ConnectionComplete> {
    let what = if enhanced {
        "LE Enhanced Connection Complete"
    } else {
        "LE Connection Complete"
    };
    let mut cursor = Cursor::new(body);

    let status = cursor.read_u8().map_err(|_| too_short(what))?;
    let handle = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;
    let role_byte = cursor.read_u8().map_err(|_| too_short(what))?;
    let peer_address_type = AddressType::from(cursor.read_u8().map_err(|_| too_short(what))?);
    let mut peer_address = [0u8; 6];
    cursor.read_exact(&mut peer_address).map_err(|_| too_short(what))?;

    if enhanced {
        // Local and peer resolvable private addresses
        let mut resolvable = [0u8; 12];
        cursor.read_exact(&mut resolvable).map_err(|_| too_short(what))?;
    }

    let interval = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;
    let latency = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;
    let supervision_timeout = cursor.read_u16::<LittleEndian>().map_err(|_| too_short(what))?;

    // A failed connection may report any role byte
    let role = match Role::try_from(role_byte) {
        Ok(role) => role,
        Err(_) if status != 0x00 => Role::default(),
        Err(other) => {
            return Err(HciError::InvalidPacket(format!(
                "{} with unknown role 0x{:02X}",
                what, other
            )))
        }
    };

    Ok(ConnectionComplete {
        enhanced,
        status,
        handle: handle & ACL_HANDLE_MASK,
        role,
        peer_address_type,
        peer_address: BdAddr::new(peer_address),
        interval,
        latency,
        supervision_timeout,
    })
}

/// Decodes the reports in an LE Advertising Report event.
///
/// Each report is laid out contiguously: event type, address type, address,
/// data length, data, RSSI. A malformed entry ends decoding; the reports
/// before it are kept, and the event fails only when the first is malformed.
fn parse_advertising_reports(body: &[u8]) -> Result<Vec<AdvertisingReport>> {
    let num_reports = *body.first().ok_or_else(|| too_short("LE Advertising Report"))?;
    let mut reports = Vec::with_capacity(num_reports as usize);
    let mut offset = 1;

    for _ in 0..num_reports {
        match parse_advertising_entry(body, offset) {
            Ok((report, next)) => {
                reports.push(report);
                offset = next;
            }
            Err(err) if !reports.is_empty() => {
                warn!(
                    "Keeping {} of {} advertising reports: {}",
                    reports.len(),
                    num_reports,
                    err
                );
                break;
            }
            Err(err) => return Err(err),
        }
    }

    Ok(reports)
}

/// Decodes the report starting at `offset`, returning it with the offset of
/// the next one.
fn parse_advertising_entry(body: &[u8], offset: usize) -> Result<(AdvertisingReport, usize)> {
    // event type, address type, address, data length
    let header = body
        .get(offset..offset + 9)
        .ok_or_else(|| too_short("LE Advertising Report"))?;
    let event_type = header[0];
    let address_type = AddressType::from(header[1]);
    let address = BdAddr::new([
        header[2], header[3], header[4], header[5], header[6], header[7],
    ]);
    let eir_len = header[8] as usize;

    if eir_len > LE_ADV_DATA_MAX_LEN {
        return Err(HciError::InvalidPacket(format!(
            "advertising data length {} exceeds {}",
            eir_len, LE_ADV_DATA_MAX_LEN
        )));
    }

    let eir_start = offset + 9;
    let rssi_at = eir_start + eir_len;
    if rssi_at >= body.len() {
        return Err(HciError::InvalidPacket(format!(
            "advertising data length {} runs past the event",
            eir_len
        )));
    }

    let report = AdvertisingReport::new(
        event_type,
        address_type,
        address,
        &body[eir_start..rssi_at],
        body[rssi_at] as i8,
    );
    Ok((report, rssi_at + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection_complete(data: &[u8]) -> ConnectionComplete {
        match HciEvent::parse(data).unwrap() {
            HciEvent::LeMeta(LeMetaEvent::ConnectionComplete(conn)) => conn,
            other => panic!("expected a connection complete event, got {:?}", other),
        }
    }

    fn advertising_reports(data: &[u8]) -> Vec<AdvertisingReport> {
        match HciEvent::parse(data).unwrap() {
            HciEvent::LeMeta(LeMetaEvent::AdvertisingReport(reports)) => reports,
            other => panic!("expected an advertising report, got {:?}", other),
        }
    }

    #[test]
    fn test_command_complete_parsing() {
        let data = [
            EVT_CMD_COMPLETE, // Event code
            4,                // Parameter length
            1,                // Num_HCI_Command_Packets
            0x03,             // Command_Opcode (low byte)
            0x0C,             // Command_Opcode (high byte)
            0x00,             // Status
        ];

        let event = HciEvent::parse(&data).unwrap();
        assert_eq!(
            event,
            HciEvent::CommandComplete(CommandCompletion {
                opcode: 0x0C03,
                status: 0x00,
                payload: vec![],
            })
        );
    }

    #[test]
    fn test_command_status_parsing() {
        let data = [EVT_CMD_STATUS, 4, 0x0C, 0x01, 0x0D, 0x20];
        let event = HciEvent::parse(&data).unwrap();
        assert_eq!(
            event,
            HciEvent::CommandStatus(CommandCompletion {
                opcode: 0x200D,
                status: 0x0C,
                payload: vec![],
            })
        );
    }

    #[test]
    fn test_truncated_event_is_invalid() {
        assert!(matches!(HciEvent::parse(&[]), Err(HciError::InvalidPacket(_))));
        assert!(matches!(
            HciEvent::parse(&[EVT_CMD_COMPLETE, 10, 1, 2]),
            Err(HciError::InvalidPacket(_))
        ));
        assert!(matches!(
            HciEvent::parse(&[EVT_DISCONN_COMPLETE, 2, 0x00, 0x40]),
            Err(HciError::InvalidPacket(_))
        ));
    }

    #[test]
    fn test_number_of_completed_packets_parsing() {
        let data = [EVT_NUM_COMP_PKTS, 9, 2, 0x40, 0x00, 0x02, 0x00, 0x41, 0x20, 0x01, 0x00];
        let event = HciEvent::parse(&data).unwrap();
        assert_eq!(
            event,
            HciEvent::NumberOfCompletedPackets(vec![(0x0040, 2), (0x0041, 1)])
        );
    }

    #[test]
    fn test_le_connection_complete_parsing() {
        let data = [
            EVT_LE_META_EVENT,    // Event code
            19,                   // Parameter length
            EVT_LE_CONN_COMPLETE, // Subevent code
            0x00,                 // Status
            0x40,
            0x00, // Connection_Handle
            0x01, // Role
            0x00, // Peer_Address_Type
            0x01,
            0x02,
            0x03,
            0x04,
            0x05,
            0x06, // Peer_Address
            0x0A,
            0x00, // Conn_Interval
            0x00,
            0x00, // Conn_Latency
            0x80,
            0x0C, // Supervision_Timeout
            0x00, // Master_Clock_Accuracy
        ];

        let conn = connection_complete(&data);

        assert!(!conn.enhanced);
        assert_eq!(conn.status, 0x00);
        assert_eq!(conn.handle, 0x0040);
        assert_eq!(conn.role, Role::Peripheral);
        assert_eq!(conn.peer_address_type, AddressType::Public);
        assert_eq!(conn.peer_address, BdAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        assert_eq!(conn.interval, 0x000A);
        assert_eq!(conn.latency, 0x0000);
        assert_eq!(conn.supervision_timeout, 0x0C80);
    }

    #[test]
    fn test_le_enhanced_connection_complete_skips_resolvable_addresses() {
        let mut data = vec![EVT_LE_META_EVENT, 31, EVT_LE_ENHANCED_CONN_COMPLETE];
        data.extend_from_slice(&[0x00, 0x41, 0x00, 0x00, 0x01]);
        data.extend_from_slice(&[0xA1, 0xA2, 0xA3, 0xA4, 0xA5, 0xC6]);
        data.extend_from_slice(&[0xEE; 12]);
        data.extend_from_slice(&[0x18, 0x00, 0x02, 0x00, 0x48, 0x00, 0x00]);

        let conn = connection_complete(&data);

        assert!(conn.enhanced);
        assert_eq!(conn.handle, 0x0041);
        assert_eq!(conn.role, Role::Central);
        assert_eq!(conn.peer_address_type, AddressType::Random);
        assert_eq!(conn.interval, 0x0018);
        assert_eq!(conn.latency, 0x0002);
        assert_eq!(conn.supervision_timeout, 0x0048);
    }

    #[test]
    fn test_le_advertising_report_parsing() {
        let data = [
            EVT_LE_META_EVENT,         // Event code
            15,                        // Parameter length
            EVT_LE_ADVERTISING_REPORT, // Subevent code
            1,                         // Num_Reports
            0,                         // Event_Type
            0,                         // Address_Type
            0x01,
            0x02,
            0x03,
            0x04,
            0x05,
            0x06, // Address
            3,    // Data_Length
            0x09,
            0x54,
            0x65, // Data (Type: Complete Local Name, Value: "Te")
            0xC3, // RSSI (-61 dBm)
        ];

        let reports = advertising_reports(&data);

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.reported);
        assert_eq!(report.event_type, 0);
        assert_eq!(report.address_type, AddressType::Public);
        assert_eq!(report.address, BdAddr::new([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]));
        assert_eq!(report.eir(), &[0x09, 0x54, 0x65]);
        assert_eq!(report.rssi, -61);
    }

    #[test]
    fn test_le_advertising_report_decodes_every_entry() {
        let mut data = vec![EVT_LE_META_EVENT, 0, EVT_LE_ADVERTISING_REPORT, 2];
        data.extend_from_slice(&[0x00, 0x01, 1, 1, 1, 1, 1, 0xC1, 2, 0x01, 0x06, 0xB0]);
        data.extend_from_slice(&[0x04, 0x00, 2, 2, 2, 2, 2, 2, 0, 0xA6]);
        data[1] = (data.len() - 2) as u8;

        let reports = advertising_reports(&data);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].address_type, AddressType::Random);
        assert_eq!(reports[0].eir(), &[0x01, 0x06]);
        assert_eq!(reports[0].rssi, -80);
        assert_eq!(reports[1].event_type, 0x04);
        assert!(reports[1].eir().is_empty());
        assert_eq!(reports[1].rssi, -90);
    }

    #[test]
    fn test_le_advertising_report_keeps_entries_before_truncation() {
        let mut data = vec![EVT_LE_META_EVENT, 0, EVT_LE_ADVERTISING_REPORT, 2];
        data.extend_from_slice(&[0x00, 0x01, 1, 1, 1, 1, 1, 0xC1, 2, 0x01, 0x06, 0xB0]);
        // Second entry declares 10 bytes of data but the event ends early
        data.extend_from_slice(&[0x00, 0x00, 2, 2, 2, 2, 2, 2, 10, 0x02, 0x01]);
        data[1] = (data.len() - 2) as u8;

        let reports = advertising_reports(&data);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].address, BdAddr::new([1, 1, 1, 1, 1, 0xC1]));
        assert_eq!(reports[0].eir(), &[0x01, 0x06]);
        assert_eq!(reports[0].rssi, -80);

        // A cut-off second entry header is tolerated the same way
        let mut data = vec![EVT_LE_META_EVENT, 0, EVT_LE_ADVERTISING_REPORT, 2];
        data.extend_from_slice(&[0x00, 0x01, 1, 1, 1, 1, 1, 0xC1, 0, 0xB0, 0x00, 0x00]);
        data[1] = (data.len() - 2) as u8;
        assert_eq!(advertising_reports(&data).len(), 1);
    }

    #[test]
    fn test_le_advertising_report_data_length_limits() {
        let mut data = vec![EVT_LE_META_EVENT, 0, EVT_LE_ADVERTISING_REPORT, 1, 0, 0];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 31]);
        data.extend_from_slice(&[0xAB; 31]);
        data.push(0xD8);
        data[1] = (data.len() - 2) as u8;

        let reports = advertising_reports(&data);
        assert_eq!(reports[0].eir().len(), 31);
        assert_eq!(reports[0].rssi, -40);

        // 32 bytes of advertising data is never valid
        let mut data = vec![EVT_LE_META_EVENT, 0, EVT_LE_ADVERTISING_REPORT, 1, 0, 0];
        data.extend_from_slice(&[1, 2, 3, 4, 5, 6, 32]);
        data.extend_from_slice(&[0xAB; 32]);
        data.push(0xD8);
        data[1] = (data.len() - 2) as u8;
        assert!(matches!(HciEvent::parse(&data), Err(HciError::InvalidPacket(_))));

        // Declared length running past the frame
        let data = [
            EVT_LE_META_EVENT,
            12,
            EVT_LE_ADVERTISING_REPORT,
            1,
            0,
            0,
            1,
            2,
            3,
            4,
            5,
            6,
            20,
            0x02,
        ];
        assert!(matches!(HciEvent::parse(&data), Err(HciError::InvalidPacket(_))));
    }

    #[test]
    fn test_remote_connection_parameter_request_parsing() {
        let data = [
            EVT_LE_META_EVENT,
            11,
            EVT_LE_REMOTE_CONN_PARAM_REQUEST,
            0x40, 0x00, // handle
            0x06, 0x00, // min interval
            0x0C, 0x00, // max interval
            0x00, 0x00, // latency
            0xC8, 0x00, // timeout
        ];
        assert_eq!(
            HciEvent::parse(&data).unwrap(),
            HciEvent::LeMeta(LeMetaEvent::RemoteConnectionParameterRequest(
                ConnectionParameters {
                    handle: 0x0040,
                    min_interval: 0x0006,
                    max_interval: 0x000C,
                    latency: 0,
                    supervision_timeout: 0x00C8,
                }
            ))
        );
    }

    #[test]
    fn test_unhandled_codes() {
        assert_eq!(
            HciEvent::parse(&[EVT_LE_META_EVENT, 2, 0x0B, 0x00]).unwrap(),
            HciEvent::LeMeta(LeMetaEvent::Unsupported { subevent: 0x0B })
        );
        assert_eq!(
            HciEvent::parse(&[0x1A, 1, 0x00]).unwrap(),
            HciEvent::Other { code: 0x1A }
        );
    }
}
