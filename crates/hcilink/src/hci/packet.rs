//! HCI packet framing
//!
//! Every frame on the transport starts with a one-byte packet type. This
//! module classifies the head of the receive buffer into complete frames and
//! parses the ACL data header.

use crate::error::{HciError, Result};
use crate::hci::constants::*;
use byteorder::{ByteOrder, LittleEndian};

/// H4 packet type indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Command,
    AclData,
    SyncData,
    Event,
}

impl TryFrom<u8> for PacketType {
    type Error = HciError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            HCI_COMMAND_PKT => Ok(PacketType::Command),
            HCI_ACL_PKT => Ok(PacketType::AclData),
            HCI_SCO_PKT => Ok(PacketType::SyncData),
            HCI_EVENT_PKT => Ok(PacketType::Event),
            other => Err(HciError::UnknownPacketType(other)),
        }
    }
}

impl From<PacketType> for u8 {
    fn from(value: PacketType) -> Self {
        match value {
            PacketType::Command => HCI_COMMAND_PKT,
            PacketType::AclData => HCI_ACL_PKT,
            PacketType::SyncData => HCI_SCO_PKT,
            PacketType::Event => HCI_EVENT_PKT,
        }
    }
}

/// A complete inbound frame, borrowed from the receive buffer.
///
/// The slices exclude the packet type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Acl(&'a [u8]),
    Sync(&'a [u8]),
    Event(&'a [u8]),
}

/// Looks for a complete frame at the head of `bytes`.
///
/// Returns the frame and its total length including the type byte, or
/// `None` while more bytes are needed. Command frames only ever travel to
/// the controller, so one arriving here is reported as an unknown type.
pub fn next_frame(bytes: &[u8]) -> Result<Option<(Frame<'_>, usize)>> {
    let Some(&indicator) = bytes.first() else {
        return Ok(None);
    };

    let (header_len, payload_len) = match PacketType::try_from(indicator)? {
        PacketType::Command => return Err(HciError::UnknownPacketType(indicator)),
        PacketType::AclData => {
            if bytes.len() < 1 + HCI_ACL_HEADER_SIZE {
                return Ok(None);
            }
            (HCI_ACL_HEADER_SIZE, LittleEndian::read_u16(&bytes[3..5]) as usize)
        }
        PacketType::SyncData => {
            if bytes.len() < 1 + HCI_SCO_HEADER_SIZE {
                return Ok(None);
            }
            (HCI_SCO_HEADER_SIZE, bytes[3] as usize)
        }
        PacketType::Event => {
            if bytes.len() < 1 + HCI_EVENT_HEADER_SIZE {
                return Ok(None);
            }
            (HCI_EVENT_HEADER_SIZE, bytes[2] as usize)
        }
    };

    let total = 1 + header_len + payload_len;
    if bytes.len() < total {
        return Ok(None);
    }

    let body = &bytes[1..total];
    let frame = match indicator {
        HCI_ACL_PKT => Frame::Acl(body),
        HCI_SCO_PKT => Frame::Sync(body),
        _ => Frame::Event(body),
    };
    Ok(Some((frame, total)))
}

/// Total frame length declared by the header at the head of `bytes`, if the
/// header is complete.
pub fn declared_frame_len(bytes: &[u8]) -> Option<usize> {
    match *bytes.first()? {
        HCI_ACL_PKT if bytes.len() >= 5 => {
            Some(1 + HCI_ACL_HEADER_SIZE + LittleEndian::read_u16(&bytes[3..5]) as usize)
        }
        HCI_SCO_PKT if bytes.len() >= 4 => Some(1 + HCI_SCO_HEADER_SIZE + bytes[3] as usize),
        HCI_EVENT_PKT if bytes.len() >= 3 => Some(1 + HCI_EVENT_HEADER_SIZE + bytes[2] as usize),
        _ => None,
    }
}

/// Packet boundary flag of an ACL data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundaryFlag {
    FirstNonFlushable,
    Continuation,
    FirstFlushable,
    Complete,
}

impl From<u16> for BoundaryFlag {
    fn from(flags: u16) -> Self {
        match flags & 0x03 {
            0x00 => BoundaryFlag::FirstNonFlushable,
            0x01 => BoundaryFlag::Continuation,
            0x02 => BoundaryFlag::FirstFlushable,
            _ => BoundaryFlag::Complete,
        }
    }
}

/// ACL data header together with the basic L2CAP header it carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclHeader {
    /// Connection handle with the flag bits masked off
    pub handle: u16,
    /// Upper four bits of the handle field
    pub flags: u16,
    /// Length of everything after the ACL header
    pub data_len: u16,
    /// Length of the L2CAP payload
    pub len: u16,
    /// L2CAP channel identifier
    pub cid: u16,
}

impl AclHeader {
    pub fn boundary(&self) -> BoundaryFlag {
        BoundaryFlag::from(self.flags)
    }

    /// Parses the headers of an ACL frame body (packet type byte excluded).
    ///
    /// Only single-frame L2CAP packets are accepted: the L2CAP length must
    /// equal the ACL length minus the 4-byte L2CAP header.
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.len() < HCI_ACL_HEADER_SIZE {
            return Err(HciError::InvalidPacket("ACL header too short".into()));
        }

        let raw_handle = LittleEndian::read_u16(&body[0..2]);
        let handle = raw_handle & ACL_HANDLE_MASK;
        let flags = raw_handle >> ACL_FLAGS_SHIFT;
        let data_len = LittleEndian::read_u16(&body[2..4]);

        if BoundaryFlag::from(flags) == BoundaryFlag::Continuation
            || (data_len as usize) < L2CAP_HEADER_SIZE
            || body.len() < HCI_ACL_HEADER_SIZE + L2CAP_HEADER_SIZE
        {
            return Err(HciError::FragmentedPacket {
                declared: data_len,
                actual: body.len().saturating_sub(HCI_ACL_HEADER_SIZE) as u16,
            });
        }

        let len = LittleEndian::read_u16(&body[4..6]);
        let cid = LittleEndian::read_u16(&body[6..8]);

        if data_len - L2CAP_HEADER_SIZE as u16 != len {
            return Err(HciError::FragmentedPacket {
                declared: data_len,
                actual: len + L2CAP_HEADER_SIZE as u16,
            });
        }

        Ok(Self {
            handle,
            flags,
            data_len,
            len,
            cid,
        })
    }

    /// The L2CAP payload inside `body`
    pub fn payload<'a>(&self, body: &'a [u8]) -> &'a [u8] {
        let start = HCI_ACL_HEADER_SIZE + L2CAP_HEADER_SIZE;
        &body[start..start + self.len as usize]
    }
}

/// Encodes an outbound ACL frame carrying one L2CAP packet into `out`,
/// returning the frame length.
pub fn encode_acl(out: &mut [u8], handle: u16, cid: u16, data: &[u8]) -> Result<usize> {
    let total = 1 + HCI_ACL_HEADER_SIZE + L2CAP_HEADER_SIZE + data.len();
    if total > out.len() {
        return Err(HciError::InvalidParamLength(data.len()));
    }

    out[0] = HCI_ACL_PKT;
    LittleEndian::write_u16(&mut out[1..3], handle & ACL_HANDLE_MASK);
    LittleEndian::write_u16(&mut out[3..5], (data.len() + L2CAP_HEADER_SIZE) as u16);
    LittleEndian::write_u16(&mut out[5..7], data.len() as u16);
    LittleEndian::write_u16(&mut out[7..9], cid);
    out[9..total].copy_from_slice(data);
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_type_from_indicator() {
        assert_eq!(PacketType::try_from(0x02).unwrap(), PacketType::AclData);
        assert_eq!(PacketType::try_from(0x04).unwrap(), PacketType::Event);
        assert!(matches!(
            PacketType::try_from(0x07),
            Err(HciError::UnknownPacketType(0x07))
        ));
        assert_eq!(u8::from(PacketType::Command), 0x01);
    }

    #[test]
    fn test_event_frame_needs_declared_length() {
        let bytes = [0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C];
        assert_eq!(next_frame(&bytes).unwrap(), None);
        assert_eq!(declared_frame_len(&bytes), Some(7));

        let bytes = [0x04, 0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00, 0x04];
        let (frame, len) = next_frame(&bytes).unwrap().unwrap();
        assert_eq!(len, 7);
        assert_eq!(frame, Frame::Event(&[0x0E, 0x04, 0x01, 0x03, 0x0C, 0x00]));
    }

    #[test]
    fn test_sync_frame_is_sized_for_skipping() {
        let bytes = [0x03, 0x01, 0x00, 0x02, 0xAA, 0xBB];
        let (frame, len) = next_frame(&bytes).unwrap().unwrap();
        assert_eq!(len, 6);
        assert!(matches!(frame, Frame::Sync(_)));
    }

    #[test]
    fn test_inbound_command_frame_is_rejected() {
        let bytes = [0x01, 0x03, 0x0C, 0x00];
        assert!(matches!(
            next_frame(&bytes),
            Err(HciError::UnknownPacketType(0x01))
        ));
    }

    #[test]
    fn test_acl_header_parse() {
        // handle 0x0040 with first-flushable flag, 7 bytes of ATT on CID 4
        let body = [
            0x40, 0x20, 0x07, 0x00, 0x03, 0x00, 0x04, 0x00, 0x0A, 0x01, 0x00,
        ];
        let header = AclHeader::parse(&body).unwrap();
        assert_eq!(header.handle, 0x0040);
        assert_eq!(header.boundary(), BoundaryFlag::FirstFlushable);
        assert_eq!(header.cid, ATT_CID);
        assert_eq!(header.payload(&body), &[0x0A, 0x01, 0x00]);
    }

    #[test]
    fn test_acl_length_mismatch_is_fragmented() {
        let body = [0x40, 0x20, 0x07, 0x00, 0x02, 0x00, 0x04, 0x00, 0x0A, 0x01, 0x00];
        assert!(matches!(
            AclHeader::parse(&body),
            Err(HciError::FragmentedPacket { declared: 7, actual: 6 })
        ));
    }

    #[test]
    fn test_acl_continuation_is_fragmented() {
        let body = [0x40, 0x10, 0x02, 0x00, 0xAA, 0xBB];
        assert!(matches!(
            AclHeader::parse(&body),
            Err(HciError::FragmentedPacket { .. })
        ));
    }

    #[test]
    fn test_encode_acl() {
        let mut out = [0u8; 32];
        let len = encode_acl(&mut out, 0x0041, ATT_CID, &[0x1B, 0x03, 0x00]).unwrap();
        assert_eq!(
            &out[..len],
            &[0x02, 0x41, 0x00, 0x07, 0x00, 0x03, 0x00, 0x04, 0x00, 0x1B, 0x03, 0x00]
        );

        let mut small = [0u8; 10];
        assert!(encode_acl(&mut small, 0x0041, ATT_CID, &[0; 4]).is_err());
    }
}
