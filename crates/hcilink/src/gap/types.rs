use crate::gap::constants::*;
use rand::Rng;
use std::fmt;

/// Role of the local device in a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Central,
    Peripheral,
}

impl TryFrom<u8> for Role {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            ROLE_CENTRAL => Ok(Role::Central),
            ROLE_PERIPHERAL => Ok(Role::Peripheral),
            other => Err(other),
        }
    }
}

impl From<Role> for u8 {
    fn from(value: Role) -> Self {
        match value {
            Role::Central => ROLE_CENTRAL,
            Role::Peripheral => ROLE_PERIPHERAL,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressType {
    #[default]
    Public,
    Random,
    PublicIdentity,
    RandomIdentity,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            PUBLIC_DEVICE_ADDRESS => AddressType::Public,
            RANDOM_DEVICE_ADDRESS => AddressType::Random,
            PUBLIC_IDENTITY_ADDRESS => AddressType::PublicIdentity,
            RANDOM_IDENTITY_ADDRESS => AddressType::RandomIdentity,
            _ => AddressType::Public,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::Public => PUBLIC_DEVICE_ADDRESS,
            AddressType::Random => RANDOM_DEVICE_ADDRESS,
            AddressType::PublicIdentity => PUBLIC_IDENTITY_ADDRESS,
            AddressType::RandomIdentity => RANDOM_IDENTITY_ADDRESS,
        }
    }
}

/// Bluetooth device address, stored little-endian as on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BdAddr {
    pub bytes: [u8; 6],
}

impl BdAddr {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut bytes = [0u8; 6];
            bytes.copy_from_slice(&slice[0..6]);
            Some(Self { bytes })
        } else {
            None
        }
    }

    /// Generates a static random device address.
    ///
    /// The two most significant bits are set and the random part is never
    /// all zeros or all ones.
    pub fn random_static() -> Self {
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes: [u8; 6] = rng.gen();
            bytes[5] |= STATIC_RANDOM_ADDRESS_MARKER;

            let all_zero = bytes[..5].iter().all(|&b| b == 0x00) && bytes[5] & 0x3F == 0x00;
            let all_ones = bytes[..5].iter().all(|&b| b == 0xFF) && bytes[5] & 0x3F == 0x3F;
            if !all_zero && !all_ones {
                return Self { bytes };
            }
        }
    }

    pub fn is_static_random(&self) -> bool {
        self.bytes[5] & STATIC_RANDOM_ADDRESS_MARKER == STATIC_RANDOM_ADDRESS_MARKER
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.bytes[5],
            self.bytes[4],
            self.bytes[3],
            self.bytes[2],
            self.bytes[1],
            self.bytes[0]
        )
    }
}
