// Address types
pub const PUBLIC_DEVICE_ADDRESS: u8 = 0x00;
pub const RANDOM_DEVICE_ADDRESS: u8 = 0x01;
pub const PUBLIC_IDENTITY_ADDRESS: u8 = 0x02;
pub const RANDOM_IDENTITY_ADDRESS: u8 = 0x03;

// Connection roles
pub const ROLE_CENTRAL: u8 = 0x00;
pub const ROLE_PERIPHERAL: u8 = 0x01;

// Static random addresses carry 0b11 in the two most significant bits
pub const STATIC_RANDOM_ADDRESS_MARKER: u8 = 0xC0;

// Advertising Data Types
pub const ADV_TYPE_FLAGS: u8 = 0x01;
pub const ADV_TYPE_SHORT_LOCAL_NAME: u8 = 0x08;
pub const ADV_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;
pub const ADV_TYPE_MANUFACTURER_SPECIFIC: u8 = 0xFF;
