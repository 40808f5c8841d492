//! Wire constants shared by all exchange-protocol messages.

/// Size of the `directType` header in bytes.
pub const SIZE_OF_DIRECT_TYPE: usize = 2;

/// Size of the frame length prefix used by the transport codec.
pub const SIZE_OF_FRAME_LENGTH_FIELD: usize = 4;

/// Size of an encoded boolean.
pub const SIZE_OF_BOOL: usize = 1;

/// Size of an encoded byte.
pub const SIZE_OF_BYTE: usize = 1;

/// Size of an encoded 16-bit integer.
pub const SIZE_OF_SHORT: usize = 2;

/// Size of an encoded 32-bit integer.
pub const SIZE_OF_INT: usize = 4;

/// Size of an encoded 64-bit integer.
pub const SIZE_OF_LONG: usize = 8;

/// Size of an encoded UUID (most significant then least significant bits).
pub const SIZE_OF_UUID: usize = 16;

/// Presence byte written before an absent optional value.
pub const ABSENT: u8 = 0;

/// Presence byte written before a present optional value.
pub const PRESENT: u8 = 1;

/// Default upper bound for a single transport frame.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 16 * 1024 * 1024;

/// Field limit meaning "no negotiated limit beyond each message's own field count".
pub const UNLIMITED_FIELDS: u8 = u8::MAX;
