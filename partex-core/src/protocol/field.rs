//! Single-field wire encoding.
//!
//! A [`WireField`] knows how to append its encoding to a buffer and how to
//! recognise itself incrementally: given the bytes received so far for the
//! field, it either produces the value or reports exactly how many more bytes
//! it needs. The message cursors build resumability on top of that.
//!
//! All multi-byte values are big-endian.

use bytes::{Buf, BufMut, BytesMut};
use uuid::Uuid;

use super::constants::*;
use crate::error::{ExchangeError, Result};

/// Outcome of an incremental decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded<T> {
    /// The value was decoded from exactly the bytes supplied.
    Done(T),
    /// At least this many additional bytes are required.
    Needs(usize),
}

impl<T> Decoded<T> {
    /// Maps the decoded value, keeping a pending byte count as is.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        match self {
            Self::Done(v) => Decoded::Done(f(v)),
            Self::Needs(n) => Decoded::Needs(n),
        }
    }
}

/// A value that can be written to and read from the exchange wire format.
pub trait WireField: Sized {
    /// Appends the complete encoding of this value to `dst`.
    fn encode(&self, dst: &mut BytesMut);

    /// Attempts to decode a value from `src`, which holds every byte received
    /// for this field so far and nothing beyond it.
    ///
    /// Returns [`Decoded::Needs`] with the exact minimum number of missing
    /// bytes when `src` is a strict prefix of an encoding. A returned
    /// [`Decoded::Done`] always accounts for all of `src`.
    fn decode(src: &[u8]) -> Result<Decoded<Self>>;
}

/// Decodes a fixed-size value once `size` bytes are available.
pub fn decode_fixed<T>(
    src: &[u8],
    size: usize,
    parse: impl FnOnce(&mut &[u8]) -> Result<T>,
) -> Result<Decoded<T>> {
    if src.len() < size {
        return Ok(Decoded::Needs(size - src.len()));
    }
    let mut bytes = &src[..size];
    parse(&mut bytes).map(Decoded::Done)
}

impl WireField for bool {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(u8::from(*self));
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_BOOL, |b| match b.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ExchangeError::Serialization(format!(
                "invalid boolean byte: {}",
                other
            ))),
        })
    }
}

impl WireField for u8 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_u8(*self);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_BYTE, |b| Ok(b.get_u8()))
    }
}

impl WireField for i16 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i16(*self);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_SHORT, |b| Ok(b.get_i16()))
    }
}

impl WireField for i32 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i32(*self);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_INT, |b| Ok(b.get_i32()))
    }
}

impl WireField for i64 {
    fn encode(&self, dst: &mut BytesMut) {
        dst.put_i64(*self);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_LONG, |b| Ok(b.get_i64()))
    }
}

impl WireField for Uuid {
    fn encode(&self, dst: &mut BytesMut) {
        let (msb, lsb) = self.as_u64_pair();
        dst.put_u64(msb);
        dst.put_u64(lsb);
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        decode_fixed(src, SIZE_OF_UUID, |b| {
            let msb = b.get_u64();
            let lsb = b.get_u64();
            Ok(Uuid::from_u64_pair(msb, lsb))
        })
    }
}

impl<T: WireField> WireField for Option<T> {
    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Some(value) => {
                dst.put_u8(PRESENT);
                value.encode(dst);
            }
            None => dst.put_u8(ABSENT),
        }
    }

    fn decode(src: &[u8]) -> Result<Decoded<Self>> {
        match src.first() {
            None => Ok(Decoded::Needs(1)),
            Some(&ABSENT) => Ok(Decoded::Done(None)),
            Some(&PRESENT) => Ok(T::decode(&src[1..])?.map(Some)),
            Some(other) => Err(ExchangeError::Serialization(format!(
                "invalid presence byte: {}",
                other
            ))),
        }
    }
}
