//! Resumable message decoding.

use bytes::{Buf, BytesMut};

use super::constants::UNLIMITED_FIELDS;
use super::field::{Decoded, WireField};
use super::message::{DirectMessage, Progress};
use crate::error::{ExchangeError, Result};

/// Decoding cursor for one in-flight message.
///
/// The reader pulls exactly the bytes the current field still needs into a
/// scratch buffer, so input may arrive split at any byte offset across calls.
/// A field is assigned to the message only once all of its bytes are in, and
/// the cursor then moves to the next index; no field is read twice.
///
/// After a message completes, call [`reset`](Self::reset) before reading the
/// next one.
#[derive(Debug)]
pub struct MessageReader {
    state: u8,
    direct_type: Option<i16>,
    scratch: BytesMut,
    field_limit: u8,
}

impl MessageReader {
    /// Creates a reader without a negotiated field limit.
    pub fn new() -> Self {
        Self::with_field_limit(UNLIMITED_FIELDS)
    }

    /// Creates a reader that never consumes fields with index `>= limit`.
    pub fn with_field_limit(limit: u8) -> Self {
        Self {
            state: 0,
            direct_type: None,
            scratch: BytesMut::with_capacity(64),
            field_limit: limit,
        }
    }

    /// Returns the index of the next field to read.
    pub fn state(&self) -> u8 {
        self.state
    }

    /// Returns the negotiated field limit.
    pub fn field_limit(&self) -> u8 {
        self.field_limit
    }

    /// Returns `true` if the field at `index` is within the negotiated limit.
    pub fn reads_field(&self, index: u8) -> bool {
        index < self.field_limit
    }

    /// Returns the `directType` header once it has been read.
    pub fn direct_type(&self) -> Option<i16> {
        self.direct_type
    }

    /// Reads the `directType` header, used to pick the concrete message
    /// before any field is consumed.
    ///
    /// Returns `Ok(None)` if the two header bytes are not all available yet.
    pub fn read_header(&mut self, buf: &mut dyn Buf) -> Result<Option<i16>> {
        if self.direct_type.is_some() {
            return Ok(self.direct_type);
        }

        let header = self.pull::<i16>(buf)?;
        self.direct_type = header;
        Ok(header)
    }

    /// Reads as much of `msg` as the available input allows.
    ///
    /// Fails with a decode fault if the header names a different message type.
    pub fn read(&mut self, msg: &mut dyn DirectMessage, buf: &mut dyn Buf) -> Result<Progress> {
        let expected = msg.direct_type();
        match self.read_header(buf)? {
            None => return Ok(Progress::Incomplete),
            Some(actual) if actual != expected => {
                return Err(ExchangeError::Decode {
                    direct_type: actual,
                    field: self.state,
                    reason: format!("header does not match message type {}", expected),
                });
            }
            Some(_) => {}
        }

        let complete = msg.read_fields(self, buf)?;
        if complete {
            tracing::trace!(
                direct_type = expected,
                fields = self.state,
                limit = self.field_limit,
                "message decoded"
            );
        }
        Ok(Progress::from(complete))
    }

    /// Reads the field at the current index into `slot` and advances the cursor.
    ///
    /// Returns `Ok(false)` if the input ran out first; the bytes consumed so
    /// far are kept for the next call. Fields at or past the field limit are
    /// skipped and `slot` keeps its current value.
    pub fn read_field<T: WireField>(&mut self, buf: &mut dyn Buf, slot: &mut T) -> Result<bool> {
        if self.state >= self.field_limit {
            self.state += 1;
            return Ok(true);
        }

        match self.pull::<T>(buf) {
            Ok(Some(value)) => {
                *slot = value;
                self.state += 1;
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(ExchangeError::Serialization(reason)) => Err(self.fault(self.state, reason)),
            Err(e) => Err(e),
        }
    }

    /// Builds a decode fault for `field` of the message being read.
    pub fn fault(&self, field: u8, reason: impl Into<String>) -> ExchangeError {
        ExchangeError::Decode {
            direct_type: self.direct_type.unwrap_or_default(),
            field,
            reason: reason.into(),
        }
    }

    /// Prepares the reader for the next message.
    pub fn reset(&mut self) {
        self.state = 0;
        self.direct_type = None;
        self.scratch.clear();
    }

    fn pull<T: WireField>(&mut self, buf: &mut dyn Buf) -> Result<Option<T>> {
        loop {
            match T::decode(&self.scratch)? {
                Decoded::Done(value) => {
                    self.scratch.clear();
                    return Ok(Some(value));
                }
                Decoded::Needs(needed) => {
                    if !buf.has_remaining() {
                        return Ok(None);
                    }
                    let mut take = needed.min(buf.remaining());
                    while take > 0 {
                        let chunk = buf.chunk();
                        let n = chunk.len().min(take);
                        self.scratch.extend_from_slice(&chunk[..n]);
                        buf.advance(n);
                        take -= n;
                    }
                }
            }
        }
    }
}

impl Default for MessageReader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{encode_whole, Probe, PROBE_DIRECT_TYPE};
    use proptest::prelude::*;

    fn decode_whole(bytes: &[u8]) -> Probe {
        let mut reader = MessageReader::new();
        let mut probe = Probe::default();
        let mut input = bytes;
        assert!(reader.read(&mut probe, &mut input).unwrap().is_complete());
        probe
    }

    #[test]
    fn test_roundtrip() {
        let probe = Probe::sample();
        assert_eq!(decode_whole(&encode_whole(&probe)), probe);
    }

    #[test]
    fn test_read_header_incomplete() {
        let mut reader = MessageReader::new();
        let mut input: &[u8] = &[0xFF];
        assert_eq!(reader.read_header(&mut input).unwrap(), None);
        assert!(input.is_empty());

        let mut rest: &[u8] = &[0x9C];
        assert_eq!(
            reader.read_header(&mut rest).unwrap(),
            Some(PROBE_DIRECT_TYPE)
        );
        assert_eq!(reader.direct_type(), Some(PROBE_DIRECT_TYPE));
    }

    #[test]
    fn test_read_header_is_idempotent() {
        let bytes = encode_whole(&Probe::sample());
        let mut reader = MessageReader::new();
        let mut input = &bytes[..];
        reader.read_header(&mut input).unwrap();
        let remaining = input.len();
        assert_eq!(
            reader.read_header(&mut input).unwrap(),
            Some(PROBE_DIRECT_TYPE)
        );
        assert_eq!(input.len(), remaining);
    }

    #[test]
    fn test_split_at_every_offset() {
        let probe = Probe::sample();
        let bytes = encode_whole(&probe);

        for split in 0..=bytes.len() {
            let mut reader = MessageReader::new();
            let mut decoded = Probe::default();

            let mut prefix = &bytes[..split];
            let first = reader.read(&mut decoded, &mut prefix).unwrap();
            assert!(prefix.is_empty());
            if split < bytes.len() {
                assert_eq!(first, Progress::Incomplete, "split at {}", split);
            }

            let mut suffix = &bytes[split..];
            let second = reader.read(&mut decoded, &mut suffix).unwrap();
            assert_eq!(second, Progress::Complete, "split at {}", split);
            assert_eq!(decoded, probe, "split at {}", split);
        }
    }

    #[test]
    fn test_does_not_consume_past_message() {
        let probe = Probe::sample();
        let mut bytes = encode_whole(&probe);
        let len = bytes.len();
        bytes.extend_from_slice(&[0xDE, 0xAD]);

        let mut reader = MessageReader::new();
        let mut decoded = Probe::default();
        let mut input = &bytes[..];
        assert!(reader.read(&mut decoded, &mut input).unwrap().is_complete());
        assert_eq!(input, &[0xDE, 0xAD]);
        assert_eq!(bytes.len() - input.len(), len);
    }

    #[test]
    fn test_type_mismatch_is_fault() {
        let mut bytes = encode_whole(&Probe::sample());
        bytes[0] = 0;
        bytes[1] = 48;

        let mut reader = MessageReader::new();
        let mut decoded = Probe::default();
        let mut input = &bytes[..];
        let err = reader.read(&mut decoded, &mut input).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Decode {
                direct_type: 48,
                field: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_field_reports_index() {
        let mut bytes = encode_whole(&Probe::sample());
        // presence byte of field 1 follows header (2) and field 0 (8)
        bytes[10] = 5;

        let mut reader = MessageReader::new();
        let mut decoded = Probe::default();
        let mut input = &bytes[..];
        let err = reader.read(&mut decoded, &mut input).unwrap_err();
        match err {
            ExchangeError::Decode {
                direct_type,
                field,
                reason,
            } => {
                assert_eq!(direct_type, PROBE_DIRECT_TYPE);
                assert_eq!(field, 1);
                assert!(reason.contains("presence"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_limit_leaves_defaults() {
        let probe = Probe::sample();
        let bytes = encode_whole(&probe);

        let mut reader = MessageReader::with_field_limit(2);
        let mut decoded = Probe::default();
        let mut input = &bytes[..];
        assert!(reader.read(&mut decoded, &mut input).unwrap().is_complete());

        assert_eq!(decoded.seq, probe.seq);
        assert_eq!(decoded.origin, probe.origin);
        assert!(!decoded.urgent);
        assert_eq!(decoded.weight, 0);
        assert!(!reader.reads_field(2));
        // bytes for fields 2 and 3 are left for the framing layer
        assert_eq!(input.len(), 5);
    }

    #[test]
    fn test_reset_between_messages() {
        let first = Probe::sample();
        let second = Probe {
            seq: 1,
            origin: None,
            urgent: false,
            weight: 2,
        };
        let mut bytes = encode_whole(&first);
        bytes.extend(encode_whole(&second));

        let mut reader = MessageReader::new();
        let mut input = &bytes[..];

        let mut a = Probe::default();
        assert!(reader.read(&mut a, &mut input).unwrap().is_complete());
        reader.reset();
        let mut b = Probe::default();
        assert!(reader.read(&mut b, &mut input).unwrap().is_complete());

        assert_eq!(a, first);
        assert_eq!(b, second);
        assert!(input.is_empty());
    }

    proptest! {
        #[test]
        fn prop_arbitrary_chunking_decodes_identically(
            seq in any::<i64>(),
            origin in proptest::option::of(any::<u128>()),
            urgent in any::<bool>(),
            weight in any::<i32>(),
            chunks in proptest::collection::vec(1usize..7, 1..40),
        ) {
            let probe = Probe {
                seq,
                origin: origin.map(uuid::Uuid::from_u128),
                urgent,
                weight,
            };
            let bytes = encode_whole(&probe);

            let mut reader = MessageReader::new();
            let mut decoded = Probe::default();
            let mut offset = 0;
            let mut progress = Progress::Incomplete;
            for size in chunks.iter().cycle() {
                let end = (offset + size).min(bytes.len());
                let mut chunk = &bytes[offset..end];
                progress = reader.read(&mut decoded, &mut chunk).unwrap();
                offset = end;
                if offset == bytes.len() {
                    break;
                }
            }

            prop_assert_eq!(progress, Progress::Complete);
            prop_assert_eq!(decoded, probe);
        }
    }
}
