//! Resumable message encoding.

use bytes::{BufMut, BytesMut};

use super::constants::UNLIMITED_FIELDS;
use super::field::WireField;
use super::message::{DirectMessage, Progress};

/// Encoding cursor for one in-flight message.
///
/// The writer records how far encoding got: whether the `directType` header
/// is out, which field index is next, and how many bytes of a partially
/// written field already reached the buffer. Re-invoking [`write`](Self::write)
/// with the same message and a fresh buffer continues from that exact byte;
/// nothing is emitted twice and no field is skipped.
///
/// A writer is tied to one message until it completes; call
/// [`reset`](Self::reset) before starting the next one.
#[derive(Debug)]
pub struct MessageWriter {
    state: u8,
    header_written: bool,
    staged: BytesMut,
    flushed: usize,
    staging: bool,
    field_limit: u8,
}

impl MessageWriter {
    /// Creates a writer without a negotiated field limit.
    pub fn new() -> Self {
        Self::with_field_limit(UNLIMITED_FIELDS)
    }

    /// Creates a writer that leaves out every field with index `>= limit`.
    ///
    /// Used when the peer speaks an older protocol version that declares
    /// fewer trailing fields.
    pub fn with_field_limit(limit: u8) -> Self {
        Self {
            state: 0,
            header_written: false,
            staged: BytesMut::with_capacity(64),
            flushed: 0,
            staging: false,
            field_limit: limit,
        }
    }

    /// Returns the index of the next field to write.
    pub fn state(&self) -> u8 {
        self.state
    }

    /// Returns the negotiated field limit.
    pub fn field_limit(&self) -> u8 {
        self.field_limit
    }

    /// Returns `true` once the `directType` header has been fully written.
    pub fn is_header_written(&self) -> bool {
        self.header_written
    }

    /// Writes as much of `msg` as fits into `buf`.
    pub fn write(&mut self, msg: &dyn DirectMessage, buf: &mut dyn BufMut) -> Progress {
        if !self.header_written && !self.write_header(msg.direct_type(), buf) {
            return Progress::Incomplete;
        }

        let complete = msg.write_fields(self, buf);
        if complete {
            tracing::trace!(
                direct_type = msg.direct_type(),
                fields = self.state,
                limit = self.field_limit,
                "message encoded"
            );
        }
        Progress::from(complete)
    }

    /// Writes the field at the current index and advances the cursor.
    ///
    /// Returns `false` if the buffer filled up; the bytes that did fit are
    /// remembered and the next call continues after them. Fields at or past
    /// the field limit are skipped without writing anything.
    pub fn write_field<T: WireField>(&mut self, buf: &mut dyn BufMut, value: &T) -> bool {
        if self.state >= self.field_limit {
            self.state += 1;
            return true;
        }

        if !self.staging {
            value.encode(&mut self.staged);
            self.staging = true;
        }

        if !self.flush(buf) {
            return false;
        }

        self.state += 1;
        true
    }

    /// Prepares the writer for the next message.
    pub fn reset(&mut self) {
        self.state = 0;
        self.header_written = false;
        self.staged.clear();
        self.flushed = 0;
        self.staging = false;
    }

    fn write_header(&mut self, direct_type: i16, buf: &mut dyn BufMut) -> bool {
        if !self.staging {
            direct_type.encode(&mut self.staged);
            self.staging = true;
        }

        if !self.flush(buf) {
            return false;
        }

        self.header_written = true;
        true
    }

    fn flush(&mut self, buf: &mut dyn BufMut) -> bool {
        let pending = &self.staged[self.flushed..];
        let n = pending.len().min(buf.remaining_mut());
        buf.put_slice(&pending[..n]);
        self.flushed += n;

        if self.flushed < self.staged.len() {
            return false;
        }

        self.staged.clear();
        self.flushed = 0;
        self.staging = false;
        true
    }
}

impl Default for MessageWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::testing::{encode_whole, Probe, PROBE_DIRECT_TYPE};

    fn bounded(out: &mut Vec<u8>, limit: usize) -> bytes::buf::Limit<&mut Vec<u8>> {
        out.limit(limit)
    }

    #[test]
    fn test_new_writer_state() {
        let writer = MessageWriter::new();
        assert_eq!(writer.state(), 0);
        assert!(!writer.is_header_written());
        assert_eq!(writer.field_limit(), UNLIMITED_FIELDS);
    }

    #[test]
    fn test_write_complete_in_one_call() {
        let probe = Probe::sample();
        let mut writer = MessageWriter::new();
        let mut out = Vec::new();

        assert_eq!(writer.write(&probe, &mut out), Progress::Complete);
        assert!(writer.is_header_written());
        assert_eq!(writer.state(), 4);
        assert_eq!(&out[..2], &PROBE_DIRECT_TYPE.to_be_bytes());
    }

    #[test]
    fn test_write_one_byte_at_a_time() {
        let probe = Probe::sample();
        let expected = encode_whole(&probe);

        let mut writer = MessageWriter::new();
        let mut out = Vec::new();
        let mut calls = 0;
        loop {
            calls += 1;
            if writer.write(&probe, &mut bounded(&mut out, 1)).is_complete() {
                break;
            }
        }

        assert_eq!(out, expected);
        assert!(calls >= expected.len());
    }

    #[test]
    fn test_write_resumes_mid_field() {
        let probe = Probe::sample();
        let expected = encode_whole(&probe);

        let mut writer = MessageWriter::new();
        let mut out = Vec::new();
        // header plus three bytes of the first field
        assert_eq!(
            writer.write(&probe, &mut bounded(&mut out, 5)),
            Progress::Incomplete
        );
        assert_eq!(out.len(), 5);
        assert!(writer.is_header_written());
        assert_eq!(writer.state(), 0);

        assert_eq!(writer.write(&probe, &mut out), Progress::Complete);
        assert_eq!(out, expected);
    }

    #[test]
    fn test_write_into_full_buffer_makes_no_progress() {
        let probe = Probe::sample();
        let mut writer = MessageWriter::new();
        let mut out = Vec::new();

        assert_eq!(
            writer.write(&probe, &mut bounded(&mut out, 0)),
            Progress::Incomplete
        );
        assert!(out.is_empty());
        assert!(!writer.is_header_written());
    }

    #[test]
    fn test_field_limit_skips_trailing_fields() {
        let probe = Probe::sample();
        let full = encode_whole(&probe);

        let mut writer = MessageWriter::with_field_limit(2);
        let mut out = Vec::new();
        assert!(writer.write(&probe, &mut out).is_complete());

        assert_eq!(writer.state(), 4);
        assert!(out.len() < full.len());
        assert_eq!(&out[..], &full[..out.len()]);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let probe = Probe::sample();
        let mut writer = MessageWriter::new();

        let mut first = Vec::new();
        let _ = writer.write(&probe, &mut bounded(&mut first, 7));
        writer.reset();
        assert_eq!(writer.state(), 0);

        let mut second = Vec::new();
        assert!(writer.write(&probe, &mut second).is_complete());
        assert_eq!(second, encode_whole(&probe));
    }
}
