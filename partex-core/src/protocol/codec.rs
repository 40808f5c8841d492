//! Length-prefixed transport codec for direct messages.

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::constants::*;
use super::message::{DirectMessage, MessageRegistry, Progress};
use super::reader::MessageReader;
use super::writer::MessageWriter;
use crate::error::{ExchangeError, Result};

/// Codec framing each message as `[length: u32][directType][fields]`.
///
/// Implements the `tokio_util::codec::{Encoder, Decoder}` traits for use with
/// framed I/O. Decoding dispatches on `directType` through a
/// [`MessageRegistry`]. Bytes left in a frame after the receiver's last known
/// field belong to fields added by a newer sender and are skipped.
#[derive(Debug)]
pub struct DirectMessageCodec {
    registry: Arc<MessageRegistry>,
    field_limit: u8,
    max_frame_length: usize,
}

impl DirectMessageCodec {
    /// Creates a codec dispatching through `registry`.
    pub fn new(registry: Arc<MessageRegistry>) -> Self {
        Self {
            registry,
            field_limit: UNLIMITED_FIELDS,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }

    /// Sets the negotiated field limit applied to both directions.
    pub fn with_field_limit(mut self, limit: u8) -> Self {
        self.field_limit = limit;
        self
    }

    /// Sets the largest accepted frame, excluding the length prefix.
    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    /// Returns the negotiated field limit.
    pub fn field_limit(&self) -> u8 {
        self.field_limit
    }

    /// Returns the largest accepted frame.
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    fn encode_message(&self, msg: &dyn DirectMessage, dst: &mut BytesMut) -> Result<()> {
        let mut writer = MessageWriter::with_field_limit(self.field_limit);
        let mut body = BytesMut::new();
        if writer.write(msg, &mut body) != Progress::Complete {
            return Err(ExchangeError::Protocol(format!(
                "message type {} did not fit an unbounded buffer",
                msg.direct_type()
            )));
        }

        if body.len() > self.max_frame_length {
            return Err(ExchangeError::Protocol(format!(
                "frame of {} bytes exceeds limit of {}",
                body.len(),
                self.max_frame_length
            )));
        }

        let length = u32::try_from(body.len()).map_err(|_| {
            ExchangeError::Protocol(format!(
                "frame of {} bytes does not fit the length prefix",
                body.len()
            ))
        })?;
        dst.reserve(SIZE_OF_FRAME_LENGTH_FIELD + body.len());
        dst.put_u32(length);
        dst.put_slice(&body);
        Ok(())
    }
}

impl Encoder<Box<dyn DirectMessage>> for DirectMessageCodec {
    type Error = ExchangeError;

    fn encode(&mut self, item: Box<dyn DirectMessage>, dst: &mut BytesMut) -> Result<()> {
        self.encode_message(item.as_ref(), dst)
    }
}

impl<'a> Encoder<&'a dyn DirectMessage> for DirectMessageCodec {
    type Error = ExchangeError;

    fn encode(&mut self, item: &'a dyn DirectMessage, dst: &mut BytesMut) -> Result<()> {
        self.encode_message(item, dst)
    }
}

impl Decoder for DirectMessageCodec {
    type Item = Box<dyn DirectMessage>;
    type Error = ExchangeError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if src.len() < SIZE_OF_FRAME_LENGTH_FIELD {
            return Ok(None);
        }

        let frame_length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
        if frame_length > self.max_frame_length {
            return Err(ExchangeError::Protocol(format!(
                "frame of {} bytes exceeds limit of {}",
                frame_length, self.max_frame_length
            )));
        }

        let total_frame_size = SIZE_OF_FRAME_LENGTH_FIELD + frame_length;
        if src.len() < total_frame_size {
            src.reserve(total_frame_size - src.len());
            return Ok(None);
        }

        src.advance(SIZE_OF_FRAME_LENGTH_FIELD);
        let mut frame = src.split_to(frame_length).freeze();

        let mut reader = MessageReader::with_field_limit(self.field_limit);
        let direct_type = reader.read_header(&mut frame)?.ok_or_else(|| {
            ExchangeError::Protocol(format!(
                "frame of {} bytes is too short for a message header",
                frame_length
            ))
        })?;

        let mut msg = self
            .registry
            .create(direct_type)
            .ok_or(ExchangeError::UnknownMessageType(direct_type))?;

        match reader.read(msg.as_mut(), &mut frame) {
            Ok(Progress::Complete) => {}
            Ok(Progress::Incomplete) => {
                let err = reader.fault(reader.state(), "frame ended before the field was complete");
                tracing::warn!(error = %err, "truncated exchange message");
                return Err(err);
            }
            Err(e) => {
                tracing::warn!(error = %e, "malformed exchange message");
                return Err(e);
            }
        }

        if frame.has_remaining() {
            tracing::trace!(
                direct_type,
                skipped = frame.remaining(),
                "skipping trailing fields unknown to this node"
            );
        }

        Ok(Some(msg))
    }
}
