//! Exchange-protocol messages.
//!
//! Every exchange message starts with the same base fields, held by
//! [`ExchangeHeader`] and encoded before anything type specific, so a
//! receiver can route a message by its exchange id even if decoding of the
//! remaining fields stalls.

mod single_request;

use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut};
use partex_core::error::Result;
use partex_core::protocol::{DirectMessage, MessageReader, MessageRegistry, MessageWriter};

use crate::topology::{CacheId, CacheVersion, ExchangeId, TopologyVersion};

pub use single_request::SinglePartitionRequest;

/// Field index of the exchange id.
pub const EXCHANGE_ID_FIELD: u8 = 0;
/// Field index of the flags byte.
pub const FLAGS_FIELD: u8 = 1;
/// Field index of the last cache version.
pub const LAST_VERSION_FIELD: u8 = 2;
/// Field index of the last affinity change topology version.
pub const LAST_AFFINITY_CHANGE_FIELD: u8 = 3;
/// Field index of the message id.
pub const MESSAGE_ID_FIELD: u8 = 4;
/// Number of base fields shared by all exchange messages.
pub const BASE_FIELDS_COUNT: u8 = 5;

/// Flag bit: the message payload is compressed.
pub const COMPRESSED_FLAG: u8 = 0x01;
/// Flag bit: the message is a restore probe.
pub const RESTORE_STATE_FLAG: u8 = 0x02;

/// Per-partition `(initial, current)` update counters of one cache.
pub type PartitionUpdateCounters = HashMap<i32, (i64, i64)>;

/// Base fields shared by every exchange message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeHeader {
    exchange_id: ExchangeId,
    flags: u8,
    last_version: Option<CacheVersion>,
    last_affinity_change: Option<TopologyVersion>,
    message_id: i64,
}

impl ExchangeHeader {
    /// Creates a header for a message of the given round.
    pub fn new(exchange_id: ExchangeId) -> Self {
        Self {
            exchange_id,
            ..Self::default()
        }
    }

    /// Returns the round this message belongs to.
    pub fn exchange_id(&self) -> &ExchangeId {
        &self.exchange_id
    }

    /// Returns the raw flags byte.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns `true` if the message is a restore probe.
    pub fn restore_state(&self) -> bool {
        self.flags & RESTORE_STATE_FLAG != 0
    }

    pub(crate) fn set_restore_state(&mut self, restore: bool) {
        self.set_flag(RESTORE_STATE_FLAG, restore);
    }

    /// Returns `true` if the payload is compressed.
    pub fn compressed(&self) -> bool {
        self.flags & COMPRESSED_FLAG != 0
    }

    /// Marks the payload as compressed.
    pub fn set_compressed(&mut self, compressed: bool) {
        self.set_flag(COMPRESSED_FLAG, compressed);
    }

    /// Returns the last cache version the sender used.
    pub fn last_version(&self) -> Option<&CacheVersion> {
        self.last_version.as_ref()
    }

    /// Sets the last cache version the sender used.
    pub fn set_last_version(&mut self, version: Option<CacheVersion>) {
        self.last_version = version;
    }

    /// Returns the topology version at which affinity last changed.
    pub fn last_affinity_change_version(&self) -> Option<TopologyVersion> {
        self.last_affinity_change
    }

    /// Sets the topology version at which affinity last changed.
    pub fn set_last_affinity_change_version(&mut self, version: Option<TopologyVersion>) {
        self.last_affinity_change = version;
    }

    /// Returns the sender-local message id.
    pub fn message_id(&self) -> i64 {
        self.message_id
    }

    /// Sets the sender-local message id.
    pub fn set_message_id(&mut self, message_id: i64) {
        self.message_id = message_id;
    }

    fn set_flag(&mut self, mask: u8, on: bool) {
        if on {
            self.flags |= mask;
        } else {
            self.flags &= !mask;
        }
    }

    /// Writes the base fields the writer has not yet completed.
    pub fn write_fields(&self, writer: &mut MessageWriter, buf: &mut dyn BufMut) -> bool {
        if writer.state() == EXCHANGE_ID_FIELD && !writer.write_field(buf, &self.exchange_id) {
            return false;
        }
        if writer.state() == FLAGS_FIELD && !writer.write_field(buf, &self.flags) {
            return false;
        }
        if writer.state() == LAST_VERSION_FIELD && !writer.write_field(buf, &self.last_version) {
            return false;
        }
        if writer.state() == LAST_AFFINITY_CHANGE_FIELD
            && !writer.write_field(buf, &self.last_affinity_change)
        {
            return false;
        }
        if writer.state() == MESSAGE_ID_FIELD && !writer.write_field(buf, &self.message_id) {
            return false;
        }
        true
    }

    /// Reads the base fields the reader has not yet completed.
    pub fn read_fields(&mut self, reader: &mut MessageReader, buf: &mut dyn Buf) -> Result<bool> {
        if reader.state() == EXCHANGE_ID_FIELD && !reader.read_field(buf, &mut self.exchange_id)? {
            return Ok(false);
        }
        if reader.state() == FLAGS_FIELD && !reader.read_field(buf, &mut self.flags)? {
            return Ok(false);
        }
        if reader.state() == LAST_VERSION_FIELD
            && !reader.read_field(buf, &mut self.last_version)?
        {
            return Ok(false);
        }
        if reader.state() == LAST_AFFINITY_CHANGE_FIELD
            && !reader.read_field(buf, &mut self.last_affinity_change)?
        {
            return Ok(false);
        }
        if reader.state() == MESSAGE_ID_FIELD && !reader.read_field(buf, &mut self.message_id)? {
            return Ok(false);
        }
        Ok(true)
    }
}

impl fmt::Display for ExchangeHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "exchId={}, restoreState={}, compressed={}, msgId={}",
            self.exchange_id,
            self.restore_state(),
            self.compressed(),
            self.message_id
        )
    }
}

/// A message exchanged between nodes while negotiating partition ownership.
pub trait ExchangeMessage: DirectMessage {
    /// Returns the base fields.
    fn header(&self) -> &ExchangeHeader;

    /// Returns the round this message belongs to.
    fn exchange_id(&self) -> &ExchangeId {
        self.header().exchange_id()
    }

    /// Returns `true` if the message is a recovery probe.
    fn restore_state(&self) -> bool {
        self.header().restore_state()
    }

    /// Returns the original round a restore probe asks about.
    fn restore_exchange_id(&self) -> Option<&ExchangeId> {
        None
    }

    /// Returns the update counters this message reports for `cache_id`.
    fn partition_update_counters(&self, cache_id: CacheId) -> PartitionUpdateCounters;
}

/// Registers every exchange message type with `registry`.
pub fn register_exchange_messages(registry: &mut MessageRegistry) {
    registry.register(
        SinglePartitionRequest::DIRECT_TYPE,
        Box::new(|| Box::new(SinglePartitionRequest::default()) as Box<dyn DirectMessage>),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::DiscoveryEventType;
    use uuid::Uuid;

    fn header() -> ExchangeHeader {
        ExchangeHeader::new(ExchangeId::new(
            TopologyVersion::new(4),
            Uuid::from_u128(4),
            DiscoveryEventType::NodeJoined,
        ))
    }

    #[test]
    fn test_new_header_defaults() {
        let h = header();
        assert_eq!(h.flags(), 0);
        assert!(!h.restore_state());
        assert!(!h.compressed());
        assert!(h.last_version().is_none());
        assert!(h.last_affinity_change_version().is_none());
        assert_eq!(h.message_id(), 0);
    }

    #[test]
    fn test_flags_are_independent() {
        let mut h = header();
        h.set_compressed(true);
        h.set_restore_state(true);
        assert_eq!(h.flags(), COMPRESSED_FLAG | RESTORE_STATE_FLAG);

        h.set_compressed(false);
        assert!(h.restore_state());
        assert_eq!(h.flags(), RESTORE_STATE_FLAG);
    }

    #[test]
    fn test_setters() {
        let mut h = header();
        h.set_last_version(Some(CacheVersion::new(1, 2, 3)));
        h.set_last_affinity_change_version(Some(TopologyVersion::new(2)));
        h.set_message_id(77);
        assert_eq!(h.last_version(), Some(&CacheVersion::new(1, 2, 3)));
        assert_eq!(
            h.last_affinity_change_version(),
            Some(TopologyVersion::new(2))
        );
        assert_eq!(h.message_id(), 77);
    }

    #[test]
    fn test_header_fields_roundtrip() {
        let mut h = header();
        h.set_last_version(Some(CacheVersion::new(1, 2, 3)));
        h.set_message_id(-9);

        let mut writer = MessageWriter::new();
        let mut out = Vec::new();
        assert!(h.write_fields(&mut writer, &mut out));
        assert_eq!(writer.state(), BASE_FIELDS_COUNT);

        let mut reader = MessageReader::new();
        let mut decoded = ExchangeHeader::default();
        let mut input = &out[..];
        assert!(decoded.read_fields(&mut reader, &mut input).unwrap());
        assert_eq!(decoded, h);
        assert!(input.is_empty());
    }

    #[test]
    fn test_register_exchange_messages() {
        let mut registry = MessageRegistry::new();
        register_exchange_messages(&mut registry);
        assert!(registry.contains(SinglePartitionRequest::DIRECT_TYPE));
        let msg = registry.create(SinglePartitionRequest::DIRECT_TYPE).unwrap();
        assert_eq!(msg.fields_count(), SinglePartitionRequest::FIELDS_COUNT);
    }
}
