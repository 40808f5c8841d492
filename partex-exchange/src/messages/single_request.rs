use std::any::Any;
use std::fmt;

use bytes::{Buf, BufMut};
use partex_core::error::{ExchangeError, Result};
use partex_core::protocol::{DirectMessage, MessageReader, MessageWriter};

use super::{ExchangeHeader, ExchangeMessage, PartitionUpdateCounters, BASE_FIELDS_COUNT};
use crate::topology::{CacheId, CacheVersion, ExchangeId, TopologyVersion};

/// Request for a node's local partition state in one exchange round.
///
/// Sent by the coordinator to a node whose single-partition message it is
/// still missing. A restore probe carries the id of the round the sender lost
/// track of while travelling under a fresh exchange id of its own.
///
/// The restore flag and the restore id always agree: a plain request has
/// neither, a probe has both. Only the constructors set either of them; the
/// setters below reach the remaining base fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinglePartitionRequest {
    header: ExchangeHeader,
    restore_exchange_id: Option<ExchangeId>,
}

impl SinglePartitionRequest {
    /// Wire identifier of this message type.
    pub const DIRECT_TYPE: i16 = 48;

    /// Number of fields, the base fields included.
    pub const FIELDS_COUNT: u8 = BASE_FIELDS_COUNT + 1;

    /// Field index of the restore exchange id.
    pub const RESTORE_EXCHANGE_ID_FIELD: u8 = BASE_FIELDS_COUNT;

    /// Creates a plain request for the round `exchange_id`.
    pub fn new(exchange_id: ExchangeId) -> Self {
        Self {
            header: ExchangeHeader::new(exchange_id),
            restore_exchange_id: None,
        }
    }

    /// Creates a restore probe asking for the state of `original_id`, sent
    /// under `wrapping_id`.
    pub fn restore_state_request(wrapping_id: ExchangeId, original_id: ExchangeId) -> Self {
        let mut header = ExchangeHeader::new(wrapping_id);
        header.set_restore_state(true);
        Self {
            header,
            restore_exchange_id: Some(original_id),
        }
    }

    /// Rebuilds a request from a header and an optional restore id, e.g. when
    /// re-wrapping a probe received from a peer.
    ///
    /// Fails with [`ExchangeError::RestoreProbe`] if the header's restore
    /// flag and the presence of `restore_exchange_id` disagree.
    pub fn from_parts(
        header: ExchangeHeader,
        restore_exchange_id: Option<ExchangeId>,
    ) -> Result<Self> {
        match (header.restore_state(), restore_exchange_id.is_some()) {
            (true, false) => Err(ExchangeError::RestoreProbe(format!(
                "{} is flagged as restore state but has no restore exchange id",
                header.exchange_id()
            ))),
            (false, true) => Err(ExchangeError::RestoreProbe(format!(
                "{} carries a restore exchange id without the restore state flag",
                header.exchange_id()
            ))),
            _ => Ok(Self {
                header,
                restore_exchange_id,
            }),
        }
    }

    /// Sets whether the payload is compressed.
    pub fn set_compressed(&mut self, compressed: bool) {
        self.header.set_compressed(compressed);
    }

    /// Sets the last cache version seen by the sender.
    pub fn set_last_version(&mut self, version: Option<CacheVersion>) {
        self.header.set_last_version(version);
    }

    /// Sets the topology version of the last affinity change.
    pub fn set_last_affinity_change_version(&mut self, version: Option<TopologyVersion>) {
        self.header.set_last_affinity_change_version(version);
    }

    /// Sets the sender-local message id.
    pub fn set_message_id(&mut self, message_id: i64) {
        self.header.set_message_id(message_id);
    }

    fn check_restore_fields(&mut self, reader: &MessageReader) -> Result<()> {
        let flagged = self.header.restore_state();

        if !reader.reads_field(Self::RESTORE_EXCHANGE_ID_FIELD) {
            if flagged {
                tracing::trace!(
                    exchange_id = %self.header.exchange_id(),
                    "restore id beyond field limit, treating probe as plain request"
                );
                self.header.set_restore_state(false);
            }
            self.restore_exchange_id = None;
            return Ok(());
        }

        match (flagged, self.restore_exchange_id.is_some()) {
            (true, false) => Err(reader.fault(
                Self::RESTORE_EXCHANGE_ID_FIELD,
                "restore state flagged without a restore exchange id",
            )),
            (false, true) => Err(reader.fault(
                Self::RESTORE_EXCHANGE_ID_FIELD,
                "restore exchange id present without the restore state flag",
            )),
            _ => Ok(()),
        }
    }
}

impl DirectMessage for SinglePartitionRequest {
    fn direct_type(&self) -> i16 {
        Self::DIRECT_TYPE
    }

    fn fields_count(&self) -> u8 {
        Self::FIELDS_COUNT
    }

    fn write_fields(&self, writer: &mut MessageWriter, buf: &mut dyn BufMut) -> bool {
        if !self.header.write_fields(writer, buf) {
            return false;
        }
        if writer.state() == Self::RESTORE_EXCHANGE_ID_FIELD
            && !writer.write_field(buf, &self.restore_exchange_id)
        {
            return false;
        }
        true
    }

    fn read_fields(&mut self, reader: &mut MessageReader, buf: &mut dyn Buf) -> Result<bool> {
        if !self.header.read_fields(reader, buf)? {
            return Ok(false);
        }
        if reader.state() == Self::RESTORE_EXCHANGE_ID_FIELD {
            if !reader.read_field(buf, &mut self.restore_exchange_id)? {
                return Ok(false);
            }
            self.check_restore_fields(reader)?;
        }
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ExchangeMessage for SinglePartitionRequest {
    fn header(&self) -> &ExchangeHeader {
        &self.header
    }

    fn restore_exchange_id(&self) -> Option<&ExchangeId> {
        self.restore_exchange_id.as_ref()
    }

    /// Always empty: a request carries no counters of its own.
    fn partition_update_counters(&self, _cache_id: CacheId) -> PartitionUpdateCounters {
        PartitionUpdateCounters::new()
    }
}

impl fmt::Display for SinglePartitionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SinglePartitionRequest[{}", self.header)?;
        if let Some(id) = &self.restore_exchange_id {
            write!(f, ", restoreExchId={}", id)?;
        }
        write!(f, "]")
    }
}
