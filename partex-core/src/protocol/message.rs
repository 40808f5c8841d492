//! The direct-message contract and `directType` dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use bytes::{Buf, BufMut};

use super::reader::MessageReader;
use super::writer::MessageWriter;
use crate::error::Result;

/// Result of one encode or decode invocation.
///
/// `Incomplete` is a control-flow signal, not an error: the caller re-invokes
/// with more buffer space (encode) or more bytes (decode) and the cursor
/// resumes where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Every field of the message has been written or read.
    Complete,
    /// The buffer boundary was reached before the message finished.
    Incomplete,
}

impl Progress {
    /// Returns `true` if the message finished.
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

impl From<bool> for Progress {
    fn from(complete: bool) -> Self {
        if complete {
            Self::Complete
        } else {
            Self::Incomplete
        }
    }
}

/// A message exchanged between nodes, encoded field by field.
///
/// Implementations write and read their fields in a fixed declaration order,
/// one transition of the cursor per field, checking the cursor's
/// [`state`](MessageWriter::state) to skip fields already done. Fields
/// inherited from a shared base are always handled before the message's own.
pub trait DirectMessage: fmt::Debug + Send + Sync {
    /// Stable identifier of the concrete message type on the wire.
    fn direct_type(&self) -> i16;

    /// Upper bound on the number of encodable fields.
    fn fields_count(&self) -> u8;

    /// Routing tag reserved for the messaging transport.
    ///
    /// Exchange messages do not use it and report 0.
    fn handler_id(&self) -> i32 {
        0
    }

    /// Writes the fields the writer has not yet completed.
    ///
    /// Returns `false` if the buffer filled up first.
    fn write_fields(&self, writer: &mut MessageWriter, buf: &mut dyn BufMut) -> bool;

    /// Reads the fields the reader has not yet completed.
    ///
    /// Returns `Ok(false)` if the input ran out first.
    fn read_fields(&mut self, reader: &mut MessageReader, buf: &mut dyn Buf) -> Result<bool>;

    /// Returns this message as [`Any`] for downcasting after dispatch.
    fn as_any(&self) -> &dyn Any;
}

/// Factory for empty message instances of one `directType`.
pub trait MessageFactory: Send + Sync {
    /// Creates an empty instance to decode into.
    fn create(&self) -> Box<dyn DirectMessage>;
}

impl<F> MessageFactory for F
where
    F: Fn() -> Box<dyn DirectMessage> + Send + Sync,
{
    fn create(&self) -> Box<dyn DirectMessage> {
        self()
    }
}

/// Registry mapping `directType` values to message factories.
///
/// The receiving side reads the header, looks up the factory and decodes the
/// remaining fields into the instance it creates.
#[derive(Default)]
pub struct MessageRegistry {
    factories: HashMap<i16, Box<dyn MessageFactory>>,
}

impl MessageRegistry {
    /// Creates a new empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers a factory for the given `directType`.
    ///
    /// If a factory with the same type was previously registered, it is replaced.
    pub fn register(&mut self, direct_type: i16, factory: Box<dyn MessageFactory>) {
        self.factories.insert(direct_type, factory);
    }

    /// Removes the factory for the given `directType`.
    pub fn unregister(&mut self, direct_type: i16) -> Option<Box<dyn MessageFactory>> {
        self.factories.remove(&direct_type)
    }

    /// Creates an empty message for the given `directType`, if registered.
    pub fn create(&self, direct_type: i16) -> Option<Box<dyn DirectMessage>> {
        self.factories.get(&direct_type).map(|f| f.create())
    }

    /// Returns `true` if a factory is registered for the given `directType`.
    pub fn contains(&self, direct_type: i16) -> bool {
        self.factories.contains_key(&direct_type)
    }

    /// Returns the number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Returns `true` if no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for MessageRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.factories.keys().copied().collect();
        types.sort_unstable();
        f.debug_struct("MessageRegistry")
            .field("direct_types", &types)
            .finish()
    }
}
