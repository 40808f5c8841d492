//! Core wire framework for partition-exchange negotiation.

#![warn(missing_docs)]

pub mod error;
pub mod protocol;

pub use error::{ExchangeError, Result};
pub use protocol::{
    DirectMessage, DirectMessageCodec, MessageReader, MessageRegistry, MessageWriter, Progress,
    WireField,
};
