//! Resumable, versioned wire-message framework.
//!
//! Every exchange-protocol message is encoded as a `directType` header
//! followed by its fields in fixed declaration order. Encoding and decoding
//! run through explicit cursors ([`MessageWriter`], [`MessageReader`]) that
//! survive buffer boundaries, so a non-blocking transport can hand over
//! whatever space or bytes it has and call again later.

mod codec;
pub mod constants;
mod field;
mod message;
mod reader;
mod writer;

#[cfg(test)]
pub(crate) mod testing;

pub use codec::DirectMessageCodec;
pub use constants::*;
pub use field::{decode_fixed, Decoded, WireField};
pub use message::{DirectMessage, MessageFactory, MessageRegistry, Progress};
pub use reader::MessageReader;
pub use writer::MessageWriter;
