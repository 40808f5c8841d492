//! Exchange configuration types and builders.

use std::sync::Arc;

use partex_core::error::ExchangeError;
use partex_core::protocol::{
    DirectMessageCodec, MessageReader, MessageRegistry, MessageWriter, DEFAULT_MAX_FRAME_LENGTH,
    UNLIMITED_FIELDS,
};

use crate::context::{MERGE_PROTOCOL_VERSION, MIN_PROTOCOL_VERSION};
use crate::messages::BASE_FIELDS_COUNT;

/// Default exchange protocol version supported by this node.
const DEFAULT_PROTOCOL_VERSION: i32 = MERGE_PROTOCOL_VERSION;

/// Configuration error returned when validation fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    message: String,
}

impl ConfigError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for ExchangeError {
    fn from(err: ConfigError) -> Self {
        ExchangeError::Configuration(err.message)
    }
}

/// Settings shared by every exchange round on this node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    protocol_version: i32,
    force_legacy_protocol: bool,
    field_limit: Option<u8>,
    max_frame_length: usize,
}

impl ExchangeConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ExchangeConfigBuilder {
        ExchangeConfigBuilder::new()
    }

    /// Returns the highest exchange protocol version this node speaks.
    pub fn protocol_version(&self) -> i32 {
        self.protocol_version
    }

    /// Returns `true` if negotiation is pinned to the legacy protocol.
    pub fn force_legacy_protocol(&self) -> bool {
        self.force_legacy_protocol
    }

    /// Returns the negotiated field limit, if one is configured.
    pub fn field_limit(&self) -> Option<u8> {
        self.field_limit
    }

    /// Returns the largest frame the codec accepts.
    pub fn max_frame_length(&self) -> usize {
        self.max_frame_length
    }

    /// Picks the protocol version for a round from the versions reported by
    /// the participating peers.
    ///
    /// The result is the lowest version any participant speaks, or 1 when
    /// the legacy protocol is forced. Peer versions are not validated here;
    /// [`ExchangeContext::new`](crate::context::ExchangeContext::new) rejects
    /// anything below 1.
    pub fn negotiate_protocol_version<I>(&self, peer_versions: I) -> i32
    where
        I: IntoIterator<Item = i32>,
    {
        if self.force_legacy_protocol {
            return MIN_PROTOCOL_VERSION;
        }

        peer_versions
            .into_iter()
            .fold(self.protocol_version, i32::min)
    }

    /// Creates a writer honouring the configured field limit.
    pub fn new_writer(&self) -> MessageWriter {
        MessageWriter::with_field_limit(self.effective_field_limit())
    }

    /// Creates a reader honouring the configured field limit.
    pub fn new_reader(&self) -> MessageReader {
        MessageReader::with_field_limit(self.effective_field_limit())
    }

    /// Creates a transport codec dispatching through `registry`.
    pub fn new_codec(&self, registry: Arc<MessageRegistry>) -> DirectMessageCodec {
        DirectMessageCodec::new(registry)
            .with_field_limit(self.effective_field_limit())
            .with_max_frame_length(self.max_frame_length)
    }

    fn effective_field_limit(&self) -> u8 {
        self.field_limit.unwrap_or(UNLIMITED_FIELDS)
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION,
            force_legacy_protocol: false,
            field_limit: None,
            max_frame_length: DEFAULT_MAX_FRAME_LENGTH,
        }
    }
}

/// Builder for [`ExchangeConfig`].
#[derive(Debug, Clone, Default)]
pub struct ExchangeConfigBuilder {
    protocol_version: Option<i32>,
    force_legacy_protocol: Option<bool>,
    field_limit: Option<u8>,
    max_frame_length: Option<usize>,
}

impl ExchangeConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the highest exchange protocol version this node speaks.
    pub fn protocol_version(mut self, version: i32) -> Self {
        self.protocol_version = Some(version);
        self
    }

    /// Pins negotiation to protocol version 1, for clusters that still run
    /// nodes unable to merge exchanges.
    pub fn force_legacy_protocol(mut self, force: bool) -> Self {
        self.force_legacy_protocol = Some(force);
        self
    }

    /// Limits encoding and decoding to fields with index below `limit`.
    pub fn field_limit(mut self, limit: u8) -> Self {
        self.field_limit = Some(limit);
        self
    }

    /// Sets the largest frame the codec accepts, excluding the length prefix.
    pub fn max_frame_length(mut self, length: usize) -> Self {
        self.max_frame_length = Some(length);
        self
    }

    /// Builds the configuration, returning an error if validation fails.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - `protocol_version` is below 1
    /// - `field_limit` would cut into the base exchange fields
    /// - `max_frame_length` is zero or exceeds `u32::MAX`
    pub fn build(self) -> Result<ExchangeConfig, ConfigError> {
        let protocol_version = self.protocol_version.unwrap_or(DEFAULT_PROTOCOL_VERSION);
        if protocol_version < MIN_PROTOCOL_VERSION {
            return Err(ConfigError::new(format!(
                "protocol_version must be at least {}, got {}",
                MIN_PROTOCOL_VERSION, protocol_version
            )));
        }

        if let Some(limit) = self.field_limit {
            if limit < BASE_FIELDS_COUNT {
                return Err(ConfigError::new(format!(
                    "field_limit must be at least {}, got {}",
                    BASE_FIELDS_COUNT, limit
                )));
            }
        }

        let max_frame_length = self.max_frame_length.unwrap_or(DEFAULT_MAX_FRAME_LENGTH);
        if max_frame_length == 0 {
            return Err(ConfigError::new("max_frame_length must be greater than 0"));
        }
        if max_frame_length as u64 > u64::from(u32::MAX) {
            return Err(ConfigError::new(format!(
                "max_frame_length must not exceed {}, got {}",
                u32::MAX,
                max_frame_length
            )));
        }

        Ok(ExchangeConfig {
            protocol_version,
            force_legacy_protocol: self.force_legacy_protocol.unwrap_or(false),
            field_limit: self.field_limit,
            max_frame_length,
        })
    }
}
