//! Error types for exchange negotiation and the wire framework.

use std::io;
use thiserror::Error;

/// The main error type for exchange negotiation and message coding.
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// A negotiation context was requested for a protocol version below 1.
    #[error("protocol version contract violated: version {version} is below 1")]
    VersionContract {
        /// The rejected protocol version.
        version: i32,
    },

    /// Malformed or truncated-beyond-recovery input for a specific message field.
    #[error("decode fault in message type {direct_type}, field {field}: {reason}")]
    Decode {
        /// The `directType` of the message being decoded.
        direct_type: i16,
        /// Index of the field that could not be decoded.
        field: u8,
        /// Description of the fault.
        reason: String,
    },

    /// No message factory is registered for the received `directType`.
    #[error("unknown message type: {0}")]
    UnknownMessageType(i16),

    /// A restore probe was assembled without its original exchange id, or vice versa.
    #[error("restore probe inconsistency: {0}")]
    RestoreProbe(String),

    /// Two negotiation contexts could not be merged.
    #[error("merge rejected: {0}")]
    MergeRejected(String),

    /// A single wire value could not be parsed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Framing errors (oversized frames, unencodable messages).
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Configuration errors (invalid settings).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// I/O errors from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ExchangeError {
    /// Returns `true` if this error describes a fault in received bytes.
    pub fn is_decode_fault(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::UnknownMessageType(_))
    }
}

/// A specialized `Result` type for exchange operations.
pub type Result<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_contract_display() {
        let err = ExchangeError::VersionContract { version: 0 };
        assert_eq!(
            err.to_string(),
            "protocol version contract violated: version 0 is below 1"
        );
    }

    #[test]
    fn test_decode_fault_display() {
        let err = ExchangeError::Decode {
            direct_type: 48,
            field: 5,
            reason: "invalid presence byte 7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "decode fault in message type 48, field 5: invalid presence byte 7"
        );
        assert!(err.is_decode_fault());
    }

    #[test]
    fn test_unknown_message_type_display() {
        let err = ExchangeError::UnknownMessageType(-3);
        assert_eq!(err.to_string(), "unknown message type: -3");
        assert!(err.is_decode_fault());
    }

    #[test]
    fn test_restore_probe_display() {
        let err = ExchangeError::RestoreProbe("missing original exchange id".to_string());
        assert_eq!(
            err.to_string(),
            "restore probe inconsistency: missing original exchange id"
        );
    }

    #[test]
    fn test_merge_rejected_display() {
        let err = ExchangeError::MergeRejected("legacy protocol".to_string());
        assert_eq!(err.to_string(), "merge rejected: legacy protocol");
        assert!(!err.is_decode_fault());
    }

    #[test]
    fn test_configuration_error_display() {
        let err = ExchangeError::Configuration("field limit too small".to_string());
        assert_eq!(err.to_string(), "configuration error: field limit too small");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "connection reset");
        let err: ExchangeError = io_err.into();
        assert!(matches!(err, ExchangeError::Io(_)));
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExchangeError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(2)
        }

        fn returns_err() -> Result<i32> {
            Err(ExchangeError::VersionContract { version: -1 })
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
