//! Declarative configuration loading from YAML, TOML, and environment variables.
//!
//! File contents are deserialized into [`FileConfig`] and then converted into
//! [`ExchangeConfig`](crate::config::ExchangeConfig) through the builder, so
//! the same validation applies to every source.
//!
//! # Supported Formats
//!
//! - **YAML** (requires `config-file` feature): `ExchangeConfig::from_yaml("exchange.yaml")`
//! - **TOML** (requires `config-file` feature): `ExchangeConfig::from_toml("exchange.toml")`
//! - **Environment Variables** (always available): `ExchangeConfig::from_env()`
//!
//! # Example YAML
//!
//! ```yaml
//! protocol-version: 2
//! force-legacy-protocol: false
//! field-limit: 6
//! max-frame-length: 8388608
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, ExchangeConfig, ExchangeConfigBuilder};

/// Environment variable for the local protocol version.
pub const ENV_PROTOCOL_VERSION: &str = "PARTEX_PROTOCOL_VERSION";
/// Environment variable pinning negotiation to the legacy protocol.
pub const ENV_FORCE_LEGACY_PROTOCOL: &str = "PARTEX_FORCE_LEGACY_PROTOCOL";
/// Environment variable for the field limit.
pub const ENV_FIELD_LIMIT: &str = "PARTEX_FIELD_LIMIT";
/// Environment variable for the maximum frame length.
pub const ENV_MAX_FRAME_LENGTH: &str = "PARTEX_MAX_FRAME_LENGTH";

/// File-based exchange configuration.
///
/// Mirrors [`ExchangeConfig`](crate::config::ExchangeConfig) with every
/// setting optional; unset settings take the builder defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", default)]
pub struct FileConfig {
    /// Highest exchange protocol version this node speaks.
    pub protocol_version: Option<i32>,
    /// Pin negotiation to protocol version 1.
    pub force_legacy_protocol: Option<bool>,
    /// Upper bound on encoded and decoded field indices.
    pub field_limit: Option<u8>,
    /// Largest accepted frame in bytes.
    pub max_frame_length: Option<usize>,
}

impl TryFrom<FileConfig> for ExchangeConfig {
    type Error = ConfigError;

    fn try_from(file: FileConfig) -> Result<Self, Self::Error> {
        let mut builder = ExchangeConfigBuilder::new();

        if let Some(version) = file.protocol_version {
            builder = builder.protocol_version(version);
        }

        if let Some(force) = file.force_legacy_protocol {
            builder = builder.force_legacy_protocol(force);
        }

        if let Some(limit) = file.field_limit {
            builder = builder.field_limit(limit);
        }

        if let Some(length) = file.max_frame_length {
            builder = builder.max_frame_length(length);
        }

        builder.build()
    }
}

impl FileConfig {
    /// Reads the supported environment variables over a default configuration.
    ///
    /// A variable that is set but does not parse is an error rather than
    /// silently ignored.
    pub fn from_env_vars() -> Result<Self, ConfigError> {
        Ok(Self {
            protocol_version: env_value(ENV_PROTOCOL_VERSION)?,
            force_legacy_protocol: std::env::var(ENV_FORCE_LEGACY_PROTOCOL)
                .ok()
                .map(|v| v.trim().eq_ignore_ascii_case("true")),
            field_limit: env_value(ENV_FIELD_LIMIT)?,
            max_frame_length: env_value(ENV_MAX_FRAME_LENGTH)?,
        })
    }
}

fn env_value<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::new(format!("invalid value {val:?} for {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

impl ExchangeConfig {
    /// Loads configuration from a YAML file.
    ///
    /// Requires the `config-file` feature.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let config = ExchangeConfig::from_yaml("exchange.yaml")?;
    /// let codec = config.new_codec(registry);
    /// ```
    #[cfg(feature = "config-file")]
    pub fn from_yaml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read YAML config file: {e}"))
        })?;
        let file_config: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse YAML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from a TOML file.
    ///
    /// Requires the `config-file` feature.
    #[cfg(feature = "config-file")]
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            ConfigError::new(format!("failed to read TOML config file: {e}"))
        })?;
        let file_config: FileConfig = toml_crate::from_str(&content).map_err(|e| {
            ConfigError::new(format!("failed to parse TOML config: {e}"))
        })?;
        file_config.try_into()
    }

    /// Loads configuration from environment variables.
    ///
    /// This method is always available (no feature flag required).
    ///
    /// # Supported Environment Variables
    ///
    /// | Variable | Maps to |
    /// |----------|---------|
    /// | `PARTEX_PROTOCOL_VERSION` | `protocol_version` |
    /// | `PARTEX_FORCE_LEGACY_PROTOCOL` | `"true"` or `"false"` |
    /// | `PARTEX_FIELD_LIMIT` | `field_limit` |
    /// | `PARTEX_MAX_FRAME_LENGTH` | `max_frame_length` in bytes |
    pub fn from_env() -> Result<Self, ConfigError> {
        FileConfig::from_env_vars()?.try_into()
    }
}

/// Convenience function to load a configuration file, auto-detecting format by extension.
///
/// Supports `.yaml`, `.yml`, and `.toml` extensions.
/// Requires the `config-file` feature.
#[cfg(feature = "config-file")]
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> Result<ExchangeConfig, ConfigError> {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => ExchangeConfig::from_yaml(path),
        Some("toml") => ExchangeConfig::from_toml(path),
        Some(ext) => Err(ConfigError::new(format!(
            "unsupported config file extension: .{ext} (expected .yaml, .yml, or .toml)"
        ))),
        None => Err(ConfigError::new(
            "config file has no extension; expected .yaml, .yml, or .toml",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_config_defaults_produce_valid_config() {
        let config: ExchangeConfig = FileConfig::default().try_into().unwrap();
        assert_eq!(config, ExchangeConfig::default());
    }

    #[test]
    fn test_file_config_with_all_settings() {
        let file_config = FileConfig {
            protocol_version: Some(1),
            force_legacy_protocol: Some(true),
            field_limit: Some(5),
            max_frame_length: Some(4096),
        };
        let config: ExchangeConfig = file_config.try_into().unwrap();
        assert_eq!(config.protocol_version(), 1);
        assert!(config.force_legacy_protocol());
        assert_eq!(config.field_limit(), Some(5));
        assert_eq!(config.max_frame_length(), 4096);
    }

    #[test]
    fn test_file_config_is_validated() {
        let file_config = FileConfig {
            field_limit: Some(2),
            ..Default::default()
        };
        let result: Result<ExchangeConfig, _> = file_config.try_into();
        assert!(result.is_err());
    }

    // All environment cases share one test so they never race each other.
    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_PROTOCOL_VERSION, "3");
        std::env::set_var(ENV_FORCE_LEGACY_PROTOCOL, "TRUE");
        std::env::set_var(ENV_FIELD_LIMIT, "6");
        std::env::set_var(ENV_MAX_FRAME_LENGTH, "2048");

        let config = ExchangeConfig::from_env().unwrap();
        assert_eq!(config.protocol_version(), 3);
        assert!(config.force_legacy_protocol());
        assert_eq!(config.field_limit(), Some(6));
        assert_eq!(config.max_frame_length(), 2048);

        std::env::set_var(ENV_FIELD_LIMIT, "six");
        let err = ExchangeConfig::from_env().unwrap_err();
        assert!(err.to_string().contains(ENV_FIELD_LIMIT));

        std::env::set_var(ENV_FIELD_LIMIT, "3");
        assert!(ExchangeConfig::from_env().is_err());

        for name in [
            ENV_PROTOCOL_VERSION,
            ENV_FORCE_LEGACY_PROTOCOL,
            ENV_FIELD_LIMIT,
            ENV_MAX_FRAME_LENGTH,
        ] {
            std::env::remove_var(name);
        }
        assert_eq!(ExchangeConfig::from_env().unwrap(), ExchangeConfig::default());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_yaml_parse() {
        let yaml = "protocol-version: 1\nfield-limit: 6\n";
        let parsed: FileConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.protocol_version, Some(1));
        assert_eq!(parsed.field_limit, Some(6));
        assert_eq!(parsed.max_frame_length, None);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_toml_round_trip() {
        let file_config = FileConfig {
            force_legacy_protocol: Some(true),
            max_frame_length: Some(1 << 20),
            ..Default::default()
        };
        let toml_str = toml_crate::to_string(&file_config).unwrap();
        let parsed: FileConfig = toml_crate::from_str(&toml_str).unwrap();
        assert_eq!(parsed, file_config);
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn test_load_config_rejects_unknown_extension() {
        let err = load_config("exchange.json").unwrap_err();
        assert!(err.to_string().contains("unsupported config file extension"));
    }
}
