//! Dispatcher configuration

use serde::{Deserialize, Serialize};

use crate::codec::Framing;
use crate::error::ConfigError;

/// Default bound on a single read from the input stream
pub const MAX_READ_LENGTH: usize = 4096;

/// Default bound on a partial frame held across reads (64KB)
pub const MAX_FRAME_LENGTH: usize = 64 * 1024;

/// Configuration for a [`StreamDispatcher`](crate::StreamDispatcher)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Capacity of the read buffer; one read never returns more
    pub max_read_length: usize,
    /// Message boundary policy for the input stream
    pub framing: Framing,
    /// Largest partial frame kept while waiting for its end
    pub max_frame_length: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_read_length: MAX_READ_LENGTH,
            framing: Framing::PerRead,
            max_frame_length: MAX_FRAME_LENGTH,
        }
    }
}

impl DispatcherConfig {
    /// Parse and validate a JSON config; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_read_length(mut self, max_read_length: usize) -> Self {
        self.max_read_length = max_read_length;
        self
    }

    pub fn with_framing(mut self, framing: Framing) -> Self {
        self.framing = framing;
        self
    }

    pub fn with_max_frame_length(mut self, max_frame_length: usize) -> Self {
        self.max_frame_length = max_frame_length;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_read_length == 0 {
            return Err(ConfigError::Invalid {
                field: "max_read_length",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_frame_length == 0 {
            return Err(ConfigError::Invalid {
                field: "max_frame_length",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = DispatcherConfig::default();
        assert_eq!(config.max_read_length, 4096);
        assert_eq!(config.framing, Framing::PerRead);
        assert_eq!(config.max_frame_length, 65536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = DispatcherConfig::from_json(
            r#"{"max_read_length": 512, "framing": {"kind": "delimited", "delimiter": 10}}"#,
        )
        .unwrap();
        assert_eq!(config.max_read_length, 512);
        assert_eq!(config.framing, Framing::lines());
        assert_eq!(config.max_frame_length, MAX_FRAME_LENGTH);
    }

    #[test]
    fn test_from_json_rejects_zero_read_length() {
        let err = DispatcherConfig::from_json(r#"{"max_read_length": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "max_read_length",
                ..
            }
        ));
    }

    #[test]
    fn test_from_json_rejects_unknown_field() {
        let err = DispatcherConfig::from_json(r#"{"max_read_len": 10}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
