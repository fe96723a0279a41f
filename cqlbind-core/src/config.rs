//! Configuration for type resolution and value encoding

use serde::{Deserialize, Serialize};

/// Highest native protocol version this codec frames values for
pub const MAX_PROTOCOL_VERSION: u8 = 4;

/// Main configuration structure for the codec layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Negotiated native protocol version (controls collection framing width)
    pub protocol_version: u8,

    /// Maximum nesting depth accepted by the type parser and type comparison
    pub max_type_depth: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            protocol_version: MAX_PROTOCOL_VERSION,
            max_type_depth: 64,
        }
    }
}

impl CodecConfig {
    /// Create a configuration for a negotiated protocol version
    pub fn for_protocol(protocol_version: u8) -> Self {
        Self {
            protocol_version,
            ..Self::default()
        }
    }

    /// Load a configuration from a TOML document
    ///
    /// Missing keys fall back to their defaults. The result is validated.
    pub fn from_toml_str(input: &str) -> crate::Result<Self> {
        let config: CodecConfig = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether collection counts and item lengths use 16-bit framing
    pub fn uses_short_framing(&self) -> bool {
        self.protocol_version < 3
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.protocol_version == 0 || self.protocol_version > MAX_PROTOCOL_VERSION {
            return Err(crate::Error::configuration(format!(
                "protocol_version must be between 1 and {}, got {}",
                MAX_PROTOCOL_VERSION, self.protocol_version
            )));
        }

        if self.max_type_depth == 0 {
            return Err(crate::Error::configuration(
                "max_type_depth must be greater than 0",
            ));
        }

        Ok(())
    }
}
