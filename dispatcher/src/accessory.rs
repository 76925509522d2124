//! Accessory descriptors

use serde::{Deserialize, Serialize};

/// What the host knows about a connected accessory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Accessory {
    /// Host-assigned connection identifier
    pub connection_id: u64,
    pub name: String,
    pub manufacturer: String,
    pub model_number: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
    /// Protocols the accessory advertises
    pub protocol_strings: Vec<String>,
}

impl Accessory {
    pub fn new(connection_id: u64, name: impl Into<String>) -> Self {
        Self {
            connection_id,
            name: name.into(),
            ..Self::default()
        }
    }

    /// Whether the accessory advertises `protocol`
    pub fn supports(&self, protocol: &str) -> bool {
        self.protocol_strings.iter().any(|p| p == protocol)
    }
}

/// Read-only snapshot of the accessory a dispatcher is talking to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryInfo {
    pub accessory: Accessory,
    pub protocol_string: String,
}
