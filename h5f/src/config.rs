//! Engine configuration
//!
//! A construction-time value passed into the writer, never a global.
//! Serializable so deployments can keep their defaults in a JSON file.

use h5f_core::message::FilterDescription;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Compact vs dense storage for new groups' links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStorage {
    Compact,
    Dense,
}

/// Thresholds for switching attribute storage between compact messages
/// and the dense heap + index form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseChange {
    /// Most attributes an object keeps compact
    pub max_compact: u16,
    /// Fewest attributes dense storage is kept for
    pub min_dense: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Object header version for new objects (1 or 2)
    pub object_header_version: u8,
    /// Link storage for new groups
    pub link_storage: LinkStorage,
    pub attribute_phase_change: PhaseChange,
    /// Deletion policy for the dense-attribute name index
    pub lazy_rebalancing: bool,
    /// Filters applied to new chunked datasets, in application order
    pub default_filter_pipeline: Vec<FilterDescription>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            object_header_version: 2,
            link_storage: LinkStorage::Compact,
            attribute_phase_change: PhaseChange {
                max_compact: 8,
                min_dense: 6,
            },
            lazy_rebalancing: false,
            default_filter_pipeline: Vec::new(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|err| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, err).into()
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, err).into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use h5f_core::constants::filter;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.object_header_version, 2);
        assert_eq!(config.link_storage, LinkStorage::Compact);
        assert!(!config.lazy_rebalancing);
        assert!(config.default_filter_pipeline.is_empty());
    }

    #[test]
    fn test_json_round_trip() {
        let mut config = EngineConfig::default();
        config.lazy_rebalancing = true;
        config.default_filter_pipeline = vec![
            FilterDescription::new(filter::SHUFFLE, 0, vec![4]),
            FilterDescription::new(filter::DEFLATE, 0, vec![6]),
        ];
        let json = config.to_json().unwrap();
        assert_eq!(EngineConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"lazy_rebalancing": true}"#).unwrap();
        assert!(config.lazy_rebalancing);
        assert_eq!(config.object_header_version, 2);
    }
}
