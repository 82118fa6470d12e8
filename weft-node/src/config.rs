// src/config.rs

//! Node configuration.

use crate::errors::{NodeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use weft_network::{DEFAULT_GOSSIP_PORT, DEFAULT_HANDSHAKE_PORT};

/// Complete node configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Gossip listen port (0 for ephemeral)
    pub gossip_port: u16,

    /// Handshake listen port (0 for ephemeral)
    pub handshake_port: u16,

    /// Handshake port assumed on remote peers
    pub remote_handshake_port: u16,

    /// Difficulty offered as the default for interactive transfers
    pub default_difficulty: u8,

    /// Key file loaded at startup, if any
    pub key_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            gossip_port: DEFAULT_GOSSIP_PORT,
            handshake_port: DEFAULT_HANDSHAKE_PORT,
            remote_handshake_port: DEFAULT_HANDSHAKE_PORT,
            default_difficulty: 3,
            key_file: None,
        }
    }
}

impl NodeConfig {
    /// Loads configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents)
            .map_err(|e| NodeError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Saves configuration to a JSON file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| NodeError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.gossip_port, DEFAULT_GOSSIP_PORT);
        assert_eq!(config.default_difficulty, 3);
        assert!(config.key_file.is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.json");

        let mut config = NodeConfig::default();
        config.gossip_port = 9999;
        config.key_file = Some(PathBuf::from("account.key"));
        config.save_to_file(&path).unwrap();

        let loaded = NodeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.gossip_port, 9999);
        assert_eq!(loaded.key_file, Some(PathBuf::from("account.key")));
    }

    #[test]
    fn test_from_file_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("node.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            NodeConfig::from_file(&path),
            Err(NodeError::ConfigError(_))
        ));
    }
}
