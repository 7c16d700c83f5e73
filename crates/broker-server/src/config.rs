// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Broker server configuration.

use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Broker server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind both endpoints to (default: 0.0.0.0).
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// Control endpoint port: client_reg/pub_reg/sub_reg/pub/disconnect/ping/shutdown.
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// Broadcast endpoint port: published data and heartbeats fan out here.
    #[serde(default = "default_broadcast_port")]
    pub broadcast_port: u16,

    /// Heartbeat tick interval, in milliseconds.
    #[serde(default = "default_heartbeat_ms")]
    pub heartbeat_interval_ms: u64,

    /// Maximum control-endpoint request/reply frame size (bytes).
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

fn default_bind_address() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_control_port() -> u16 {
    7777
}

fn default_broadcast_port() -> u16 {
    7778
}

fn default_heartbeat_ms() -> u64 {
    broker_core::HEARTBEAT_MS
}

fn default_max_message_size() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            control_port: default_control_port(),
            broadcast_port: default_broadcast_port(),
            heartbeat_interval_ms: default_heartbeat_ms(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save configuration to a JSON file.
    pub fn to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_port == 0 {
            return Err(ConfigError::InvalidValue("control_port cannot be 0".into()));
        }
        if self.broadcast_port == 0 {
            return Err(ConfigError::InvalidValue(
                "broadcast_port cannot be 0".into(),
            ));
        }
        if self.control_port == self.broadcast_port {
            return Err(ConfigError::InvalidValue(
                "control_port and broadcast_port must differ".into(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "heartbeat_interval_ms cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Configuration error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("serialize error: {0}")]
    Serialize(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ServerConfig::default();
        assert_eq!(config.control_port, 7777);
        assert_eq!(config.broadcast_port, 7778);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_identical_ports() {
        let config = ServerConfig {
            broadcast_port: 7777,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn roundtrips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broker.json");
        let config = ServerConfig {
            control_port: 9000,
            ..Default::default()
        };
        config.to_file(&path).unwrap();
        let loaded = ServerConfig::from_file(&path).unwrap();
        assert_eq!(loaded.control_port, 9000);
    }
}
