//! # Client Configuration
//!
//! Plain data describing a handle: candidate hosts, optional password and
//! table sizes. Derives serde traits so embedders can keep it in their own
//! configuration files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hosts::HOSTS_MAX;
use crate::transaction::MULTI_MAX;

/// One candidate server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Host name or IP address.
    pub host: String,
    /// TCP port, 6379 unless specified.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Optional connect timeout in milliseconds.
    #[serde(default)]
    pub connect_timeout_ms: Option<u64>,
    /// Optional per-operation timeout in milliseconds.
    #[serde(default)]
    pub op_timeout_ms: Option<u64>,
}

impl HostConfig {
    /// Creates a host config without timeouts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        HostConfig {
            host: host.into(),
            port,
            connect_timeout_ms: None,
            op_timeout_ms: None,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn op_timeout(&self) -> Option<Duration> {
        self.op_timeout_ms.map(Duration::from_millis)
    }
}

fn default_port() -> u16 {
    6379
}

/// Configuration for a client handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Candidate hosts, registered in order (slot 0 first).
    pub hosts: Vec<HostConfig>,
    /// Password sent with AUTH after each connect.
    pub password: Option<String>,
    /// Number of host slots.
    pub host_capacity: usize,
    /// Maximum number of transactions per pipeline.
    pub multi_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            hosts: Vec::new(),
            password: None,
            host_capacity: HOSTS_MAX,
            multi_capacity: MULTI_MAX,
        }
    }
}
