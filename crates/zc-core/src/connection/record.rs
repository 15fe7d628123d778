use serde::{Deserialize, Serialize};

use crate::ids::ConnectionId;

/// Status column of a connection record.
///
/// The store keeps free text written by the external automation service;
/// only the "connected" variants are recognized, everything else counts as
/// not linked. The legacy service writes both English and Portuguese
/// spellings, in mixed case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Other(String),
}

impl ConnectionStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "connected" | "conectado" => ConnectionStatus::Connected,
            "disconnected" | "desconectado" => ConnectionStatus::Disconnected,
            other => ConnectionStatus::Other(other.to_string()),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// One row of the remote status store, as read back for a user.
///
/// Owned by the external store: created when pairing succeeds, updated on
/// status transitions, never deleted by this system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRecord {
    pub id: ConnectionId,
    pub status: Option<String>,
    pub phone: Option<String>,
}

impl ConnectionRecord {
    pub fn status(&self) -> ConnectionStatus {
        match &self.status {
            Some(raw) => ConnectionStatus::parse(raw),
            None => ConnectionStatus::Other(String::new()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status().is_connected()
    }
}
