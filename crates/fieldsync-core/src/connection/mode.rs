//! Connection mode enumeration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operating mode of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Online,
    Offline,
    /// Connected and running a sync
    Syncing,
    /// Nothing detected yet
    #[default]
    Unknown,
}

impl ConnectionMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Unknown => "unknown",
        }
    }

    /// Syncing is a connected sub-state
    pub const fn is_online(self) -> bool {
        matches!(self, Self::Online | Self::Syncing)
    }

    /// User-facing description of the mode
    pub const fn message(self) -> &'static str {
        match self {
            Self::Online => "Online - changes are sent to the server",
            Self::Offline => "Offline - changes are kept locally and sent when the connection returns",
            Self::Syncing => "Synchronizing with the server",
            Self::Unknown => "Connection state not determined yet",
        }
    }
}

impl fmt::Display for ConnectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "syncing" => Ok(Self::Syncing),
            "unknown" => Ok(Self::Unknown),
            other => Err(format!("unknown connection mode '{other}'")),
        }
    }
}
