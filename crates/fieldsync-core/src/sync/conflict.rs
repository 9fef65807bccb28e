//! Record-level conflict resolution.
//!
//! Last writer wins, with the server taking precedence whenever the
//! comparison is ambiguous: a missing or unparsable timestamp on either side,
//! or two equal timestamps, never favours unsynced local data.

use crate::models::Versioned;
use crate::util::parse_timestamp;

/// Which copy of a record is authoritative
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Overwrite the local copy and mark it synced
    ServerWins,
    /// Keep the local payload and re-queue it for upload
    LocalWins,
}

/// Decide between two versions sharing a server id.
pub fn resolve(server: &impl Versioned, local: &impl Versioned) -> Resolution {
    resolve_timestamps(server.last_modified(), local.last_modified())
}

/// Timestamp-only form of [`resolve`].
pub fn resolve_timestamps(server: Option<&str>, local: Option<&str>) -> Resolution {
    let (Some(server), Some(local)) = (
        server.and_then(parse_timestamp),
        local.and_then(parse_timestamp),
    ) else {
        return Resolution::ServerWins;
    };

    if local > server {
        Resolution::LocalWins
    } else {
        Resolution::ServerWins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: &str = "2024-05-01 10:00:00";
    const T_PLUS_10: &str = "2024-05-01 10:00:10";

    #[test]
    fn later_local_wins() {
        assert_eq!(
            resolve_timestamps(Some(T), Some(T_PLUS_10)),
            Resolution::LocalWins
        );
    }

    #[test]
    fn later_server_wins() {
        assert_eq!(
            resolve_timestamps(Some(T_PLUS_10), Some(T)),
            Resolution::ServerWins
        );
    }

    #[test]
    fn ties_favor_server() {
        assert_eq!(resolve_timestamps(Some(T), Some(T)), Resolution::ServerWins);
    }

    #[test]
    fn missing_or_garbage_favor_server() {
        let cases = [
            (None, Some(T)),
            (Some(T), None),
            (None, None),
            (Some("not a date"), Some(T_PLUS_10)),
            (Some(T), Some("31/12/2024")),
            (Some(""), Some(T_PLUS_10)),
        ];
        for (server, local) in cases {
            assert_eq!(
                resolve_timestamps(server, local),
                Resolution::ServerWins,
                "server={server:?} local={local:?}"
            );
        }
    }

    #[test]
    fn decision_is_deterministic() {
        let pairs = [
            (Some(T), Some(T_PLUS_10)),
            (Some(T_PLUS_10), Some(T)),
            (Some(T), Some(T)),
            (None, Some(T)),
        ];
        for (server, local) in pairs {
            let first = resolve_timestamps(server, local);
            for _ in 0..10 {
                assert_eq!(resolve_timestamps(server, local), first);
            }
        }
    }

    #[test]
    fn compares_across_formats() {
        assert_eq!(
            resolve_timestamps(Some("2024-05-01T10:00:00"), Some(T_PLUS_10)),
            Resolution::LocalWins
        );
    }
}
