//! WebSocket frame and protocol event types

use serde::{Deserialize, Serialize};

/// A single websocket frame, inbound or outbound.
///
/// The wire shape is `{"event": <name>, "args": [<string>, ...]}` in both
/// directions; inbound frames may omit `args` entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    pub event: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl RawFrame {
    pub fn new(event: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            event: event.into(),
            args,
        }
    }

    /// A frame with no arguments.
    pub fn bare(event: impl Into<String>) -> Self {
        Self::new(event, Vec::new())
    }

    /// All arguments joined into one string, the way the daemon chunks
    /// console and log payloads.
    pub fn joined_args(&self) -> String {
        self.args.concat()
    }
}

/// Outbound event names understood by the daemon.
pub mod outbound {
    pub const AUTH: &str = "auth";
    pub const SEND_COMMAND: &str = "send command";
    pub const SET_STATE: &str = "set state";
    pub const SEND_LOGS: &str = "send logs";
    pub const SEND_STATS: &str = "send stats";
}

/// Inbound protocol events named by the daemon.
///
/// The set is open-ended on the wire; anything unrecognized surfaces as
/// [`ProtocolEvent::Unknown`] so callers can decide how to treat it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEvent {
    AuthSuccess,
    TokenExpiring,
    TokenExpired,
    DaemonError,
    JwtError,
    Status,
    Stats,
    ConsoleOutput,
    DaemonMessage,
    InstallStart,
    InstallOutput,
    InstallCompleted,
    TransferLogs,
    TransferStatus,
    BackupCompleted,
    Unknown(String),
}

impl ProtocolEvent {
    pub fn from_name(name: &str) -> Self {
        match name {
            "auth success" => Self::AuthSuccess,
            "token expiring" => Self::TokenExpiring,
            "token expired" => Self::TokenExpired,
            "daemon error" => Self::DaemonError,
            "jwt error" => Self::JwtError,
            "status" => Self::Status,
            "stats" => Self::Stats,
            "console output" => Self::ConsoleOutput,
            "daemon message" => Self::DaemonMessage,
            "install start" => Self::InstallStart,
            "install output" => Self::InstallOutput,
            "install completed" => Self::InstallCompleted,
            "transfer logs" => Self::TransferLogs,
            "transfer status" => Self::TransferStatus,
            "backup completed" => Self::BackupCompleted,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::AuthSuccess => "auth success",
            Self::TokenExpiring => "token expiring",
            Self::TokenExpired => "token expired",
            Self::DaemonError => "daemon error",
            Self::JwtError => "jwt error",
            Self::Status => "status",
            Self::Stats => "stats",
            Self::ConsoleOutput => "console output",
            Self::DaemonMessage => "daemon message",
            Self::InstallStart => "install start",
            Self::InstallOutput => "install output",
            Self::InstallCompleted => "install completed",
            Self::TransferLogs => "transfer logs",
            Self::TransferStatus => "transfer status",
            Self::BackupCompleted => "backup completed",
            Self::Unknown(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_round_trip() {
        let frame = RawFrame::new("auth", vec!["tkn".into()]);
        let text = serde_json::to_string(&frame).unwrap();
        assert_eq!(text, r#"{"event":"auth","args":["tkn"]}"#);

        let parsed: RawFrame = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn test_frame_args_default() {
        let parsed: RawFrame = serde_json::from_str(r#"{"event":"auth success"}"#).unwrap();
        assert_eq!(parsed.event, "auth success");
        assert!(parsed.args.is_empty());
    }

    #[test]
    fn test_event_names_round_trip() {
        for name in [
            "auth success",
            "token expiring",
            "token expired",
            "daemon error",
            "jwt error",
            "status",
            "stats",
            "console output",
            "daemon message",
            "install start",
            "install output",
            "install completed",
            "transfer logs",
            "transfer status",
            "backup completed",
        ] {
            let event = ProtocolEvent::from_name(name);
            assert!(!matches!(event, ProtocolEvent::Unknown(_)), "{name}");
            assert_eq!(event.name(), name);
        }
    }

    #[test]
    fn test_unknown_event() {
        let event = ProtocolEvent::from_name("definitely not a thing");
        assert_eq!(
            event,
            ProtocolEvent::Unknown("definitely not a thing".to_string())
        );
        assert_eq!(event.name(), "definitely not a thing");
    }
}
