//! Commands accepted from a front-end and messages sent back to it.
//!
//! Every line on the wire is one JSON object tagged by `"type"`. Client lines
//! additionally carry `"protocol_version"`.

use crate::version::ProtocolVersion;
use panes_core::{
    AttentionFlags, EngineSnapshot, LayoutMode, LayoutSnapshot, MoveDirection, NoticeLevel,
    RemovalReason, SessionId, SessionMode, SessionView, SplitHandle,
};
use serde::{Deserialize, Serialize};

/// One command from a front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Allocate a slot and start prompting for its directory.
    AddSession,

    /// Move an existing empty slot to the directory prompt.
    OpenSlot { session_id: SessionId },

    /// Abandon the directory prompt.
    CancelDirectory { session_id: SessionId },

    /// Launch the agent in `directory`. Danger modes must go through a hold.
    Start {
        session_id: SessionId,
        directory: String,
        mode: SessionMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<String>,
    },

    /// Start the hold-to-confirm gesture for a danger mode.
    BeginDangerHold {
        session_id: SessionId,
        directory: String,
        mode: SessionMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        task: Option<String>,
    },

    /// Release the hold before it completed.
    CancelDangerHold { session_id: SessionId },

    /// Keystrokes for the session's process.
    Input { session_id: SessionId, data: String },

    /// The user scrolled the session's output.
    UserScroll { session_id: SessionId, at_bottom: bool },

    Focus { session_id: SessionId },

    Close { session_id: SessionId },

    ConfirmClose { session_id: SessionId },

    Swap { a: SessionId, b: SessionId },

    /// Move the pane at a visual position one step left or right.
    Move {
        position: usize,
        direction: MoveDirection,
    },

    SetMode { mode: LayoutMode },

    /// Arrangement name such as "vertical" or "3-left2".
    SetArrangement { arrangement: String },

    SetSplit { handle: SplitHandle, percent: f32 },

    SelectTab { session_id: SessionId },

    SetTitle {
        session_id: SessionId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },

    /// Terminal cell size of the container.
    WindowResize { cols: u16, rows: u16 },

    ClearAllAttention,

    Snapshot,

    Ping { seq: u64 },

    Shutdown,
}

/// A command line as read from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientMessage {
    pub protocol_version: ProtocolVersion,

    #[serde(flatten)]
    pub command: Command,
}

impl ClientMessage {
    /// Wraps a command with the current protocol version.
    pub fn new(command: Command) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            command,
        }
    }
}

/// Messages written back to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once when the channel opens.
    Hello {
        protocol_version: ProtocolVersion,
        max_sessions: usize,
    },

    SessionStateChanged { session: SessionView },

    SessionRemoved {
        session_id: SessionId,
        reason: RemovalReason,
    },

    AttentionChanged {
        session_id: SessionId,
        flags: AttentionFlags,
    },

    LayoutChanged { layout: LayoutSnapshot },

    FocusChanged {
        #[serde(default)]
        focused: Option<SessionId>,
    },

    /// Last directory used by this slot, for pre-filling the prompt.
    DirectorySuggested {
        session_id: SessionId,
        directory: String,
    },

    /// Process output, decoded lossily as UTF-8.
    Output {
        session_id: SessionId,
        data: String,
        /// Whether the view may auto-scroll to the bottom.
        follow: bool,
    },

    Notice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<SessionId>,
        level: NoticeLevel,
        message: String,
    },

    /// Closing this session needs an explicit confirm_close.
    ConfirmationRequired { session_id: SessionId },

    Snapshot { snapshot: EngineSnapshot },

    Pong { seq: u64 },

    /// A command failed.
    Error { code: ErrorCode, message: String },

    /// The command's protocol version is not supported.
    Rejected {
        reason: String,
        protocol_version: ProtocolVersion,
    },
}

impl ServerMessage {
    pub fn hello(max_sessions: usize) -> Self {
        ServerMessage::Hello {
            protocol_version: ProtocolVersion::CURRENT,
            max_sessions,
        }
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The line was not a valid command.
    BadRequest,
    CapacityExceeded,
    StaleReference,
    InvalidTransition,
    InvalidValue,
    SpawnFailed,
    NeedsConfirmation,
    /// The engine stopped.
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> SessionId {
        SessionId::new(n).unwrap()
    }

    #[test]
    fn test_client_message_wire_format() {
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"start","session_id":2,"directory":"/tmp/app","mode":"dangerous-resume","task":"fix it"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.command,
            Command::Start {
                session_id: id(2),
                directory: "/tmp/app".to_string(),
                mode: SessionMode::DangerousResume,
                task: Some("fix it".to_string()),
            }
        );
    }

    #[test]
    fn test_unit_commands_parse() {
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"add_session"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.command, Command::AddSession);

        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"move","position":0,"direction":"left"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg.command,
            Command::Move {
                position: 0,
                direction: MoveDirection::Left
            }
        );
    }

    #[test]
    fn test_out_of_range_session_id_is_rejected() {
        let json = r#"{"protocol_version":{"major":1,"minor":0},"type":"focus","session_id":6}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_message_tagging() {
        let msg = ServerMessage::SessionRemoved {
            session_id: id(1),
            reason: RemovalReason::Closed,
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "session_removed");
        assert_eq!(value["session_id"], 1);
        assert_eq!(value["reason"], "closed");

        let value = serde_json::to_value(ServerMessage::error(ErrorCode::StaleReference, "gone")).unwrap();
        assert_eq!(value["code"], "stale_reference");
    }
}
