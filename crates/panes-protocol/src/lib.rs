//! panes protocol - JSON-lines wire format for `panes serve`
//!
//! A front-end writes one [`ClientMessage`] per line on the engine's stdin and
//! reads one [`ServerMessage`] per line from its stdout.

pub mod message;
pub mod parse;
pub mod version;

pub use message::{ClientMessage, Command, ErrorCode, ServerMessage};
pub use parse::{encode_server_message, parse_client_line, ProtocolError, MAX_LINE_BYTES};
pub use version::{ProtocolVersion, VersionError};
