//! Line framing for the JSON-lines channel.

use crate::message::{ClientMessage, ServerMessage};
use crate::version::VersionError;
use thiserror::Error;

/// Longest accepted command line in bytes.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Why an inbound line was not turned into a command.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("empty line")]
    Empty,

    #[error("line too large: {size} bytes (max: {max})")]
    TooLarge { size: usize, max: usize },

    #[error("line is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Parses and version-checks one inbound line.
///
/// # Errors
///
/// Returns an error if the line is blank, exceeds [`MAX_LINE_BYTES`], is not
/// a known command, or carries an incompatible major version.
pub fn parse_client_line(line: &str) -> Result<ClientMessage, ProtocolError> {
    if line.len() > MAX_LINE_BYTES {
        return Err(ProtocolError::TooLarge {
            size: line.len(),
            max: MAX_LINE_BYTES,
        });
    }
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    let message: ClientMessage = serde_json::from_str(trimmed)?;
    message.protocol_version.check()?;
    Ok(message)
}

/// Serializes one outbound message as a newline-terminated line.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_server_message(message: &ServerMessage) -> Result<String, ProtocolError> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Command;

    #[test]
    fn test_parse_valid_line() {
        let msg = parse_client_line(
            "{\"protocol_version\":{\"major\":1,\"minor\":4},\"type\":\"ping\",\"seq\":9}\n",
        )
        .unwrap();
        assert_eq!(msg.command, Command::Ping { seq: 9 });
    }

    #[test]
    fn test_parse_rejects_blank_and_garbage() {
        assert!(matches!(parse_client_line("   "), Err(ProtocolError::Empty)));
        assert!(matches!(
            parse_client_line("{\"type\":\"nope\"}"),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_other_major_version() {
        let err = parse_client_line(
            "{\"protocol_version\":{\"major\":2,\"minor\":0},\"type\":\"snapshot\"}",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::Version(VersionError::Incompatible { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_oversized_line() {
        let line = "x".repeat(MAX_LINE_BYTES + 1);
        assert!(matches!(
            parse_client_line(&line),
            Err(ProtocolError::TooLarge { .. })
        ));
    }

    #[test]
    fn test_encode_is_newline_terminated() {
        let line = encode_server_message(&ServerMessage::Pong { seq: 3 }).unwrap();
        assert_eq!(line, "{\"type\":\"pong\",\"seq\":3}\n");
    }
}
