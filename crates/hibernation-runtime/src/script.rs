//! Line-oriented event scripts.
//!
//! A script describes what the network listener would have produced for a
//! hibernated actor, one event per line:
//!
//! ```text
//! # comment
//! open 1                  register connection 1 as hibernated
//! text 1 hello world      text message (rest of line, verbatim)
//! binary 1 0a0b0c         binary message (hex)
//! close 1 1000 bye        close with code and optional reason
//! error 1 reset by peer   transport error with description
//! ```
//!
//! Free-form payloads (text, close reason, error description) start after the
//! single separator that follows the previous argument and keep all other
//! whitespace.

use hibernation_core::{ConnectionId, HibernatableSocketParams, SocketError};
use thiserror::Error;

/// Errors produced while parsing a script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Line starts with an unknown command
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand {
        /// 1-based line number
        line: usize,
        /// Command as written
        command: String,
    },

    /// Required argument missing
    #[error("line {line}: missing {argument}")]
    MissingArgument {
        /// 1-based line number
        line: usize,
        /// Name of the missing argument
        argument: &'static str,
    },

    /// Argument is not a valid number
    #[error("line {line}: invalid {argument} `{value}`")]
    InvalidNumber {
        /// 1-based line number
        line: usize,
        /// Name of the argument
        argument: &'static str,
        /// Value as written
        value: String,
    },

    /// Command got more arguments than it takes
    #[error("line {line}: unexpected argument `{argument}`")]
    UnexpectedArgument {
        /// 1-based line number
        line: usize,
        /// Leftover text as written
        argument: String,
    },

    /// Binary payload is not valid hex
    #[error("line {line}: invalid hex payload: {source}")]
    InvalidHex {
        /// 1-based line number
        line: usize,
        /// Decoder error
        source: hex::FromHexError,
    },
}

/// One parsed script instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptCommand {
    /// Register a hibernated connection
    Open(ConnectionId),
    /// Dispatch an event
    Dispatch(HibernatableSocketParams),
}

/// Parsed instruction with its source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 1-based line number
    pub line: usize,
    /// Parsed instruction
    pub command: ScriptCommand,
}

/// Split off the first whitespace-delimited word. The rest starts after the
/// one separator that ends the word and is otherwise untouched.
fn next_word(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest),
        None => (input, ""),
    }
}

fn required<'a>(
    input: &'a str,
    line: usize,
    argument: &'static str,
) -> Result<(&'a str, &'a str), ScriptError> {
    match next_word(input) {
        ("", _) => Err(ScriptError::MissingArgument { line, argument }),
        split => Ok(split),
    }
}

fn number<T: std::str::FromStr>(
    value: &str,
    line: usize,
    argument: &'static str,
) -> Result<T, ScriptError> {
    value.parse().map_err(|_| ScriptError::InvalidNumber {
        line,
        argument,
        value: value.to_string(),
    })
}

/// Parse a single line. Returns `None` for blank lines and comments.
pub fn parse_line(line: usize, text: &str) -> Result<Option<ScriptCommand>, ScriptError> {
    let (command, rest) = next_word(text);
    if command.is_empty() || command.starts_with('#') {
        return Ok(None);
    }

    let (id, rest) = required(rest, line, "connection id")?;
    let id: ConnectionId = number(id, line, "connection id")?;

    let parsed = match command {
        "open" => match rest.trim() {
            "" => ScriptCommand::Open(id),
            extra => {
                return Err(ScriptError::UnexpectedArgument { line, argument: extra.to_string() });
            },
        },
        "text" => ScriptCommand::Dispatch(HibernatableSocketParams::text(id, rest)),
        "binary" => {
            let data = hex::decode(rest.trim())
                .map_err(|source| ScriptError::InvalidHex { line, source })?;
            ScriptCommand::Dispatch(HibernatableSocketParams::binary(id, data))
        },
        "close" => {
            let (code, reason) = required(rest, line, "close code")?;
            let code: u16 = number(code, line, "close code")?;
            ScriptCommand::Dispatch(HibernatableSocketParams::close(id, code, reason))
        },
        "error" => {
            ScriptCommand::Dispatch(HibernatableSocketParams::error(id, SocketError::new(rest)))
        },
        other => {
            return Err(ScriptError::UnknownCommand { line, command: other.to_string() });
        },
    };

    Ok(Some(parsed))
}

/// Parse a whole script.
pub fn parse_script(script: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (index, text) in script.lines().enumerate() {
        let line = index + 1;
        if let Some(command) = parse_line(line, text)? {
            lines.push(ScriptLine { line, command });
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use hibernation_core::SocketEvent;

    use super::*;

    fn dispatch(text: &str) -> HibernatableSocketParams {
        match parse_line(1, text) {
            Ok(Some(ScriptCommand::Dispatch(params))) => params,
            other => panic!("expected dispatch, got {other:?}"),
        }
    }

    #[test]
    fn parses_every_event_kind() {
        assert_eq!(dispatch("text 1 hi there"), HibernatableSocketParams::text(1, "hi there"));
        assert_eq!(dispatch("binary 2 0102"), HibernatableSocketParams::binary(2, vec![1u8, 2]));
        assert_eq!(dispatch("close 3 1000 bye"), HibernatableSocketParams::close(3, 1000, "bye"));
        assert_eq!(
            dispatch("error 4 reset by peer"),
            HibernatableSocketParams::error(4, SocketError::new("reset by peer"))
        );
    }

    #[test]
    fn close_reason_is_optional() {
        let params = dispatch("close 3 1006");
        assert_eq!(params.event, SocketEvent::Close { code: 1006, reason: String::new() });
    }

    #[test]
    fn skips_comments_and_blank_lines() {
        let script = "# setup\n\nopen 9\n   \ntext 9 hi\n";
        let lines = parse_script(script).unwrap();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], ScriptLine { line: 3, command: ScriptCommand::Open(9) });
        assert_eq!(lines[1].line, 5);
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_script("open 1\nping 1\n").unwrap_err();
        assert_eq!(err, ScriptError::UnknownCommand { line: 2, command: "ping".to_string() });
        assert_eq!(err.to_string(), "line 2: unknown command `ping`");
    }

    #[test]
    fn rejects_bad_arguments() {
        assert_eq!(
            parse_line(1, "text"),
            Err(ScriptError::MissingArgument { line: 1, argument: "connection id" })
        );
        assert!(matches!(
            parse_line(1, "text abc hi"),
            Err(ScriptError::InvalidNumber { argument: "connection id", .. })
        ));
        assert!(matches!(
            parse_line(1, "close 1 70000"),
            Err(ScriptError::InvalidNumber { argument: "close code", .. })
        ));
        assert_eq!(
            parse_line(1, "close 1"),
            Err(ScriptError::MissingArgument { line: 1, argument: "close code" })
        );
        assert!(matches!(parse_line(1, "binary 1 0g"), Err(ScriptError::InvalidHex { .. })));
    }

    #[test]
    fn payloads_keep_whitespace() {
        assert_eq!(
            dispatch("text 1   two  spaces  "),
            HibernatableSocketParams::text(1, "  two  spaces  ")
        );
        assert_eq!(dispatch("text 1 "), HibernatableSocketParams::text(1, ""));
        assert_eq!(
            dispatch("close 2 1000  see you "),
            HibernatableSocketParams::close(2, 1000, " see you ")
        );
        assert_eq!(
            dispatch("error 3 reset\tby peer "),
            HibernatableSocketParams::error(3, SocketError::new("reset\tby peer "))
        );
        assert_eq!(dispatch("binary 4 0102  "), HibernatableSocketParams::binary(4, vec![1u8, 2]));
    }

    #[test]
    fn open_rejects_extra_arguments() {
        assert_eq!(
            parse_line(5, "open 1 junk trailing"),
            Err(ScriptError::UnexpectedArgument { line: 5, argument: "junk trailing".to_string() })
        );
        assert_eq!(parse_line(5, "open 1   "), Ok(Some(ScriptCommand::Open(1))));
    }
}
