//! Operator console for a running server
//!
//! Lines read from stdin become messages for the world loop.
//!
//! ```text
//! timer <resource> <seconds|default>
//! quit
//! ```

use crate::network::ServerMessage;
use log::{error, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Error, PartialEq)]
pub enum ConsoleError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {what} '{value}'")]
    Invalid { what: &'static str, value: String },
}

pub fn parse_operator_command(line: &str) -> Result<ServerMessage, ConsoleError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(ConsoleError::Empty);
    };

    match verb {
        "timer" => {
            let raw = words.next().ok_or(ConsoleError::Missing("resource"))?;
            let entity = raw.parse().map_err(|_| ConsoleError::Invalid {
                what: "resource",
                value: raw.to_string(),
            })?;
            let raw = words.next().ok_or(ConsoleError::Missing("seconds"))?;
            let seconds = match raw {
                "default" => None,
                _ => Some(
                    raw.parse::<f64>()
                        .ok()
                        .filter(|secs| secs.is_finite())
                        .ok_or_else(|| ConsoleError::Invalid {
                            what: "seconds",
                            value: raw.to_string(),
                        })?,
                ),
            };
            Ok(ServerMessage::SetRespawnTimer { entity, seconds })
        }
        "quit" | "exit" => Ok(ServerMessage::Shutdown),
        other => Err(ConsoleError::Unknown(other.to_string())),
    }
}

/// Spawns task that forwards operator commands from stdin to the world loop
pub fn spawn_stdin_console(server_tx: mpsc::UnboundedSender<ServerMessage>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_operator_command(&line) {
                    Ok(message) => {
                        if server_tx.send(message).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("{}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading operator input: {}", e);
                    break;
                }
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timer() {
        match parse_operator_command("timer 4 12.5") {
            Ok(ServerMessage::SetRespawnTimer { entity, seconds }) => {
                assert_eq!(entity, 4);
                assert_eq!(seconds, Some(12.5));
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_parse_timer_default() {
        assert!(matches!(
            parse_operator_command("timer 4 default"),
            Ok(ServerMessage::SetRespawnTimer {
                entity: 4,
                seconds: None
            })
        ));
    }

    #[test]
    fn test_parse_quit() {
        assert!(matches!(
            parse_operator_command("quit"),
            Ok(ServerMessage::Shutdown)
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            parse_operator_command("  ").unwrap_err(),
            ConsoleError::Empty
        );
        assert_eq!(
            parse_operator_command("timer").unwrap_err(),
            ConsoleError::Missing("resource")
        );
        assert_eq!(
            parse_operator_command("timer 4").unwrap_err(),
            ConsoleError::Missing("seconds")
        );
        assert_eq!(
            parse_operator_command("timer 4 soon").unwrap_err(),
            ConsoleError::Invalid {
                what: "seconds",
                value: "soon".to_string()
            }
        );
        assert_eq!(
            parse_operator_command("chop 4").unwrap_err(),
            ConsoleError::Unknown("chop".to_string())
        );
    }
}
