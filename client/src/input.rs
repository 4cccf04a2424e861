//! Console command parsing for the headless client
//!
//! Stands in for pointer input: each line names what the pointer ray hit,
//! or asks for an operator action.
//!
//! ```text
//! click <entity> <tool|stand|trunk|other> <distance>
//! click miss
//! respawn <entity>
//! dispatch <entity> <action> [actor:<id>|time:<secs>]...
//! status
//! quit
//! ```

use crate::host::{Mesh, PointerEvent};
use shared::store::ActionArg;
use shared::EntityId;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Click(PointerEvent),
    Respawn(EntityId),
    Dispatch {
        entity: EntityId,
        name: String,
        args: Vec<ActionArg>,
    },
    Status,
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}'")]
    Unknown(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("invalid {what} '{value}'")]
    Invalid { what: &'static str, value: String },
}

pub fn parse_command(line: &str) -> Result<Command, CommandError> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err(CommandError::Empty);
    };

    match verb {
        "click" => parse_click(&mut words),
        "respawn" => Ok(Command::Respawn(parse_entity(words.next())?)),
        "dispatch" => {
            let entity = parse_entity(words.next())?;
            let name = words.next().ok_or(CommandError::Missing("action name"))?;
            let args = words.map(parse_arg).collect::<Result<Vec<_>, _>>()?;
            Ok(Command::Dispatch {
                entity,
                name: name.to_string(),
                args,
            })
        }
        "status" => Ok(Command::Status),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn parse_click<'a>(words: &mut impl Iterator<Item = &'a str>) -> Result<Command, CommandError> {
    let target = words.next().ok_or(CommandError::Missing("click target"))?;
    if target == "miss" {
        return Ok(Command::Click(PointerEvent::miss()));
    }

    let entity = parse_entity(Some(target))?;
    let mesh = match words.next().ok_or(CommandError::Missing("mesh"))? {
        "tool" => Mesh::Tool,
        "stand" => Mesh::Stand,
        "trunk" => Mesh::Trunk,
        "other" => Mesh::Other,
        other => {
            return Err(CommandError::Invalid {
                what: "mesh",
                value: other.to_string(),
            })
        }
    };
    let raw = words.next().ok_or(CommandError::Missing("distance"))?;
    let distance = raw
        .parse::<f32>()
        .ok()
        .filter(|d| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| CommandError::Invalid {
            what: "distance",
            value: raw.to_string(),
        })?;

    Ok(Command::Click(PointerEvent::on(entity, mesh, distance)))
}

fn parse_entity(word: Option<&str>) -> Result<EntityId, CommandError> {
    let word = word.ok_or(CommandError::Missing("entity"))?;
    word.parse().map_err(|_| CommandError::Invalid {
        what: "entity",
        value: word.to_string(),
    })
}

fn parse_arg(word: &str) -> Result<ActionArg, CommandError> {
    let invalid = || CommandError::Invalid {
        what: "argument",
        value: word.to_string(),
    };
    match word.split_once(':') {
        Some(("actor", id)) => id.parse().map(ActionArg::Actor).map_err(|_| invalid()),
        Some(("time", secs)) => secs.parse().map(ActionArg::Time).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}
