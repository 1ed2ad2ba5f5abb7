pub mod command;
pub mod echo;
pub mod executable;
pub mod ping;

use std::str::{self, FromStr};
use std::vec;

use bytes::Bytes;
use strum_macros::{EnumString, VariantNames};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;

use command::Command as Command_;
use echo::Echo;
use ping::Ping;

#[derive(Debug, PartialEq)]
pub enum Command {
    Command(Command_),
    Echo(Echo),
    Ping(Ping),
}

/// Names of the supported commands. Matching is ASCII case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, VariantNames)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum CommandName {
    Command,
    Echo,
    Ping,
}

impl Executable for Command {
    fn exec(self) -> Frame {
        match self {
            Command::Command(cmd) => cmd.exec(),
            Command::Echo(cmd) => cmd.exec(),
            Command::Ping(cmd) => cmd.exec(),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays of strings.
        let frames = match frame {
            Frame::Array(array) => array,
            _ => return Err(CommandParserError::UnexpectedType),
        };

        if !frames
            .iter()
            .all(|frame| matches!(frame, Frame::Simple(_) | Frame::Bulk(_)))
        {
            return Err(CommandParserError::UnexpectedType);
        }

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
        };

        match parser.parse_command_name()? {
            CommandName::Command => Command_::try_from(parser).map(Command::Command),
            CommandName::Echo => Echo::try_from(parser).map(Command::Echo),
            CommandName::Ping => Ping::try_from(parser).map(Command::Ping),
        }
    }
}

/// Interprets a decoded frame as a command line and runs it. Anything that is not a valid command
/// becomes an error reply rather than a failure of the connection.
pub fn dispatch(frame: Frame) -> Frame {
    match Command::try_from(frame) {
        Ok(cmd) => cmd.exec(),
        Err(e) => Frame::Error(e.to_string()),
    }
}

pub struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<CommandName, CommandParserError> {
        let name = match self.next_bytes() {
            Ok(name) => name,
            Err(CommandParserError::EndOfStream) => return Err(CommandParserError::EmptyCommand),
            Err(e) => return Err(e),
        };

        str::from_utf8(&name)
            .ok()
            .and_then(|name| CommandName::from_str(name).ok())
            .ok_or_else(|| CommandParserError::UnknownCommand {
                command: String::from_utf8_lossy(&name).into_owned(),
            })
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        let frame = self
            .parts
            .next()
            .ok_or(CommandParserError::EndOfStream)?;

        match frame {
            // Both `Simple` and `Bulk` representation may be strings.
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            _ => Err(CommandParserError::UnexpectedType),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("ERR unexpected type")]
    UnexpectedType,
    #[error("ERR Empty command")]
    EmptyCommand,
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR {command} requires an argument")]
    MissingArgument { command: &'static str },
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
