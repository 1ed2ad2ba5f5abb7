use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::frame::Frame;

/// Returns `message` as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub message: Bytes,
}

impl Executable for Echo {
    fn exec(self) -> Frame {
        Frame::Bulk(self.message)
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = CommandParserError;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let message = match parser.next_bytes() {
            Ok(message) => message,
            Err(CommandParserError::EndOfStream) => {
                return Err(CommandParserError::MissingArgument { command: "ECHO" })
            }
            Err(e) => return Err(e),
        };

        Ok(Self { message })
    }
}
