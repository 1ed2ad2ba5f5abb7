use strum::VariantNames;

use crate::commands::executable::Executable;
use crate::commands::{CommandName, CommandParser, CommandParserError};
use crate::frame::Frame;

/// Lists the names of the commands this server understands. Arguments are ignored.
///
/// Ref: <https://redis.io/docs/latest/commands/command>
#[derive(Debug, PartialEq)]
pub struct Command {}

impl Executable for Command {
    fn exec(self) -> Frame {
        let names = CommandName::VARIANTS
            .iter()
            .map(|name| Frame::Simple(name.to_string()))
            .collect();

        Frame::Array(names)
    }
}

impl TryFrom<&mut CommandParser> for Command {
    type Error = CommandParserError;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self {})
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::commands::Command as Cmd;

    #[test]
    fn lists_supported_commands() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("command")),
            Frame::Bulk(Bytes::from("DOCS")),
        ]);
        let cmd = Cmd::try_from(frame).unwrap();

        assert_eq!(
            cmd.exec(),
            Frame::Array(vec![
                Frame::Simple(String::from("COMMAND")),
                Frame::Simple(String::from("ECHO")),
                Frame::Simple(String::from("PING")),
            ])
        );
    }
}
