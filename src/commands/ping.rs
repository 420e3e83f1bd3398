use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Returns PONG if no argument is provided, otherwise return a copy of the argument as a bulk.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, PartialEq)]
pub struct Ping {
    pub payload: Option<Bytes>,
}

impl Executable for Ping {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        let res = self
            .payload
            .map_or(Frame::Simple("PONG".to_string()), Frame::Bulk);

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for Ping {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let payload = match parser.next_bytes() {
            Ok(payload) => Some(payload),
            Err(CommandParserError::EndOfStream) => None,
            Err(e) => return Err(e.into()),
        };

        Ok(Self { payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::Command;

    #[tokio::test]
    async fn without_payload() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("PING"))]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(cmd, Command::Ping(Ping { payload: None }));

        let ctx = Context::new(Default::default());
        assert_eq!(cmd.exec(&ctx).unwrap(), Frame::Simple("PONG".to_string()));
    }

    #[tokio::test]
    async fn with_payload() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("PING")),
            Frame::Bulk(Bytes::from("hello")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::Ping(Ping {
                payload: Some(Bytes::from("hello"))
            })
        );

        let ctx = Context::new(Default::default());
        assert_eq!(cmd.exec(&ctx).unwrap(), Frame::Bulk(Bytes::from("hello")));
    }
}
