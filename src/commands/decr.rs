use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Decrements the number stored at key by one. The key must already exist.
///
/// Ref: <https://redis.io/docs/latest/commands/decr/>
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub key: String,
}

impl Executable for Decr {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match ctx.store.incr_by(&self.key, -1) {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(err) => Ok(error_reply(err)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Decr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}
