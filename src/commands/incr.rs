use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Increments the number stored at key by one. Unlike Redis, the key must already exist.
///
/// Ref: <https://redis.io/docs/latest/commands/incr/>
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub key: String,
}

impl Executable for Incr {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let res = ctx.store.incr_by(&self.key, 1);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(err) => Ok(error_reply(err)),
        }
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}
