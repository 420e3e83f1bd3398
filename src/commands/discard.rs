use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Flushes the commands queued since MULTI. Like EXEC, the actual work happens in the
/// connection's session.
///
/// Ref: <https://redis.io/docs/latest/commands/discard/>
#[derive(Debug, PartialEq)]
pub struct Discard;

impl Executable for Discard {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        Ok(error_reply("DISCARD without MULTI"))
    }
}

impl TryFrom<&mut CommandParser> for Discard {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
