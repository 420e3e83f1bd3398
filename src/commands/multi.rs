use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Marks the start of a transaction block. The connection's session queues every following
/// command until EXEC or DISCARD.
///
/// Ref: <https://redis.io/docs/latest/commands/multi/>
#[derive(Debug, PartialEq)]
pub struct Multi;

impl Executable for Multi {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        Ok(Frame::Simple("OK".to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Multi {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
