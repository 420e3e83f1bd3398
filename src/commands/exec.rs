use crate::commands::executable::Executable;
use crate::commands::{error_reply, CommandParser};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Executes every command queued since MULTI. The queue itself belongs to the connection's
/// session, executing EXEC on its own means no transaction was started.
///
/// Ref: <https://redis.io/docs/latest/commands/exec/>
#[derive(Debug, PartialEq)]
pub struct Exec;

impl Executable for Exec {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        Ok(error_reply("EXEC without MULTI"))
    }
}

impl TryFrom<&mut CommandParser> for Exec {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
