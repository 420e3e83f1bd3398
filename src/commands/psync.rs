use tracing::debug;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Asks for a synchronization from the given replication id and offset. This server always
/// answers with a full resynchronization from its own id and current offset.
///
/// Ref: <https://redis.io/docs/latest/commands/psync/>
#[derive(Debug, PartialEq)]
pub struct Psync {
    pub replid: String,
    pub offset: i64,
}

impl Executable for Psync {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        debug!(
            replid = %self.replid,
            offset = self.offset,
            "Replica asked to resume, answering with a full resynchronization"
        );

        let res = format!(
            "FULLRESYNC {} {}",
            ctx.replication.replid(),
            ctx.replication.offset()
        );

        Ok(Frame::Simple(res))
    }
}

impl TryFrom<&mut CommandParser> for Psync {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let replid = parser.next_string()?;
        let offset = parser.next_integer()?;

        Ok(Self { replid, offset })
    }
}
